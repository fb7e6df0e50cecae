//! Application configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a `config.toml` in the working directory overrides any
//! subset of them. `storage.data_dir` only says where album slots live.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! data_dir = ".montage"      # Where album slots are kept
//!
//! [generation]
//! api_base = "https://generativelanguage.googleapis.com/v1beta"
//! model = "gemini-2.5-flash-image-preview"
//! timeout_seconds = 120      # Caller-side timeout for one montage request
//! api_key_env = "API_KEY"    # Environment variable holding the API key
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [generation]
//! timeout_seconds = 300
//! ```
//!
//! Unknown keys are rejected to catch typos early. The API key itself never
//! lives in the file; only the name of the variable to read it from.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file, read from the working directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Application configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Album storage settings.
    pub storage: StorageConfig,
    /// Montage generation service settings.
    pub generation: GenerationConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.data_dir must not be empty".into(),
            ));
        }
        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "generation.model must not be empty".into(),
            ));
        }
        if !self.generation.api_base.starts_with("http://")
            && !self.generation.api_base.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "generation.api_base must be an http(s) URL".into(),
            ));
        }
        if self.generation.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "generation.timeout_seconds must be non-zero".into(),
            ));
        }
        if self.generation.api_key_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "generation.api_key_env must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Album storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding one file per storage slot.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".montage".to_string(),
        }
    }
}

/// Montage generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Base URL of the `generateContent` API, without trailing slash.
    pub api_base: String,
    /// Image-capable model name.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Environment variable the API key is read from.
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-image-preview".to_string(),
            timeout_seconds: 120,
            api_key_env: "API_KEY".to_string(),
        }
    }
}

impl GenerationConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))
    }

    /// Full `generateContent` endpoint for the configured model.
    pub fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!(
            "{}/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model_path
        )
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML table.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Deep-merge `overlay` into `base`.
///
/// Tables merge per key; any other overlay value replaces the base value.
/// Base keys absent from the overlay survive.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Apply an optional overlay to `base`, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Product Montage Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the directory you run montage from (./config.toml).
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory holding the signed-in user and one album file per user.
data_dir = ".montage"

# ---------------------------------------------------------------------------
# Montage generation
# ---------------------------------------------------------------------------
[generation]
# Base URL of the generateContent API.
api_base = "https://generativelanguage.googleapis.com/v1beta"

# Model used to composite the character and product images.
# It must be able to answer with both an image and text.
model = "gemini-2.5-flash-image-preview"

# Give up on a montage request after this many seconds.
timeout_seconds = 120

# Environment variable holding the API key. The key itself is never
# written to this file.
api_key_env = "API_KEY"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.storage.data_dir, ".montage");
        assert_eq!(config.generation.model, "gemini-2.5-flash-image-preview");
        assert_eq!(config.generation.timeout_seconds, 120);
        assert_eq!(config.generation.api_key_env, "API_KEY");
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[generation]
timeout_seconds = 30
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.generation.timeout_seconds, 30);
        // Default values preserved
        assert_eq!(config.generation.model, "gemini-2.5-flash-image-preview");
        assert_eq!(config.storage.data_dir, ".montage");
    }

    #[test]
    fn endpoint_adds_models_prefix() {
        let config = GenerationConfig::default();
        assert_eq!(
            config.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image-preview:generateContent"
        );
    }

    #[test]
    fn endpoint_keeps_existing_prefix_and_trims_slash() {
        let config = GenerationConfig {
            api_base: "http://localhost:9000/v1/".into(),
            model: "models/custom".into(),
            ..GenerationConfig::default()
        };
        assert_eq!(
            config.endpoint(),
            "http://localhost:9000/v1/models/custom:generateContent"
        );
    }

    #[test]
    fn api_key_missing_variable() {
        let config = GenerationConfig {
            api_key_env: "PRODUCT_MONTAGE_TEST_UNSET_KEY".into(),
            ..GenerationConfig::default()
        };
        assert!(matches!(
            config.api_key(),
            Err(ConfigError::MissingApiKey(name)) if name == "PRODUCT_MONTAGE_TEST_UNSET_KEY"
        ));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.generation.timeout_seconds, 120);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[generation]
model = "gemini-other"
api_key_env = "GEMINI_API_KEY"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.generation.model, "gemini-other");
        assert_eq!(config.generation.api_key_env, "GEMINI_API_KEY");
        // Unspecified values should be defaults
        assert_eq!(config.generation.timeout_seconds, 120);
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[generation]\nmodle = \"typo\"\n",
        )
        .unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.generation.timeout_seconds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_non_http_base() {
        let mut config = AppConfig::default();
        config.generation.api_base = "ftp://example.com".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_overlay_wins_and_base_preserved() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.storage.data_dir, defaults.storage.data_dir);
        assert_eq!(config.generation.api_base, defaults.generation.api_base);
        assert_eq!(config.generation.model, defaults.generation.model);
        assert_eq!(
            config.generation.timeout_seconds,
            defaults.generation.timeout_seconds
        );
    }
}
