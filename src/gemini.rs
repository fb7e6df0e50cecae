//! HTTP client for the Gemini `generateContent` API.
//!
//! One montage is one `generateContent` call. The request carries both images
//! as inline base64 parts followed by the text prompt, and asks for both
//! image and text modalities in the answer:
//!
//! ```json
//! {
//!   "contents": [{ "parts": [
//!     { "inlineData": { "mimeType": "image/png",  "data": "<character>" } },
//!     { "inlineData": { "mimeType": "image/jpeg", "data": "<product>" } },
//!     { "text": "Task: Create a realistic composite photo ..." }
//!   ]}],
//!   "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] }
//! }
//! ```
//!
//! Only the first candidate is read. Within it, the last inline image and the
//! last text part win. A response with no image is not an error here; the
//! orchestrator decides what that means.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::image::{Image, ImageId};
use crate::montage::{GenerateError, Generation, MontageGenerator, MontageRequest};

/// MIME type assumed for generated images that don't declare one.
const DEFAULT_OUTPUT_MIME: &str = "image/png";

/// Montage generator backed by the Gemini API.
#[derive(Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_seconds: u64,
}

impl GeminiClient {
    /// Create a client with an explicit API key.
    pub fn new(
        config: &GenerationConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GenerateError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            api_key: api_key.into(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Create a client, reading the API key from the configured variable.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerateError> {
        let api_key = config
            .api_key()
            .map_err(|e| GenerateError::Configuration(e.to_string()))?;
        Self::new(config, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_body(request: &MontageRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline(&request.character),
                    Part::inline(&request.product),
                    Part::Text {
                        text: request.prompt(),
                    },
                ],
            }],
            generation_config: GenerationSettings {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        }
    }

    /// Pull the image and caption out of the first candidate.
    fn parse_response(response: GenerateContentResponse) -> Result<Generation, GenerateError> {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!(reason, "prompt was blocked");
        }

        let mut generation = Generation::default();
        let Some(candidate) = response.candidates.into_iter().next() else {
            return Ok(generation);
        };
        if let Some(reason) = candidate.finish_reason.as_deref() {
            debug!(reason, "candidate finished");
        }

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(inline) = part.inline_data {
                if inline.data.is_empty() {
                    continue;
                }
                let mime = inline
                    .mime_type
                    .filter(|m| m.starts_with("image/"))
                    .unwrap_or_else(|| DEFAULT_OUTPUT_MIME.to_string());
                let image = Image::from_base64(ImageId::generate(), &inline.data, mime)
                    .map_err(|e| GenerateError::Parse(format!("generated image rejected: {e}")))?;
                generation.image = Some(image);
            } else if let Some(text) = part.text
                && !text.is_empty()
            {
                generation.text = Some(text);
            }
        }
        Ok(generation)
    }

    /// Human-readable message for a non-success response.
    fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .map(|e| e.error.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl MontageGenerator for GeminiClient {
    async fn generate(&self, request: &MontageRequest) -> Result<Generation, GenerateError> {
        let body = Self::build_body(request);

        debug!(
            endpoint = %self.endpoint,
            character_bytes = request.character.len(),
            product_bytes = request.product.len(),
            "sending montage request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout(self.timeout_seconds)
                } else {
                    GenerateError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "generation API returned error");
            return Err(GenerateError::Api(Self::api_error_message(status, &body)));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerateError::Timeout(self.timeout_seconds)
            } else {
                GenerateError::Parse(e.to_string())
            }
        })?;

        Self::parse_response(parsed)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

/// Request part: either text or an inline image.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    fn inline(image: &Image) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type().to_string(),
                data: image.to_base64(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// Response part. Parts may carry fields this client doesn't use.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}
