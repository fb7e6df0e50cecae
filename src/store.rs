//! Per-user album persistence.
//!
//! Albums are kept in a durable key-value store, one slot per user, plus a
//! single slot naming the user who is currently signed in:
//!
//! ```text
//! currentUserEmail          → "ana@example.com"
//! albumState_ana@example.com → {"rootImages": [...], "folders": [...]}
//! ```
//!
//! # Design
//!
//! [`KeyValueStore`] is the backend seam. [`FileStore`] keeps each slot in its
//! own file under a data directory; [`MemoryStore`] keeps them in a map for
//! tests and embedding.
//!
//! [`AlbumStore`] is a handle scoped to one user. It never fails to load:
//! a missing slot, an unreadable backend, corrupt JSON, or a decoded album
//! that breaks the membership invariants all load as an empty album. Stale or
//! missing album state is not worth interrupting the user over. Saves are a
//! full overwrite of the slot, so saving the same album twice is harmless.

use crate::album::Album;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Slot holding the signed-in user's identity.
pub const CURRENT_USER_KEY: &str = "currentUserEmail";

/// Prefix of per-user album slots.
const ALBUM_KEY_PREFIX: &str = "albumState_";

/// Extension of slot files written by [`FileStore`].
const SLOT_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable string slots keyed by string.
pub trait KeyValueStore {
    /// Value stored under `key`, or `None` if the slot is empty.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the slot.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Clear the slot. Clearing an empty slot is fine.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

// =============================================================================
// File backend
// =============================================================================

/// One file per slot under a data directory.
///
/// Keys are escaped into file names (`%XX` for anything outside
/// `[A-Za-z0-9._@-]`) so every key maps to a distinct file. Writes go to a
/// temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the file backing `key`.
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{SLOT_EXTENSION}", escape_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.slot_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.slot_path(key);
        let tmp = path.with_extension(format!("{SLOT_EXTENSION}.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Escape a key into a portable file stem.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'@' | b'-' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

// =============================================================================
// Memory backend
// =============================================================================

/// In-memory slots. Single-threaded, like the rest of the session.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.borrow().len()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.slots.borrow_mut().remove(key);
        Ok(())
    }
}

// =============================================================================
// Scoped album handle
// =============================================================================

/// Album slot for a single user.
pub struct AlbumStore<'a> {
    backend: &'a dyn KeyValueStore,
    user: String,
}

impl<'a> AlbumStore<'a> {
    pub fn for_user(backend: &'a dyn KeyValueStore, user: impl Into<String>) -> Self {
        Self {
            backend,
            user: user.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn key(&self) -> String {
        album_key(&self.user)
    }

    /// Load the user's album, or an empty one if nothing usable is stored.
    pub fn load(&self) -> Album {
        let key = self.key();
        let content = match self.backend.get(&key) {
            Ok(Some(c)) => c,
            Ok(None) => {
                debug!(user = %self.user, "no stored album, starting empty");
                return Album::new();
            }
            Err(e) => {
                warn!(user = %self.user, error = %e, "album storage unavailable, starting empty");
                return Album::new();
            }
        };
        let album: Album = match serde_json::from_str(&content) {
            Ok(a) => a,
            Err(e) => {
                warn!(user = %self.user, error = %e, "stored album is corrupt, starting empty");
                return Album::new();
            }
        };
        if let Err(violation) = album.validate() {
            warn!(user = %self.user, %violation, "stored album is inconsistent, starting empty");
            return Album::new();
        }
        album
    }

    /// Overwrite the user's album slot.
    pub fn save(&self, album: &Album) -> Result<(), StoreError> {
        let json = serde_json::to_string(album)?;
        self.backend.set(&self.key(), &json)?;
        debug!(user = %self.user, images = album.image_count(), "album saved");
        Ok(())
    }
}

/// Slot key for a user's album.
pub fn album_key(user: &str) -> String {
    format!("{ALBUM_KEY_PREFIX}{user}")
}

// =============================================================================
// Current identity slot
// =============================================================================

/// The remembered signed-in user, if any. Read failures count as signed out.
pub fn load_current_user(backend: &dyn KeyValueStore) -> Option<String> {
    match backend.get(CURRENT_USER_KEY) {
        Ok(user) => user.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
        Err(e) => {
            warn!(error = %e, "could not read current user");
            None
        }
    }
}

pub fn save_current_user(backend: &dyn KeyValueStore, user: &str) -> Result<(), StoreError> {
    backend.set(CURRENT_USER_KEY, user)
}

pub fn clear_current_user(backend: &dyn KeyValueStore) -> Result<(), StoreError> {
    backend.remove(CURRENT_USER_KEY)
}
