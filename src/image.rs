//! Uploaded image values.
//!
//! An [`Image`] is a binary payload plus its MIME type and an identity assigned
//! at upload time. Identity and content are deliberately separate: the same
//! bytes uploaded twice produce two distinct ids, and it is the album that
//! decides whether a second copy is allowed in (see
//! [`Album::add_root_image`](crate::album::Album::add_root_image)).
//!
//! ## Content hash
//!
//! Dedup compares content, not ids. Rather than comparing full payloads on
//! every add, each image carries a SHA-256 digest of its payload computed once
//! at construction. The digest is derived data: it is never serialized and is
//! recomputed when an image is decoded from storage.
//!
//! ## Wire format
//!
//! Images are stored as `{"id": ..., "base64": ..., "mimeType": ...}`, the
//! same shape the album slot has always used.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("not an image file ({0}); please choose an image")]
    NotAnImage(String),
    #[error("image payload is empty")]
    Empty,
}

/// Opaque image identity, unique within an album.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Fresh random identity for a new upload.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One uploaded image. Immutable once created.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ImageRecord", into = "ImageRecord")]
pub struct Image {
    id: ImageId,
    payload: Vec<u8>,
    mime_type: String,
    content_hash: String,
}

impl Image {
    /// Build an image with a freshly generated id.
    pub fn new(payload: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, ImageError> {
        Self::with_id(ImageId::generate(), payload, mime_type)
    }

    /// Build an image with a caller-chosen id.
    ///
    /// Rejects empty payloads and MIME types outside `image/*`.
    pub fn with_id(
        id: ImageId,
        payload: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Result<Self, ImageError> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(ImageError::NotAnImage(mime_type));
        }
        if payload.is_empty() {
            return Err(ImageError::Empty);
        }
        let content_hash = hash_payload(&payload);
        Ok(Self {
            id,
            payload,
            mime_type,
            content_hash,
        })
    }

    /// Decode an image from its base64 form.
    pub fn from_base64(
        id: ImageId,
        data: &str,
        mime_type: impl Into<String>,
    ) -> Result<Self, ImageError> {
        let payload = BASE64.decode(data.trim())?;
        Self::with_id(id, payload, mime_type)
    }

    /// Rebuild a stored image without the upload checks.
    fn restore(id: ImageId, payload: Vec<u8>, mime_type: String) -> Self {
        let content_hash = hash_payload(&payload);
        Self {
            id,
            payload,
            mime_type,
            content_hash,
        }
    }

    /// Read an image file, guessing the MIME type from its extension.
    pub fn from_file(path: &Path) -> Result<Self, ImageError> {
        let mime = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !mime.starts_with("image/") {
            return Err(ImageError::NotAnImage(mime));
        }
        let payload = std::fs::read(path)?;
        Self::new(payload, mime)
    }

    pub fn id(&self) -> &ImageId {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// SHA-256 of the payload as a hex string.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Whether two images carry identical bytes, regardless of identity.
    pub fn same_content(&self, other: &Image) -> bool {
        self.content_hash == other.content_hash
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.payload)
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

// Payloads can be megabytes; keep Debug output readable.
impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.payload.len())
            .field("content_hash", &&self.content_hash[..12])
            .finish()
    }
}

/// SHA-256 hash of a payload, returned as a hex string.
pub fn hash_payload(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Serialized form of an [`Image`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageRecord {
    id: ImageId,
    base64: String,
    mime_type: String,
}

impl TryFrom<ImageRecord> for Image {
    type Error = ImageError;

    /// Stored entries are taken as they are: an empty payload or an unusual
    /// MIME type was accepted once and must not make the album unreadable.
    /// Only undecodable base64 is an error.
    fn try_from(record: ImageRecord) -> Result<Self, Self::Error> {
        let payload = BASE64.decode(record.base64.trim())?;
        Ok(Image::restore(record.id, payload, record.mime_type))
    }
}

impl From<Image> for ImageRecord {
    fn from(image: Image) -> Self {
        ImageRecord {
            base64: image.to_base64(),
            id: image.id,
            mime_type: image.mime_type,
        }
    }
}
