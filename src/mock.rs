//! In-process montage generators for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::image::Image;
use crate::montage::{GenerateError, Generation, MontageGenerator, MontageRequest};

/// A generator that always answers with the same image and caption.
#[derive(Debug)]
pub struct StaticGenerator {
    image: Option<Vec<u8>>,
    text: Option<String>,
    calls: AtomicUsize,
}

impl StaticGenerator {
    /// Answer with a PNG and no caption.
    pub fn image_only(png: Vec<u8>) -> Self {
        Self {
            image: Some(png),
            text: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with a PNG and a caption.
    pub fn with_caption(png: Vec<u8>, text: impl Into<String>) -> Self {
        Self {
            image: Some(png),
            text: Some(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with a caption only, as a model does when it declines.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            image: None,
            text: Some(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MontageGenerator for StaticGenerator {
    async fn generate(&self, _request: &MontageRequest) -> Result<Generation, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let image = match &self.image {
            Some(bytes) => Some(
                Image::new(bytes.clone(), "image/png")
                    .map_err(|e| GenerateError::Parse(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Generation {
            image,
            text: self.text.clone(),
        })
    }
}

/// A generator that always fails with the given message.
#[derive(Debug, Clone)]
pub struct FailingGenerator {
    error_message: String,
}

impl FailingGenerator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
        }
    }
}

#[async_trait]
impl MontageGenerator for FailingGenerator {
    async fn generate(&self, _request: &MontageRequest) -> Result<Generation, GenerateError> {
        Err(GenerateError::Api(self.error_message.clone()))
    }
}
