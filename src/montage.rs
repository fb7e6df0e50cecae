//! Montage requests: building them, sending them, and tracking their outcome.
//!
//! A montage composites a character image and a product image into one
//! picture, optionally steered by a free-text instruction. The generation
//! itself is an external capability behind the [`MontageGenerator`] trait;
//! [`crate::gemini::GeminiClient`] is the HTTP implementation.
//!
//! # Lifecycle
//!
//! ```text
//!            begin (both images selected)
//!   Idle ───────────────────────────────▶ Loading
//!    ▲                                      │
//!    │ reset                     complete   │
//!    │                  ┌───────────────────┴──────────────┐
//!    │                  ▼                                  ▼
//!    └──────────── Succeeded(montage)                 Failed(message)
//! ```
//!
//! `Succeeded` and `Failed` are resting states: a new request can start from
//! them just as from `Idle`. A request is rejected locally, with no external
//! call and no state change, when either image is missing or when another
//! request is still loading.
//!
//! Each `begin` hands out a [`Ticket`]. [`Orchestrator::complete`] only
//! accepts the ticket of the request currently loading, so a response that
//! arrives after a [`reset`](Orchestrator::reset) (sign-out, for instance) is
//! dropped rather than shown to whoever is using the session now.

use crate::image::Image;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Shown when a request is triggered without both images.
pub const MISSING_SELECTION_MESSAGE: &str =
    "Please upload both a character image and a product image.";

/// Shown when the service answered but produced no image.
pub const NO_IMAGE_MESSAGE: &str =
    "The AI could not produce an image. Please try again with different images or instructions.";

/// Errors from the generation capability itself.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// Transport failure: DNS, connection, TLS, malformed HTTP.
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("generation request timed out after {0}s")]
    Timeout(u64),
    /// The service rejected the request (auth, quota, invalid input).
    #[error("{0}")]
    Api(String),
    #[error("failed to parse generation response: {0}")]
    Parse(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Errors surfaced by the orchestrator.
#[derive(Error, Debug)]
pub enum MontageError {
    #[error("{}", MISSING_SELECTION_MESSAGE)]
    MissingSelection,
    #[error("a montage is already being generated")]
    Busy,
    /// The model declined to produce an image.
    #[error("{}", NO_IMAGE_MESSAGE)]
    NoImage,
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Everything the generator needs for one montage.
#[derive(Debug, Clone)]
pub struct MontageRequest {
    pub character: Image,
    pub product: Image,
    /// The user's addition, verbatim. May be empty.
    pub instruction: String,
}

impl MontageRequest {
    /// The full text prompt: the task template with the user's addition.
    pub fn prompt(&self) -> String {
        build_prompt(&self.instruction)
    }
}

/// Raw answer from the generation capability: zero-or-one image and
/// zero-or-one caption.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub image: Option<Image>,
    pub text: Option<String>,
}

/// A successfully generated montage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Montage {
    pub image: Image,
    pub text: Option<String>,
}

impl TryFrom<Generation> for Montage {
    type Error = MontageError;

    fn try_from(generation: Generation) -> Result<Self, Self::Error> {
        match generation.image {
            Some(image) => Ok(Montage {
                image,
                text: generation.text,
            }),
            None => Err(MontageError::NoImage),
        }
    }
}

/// The external montage-generation capability.
#[async_trait]
pub trait MontageGenerator: Send + Sync {
    async fn generate(&self, request: &MontageRequest) -> Result<Generation, GenerateError>;
}

/// Build the generation prompt around the user's instruction.
pub fn build_prompt(instruction: &str) -> String {
    format!(
        "Task: Create a realistic composite photo by combining the two provided images.\n\
         - Image 1: a character.\n\
         - Image 2: a product.\n\
         Requirements:\n\
         1. Create a new image in which the character is naturally using or interacting with the product.\n\
         2. Keep the proportions between the character and the product accurate and believable.\n\
         3. Adjust lighting, shadows, and perspective so the image looks seamless and real.\n\
         4. Preserve the original style and details of both the character and the product.\n\
         5. Additional request from the user: \"{instruction}\"\n\
         The final result must be a high-quality image that looks like a real photograph."
    )
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Where the current montage request stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GenerationState {
    #[default]
    Idle,
    Loading,
    Succeeded(Montage),
    Failed(String),
}

impl GenerationState {
    pub fn is_loading(&self) -> bool {
        matches!(self, GenerationState::Loading)
    }

    pub fn montage(&self) -> Option<&Montage> {
        match self {
            GenerationState::Succeeded(m) => Some(m),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            GenerationState::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Identifies one `begin`/`complete` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Drives a single montage request at a time.
#[derive(Debug, Default)]
pub struct Orchestrator {
    state: GenerationState,
    /// Ticket of the request currently loading, if any.
    in_flight: Option<Ticket>,
    next_ticket: u64,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    /// Start a request. Leaves the state untouched when rejected.
    pub fn begin(
        &mut self,
        character: Option<&Image>,
        product: Option<&Image>,
        instruction: &str,
    ) -> Result<(Ticket, MontageRequest), MontageError> {
        if self.state.is_loading() {
            return Err(MontageError::Busy);
        }
        let (Some(character), Some(product)) = (character, product) else {
            debug!("montage request rejected: selection incomplete");
            return Err(MontageError::MissingSelection);
        };

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        self.state = GenerationState::Loading;

        let request = MontageRequest {
            character: character.clone(),
            product: product.clone(),
            instruction: instruction.to_string(),
        };
        Ok((ticket, request))
    }

    /// Record the outcome of a request. Returns `false` for a stale ticket.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<Generation, GenerateError>,
    ) -> bool {
        if self.in_flight != Some(ticket) {
            debug!(?ticket, "dropping stale montage response");
            return false;
        }
        self.in_flight = None;
        self.state = match outcome
            .map_err(MontageError::from)
            .and_then(Montage::try_from)
        {
            Ok(montage) => {
                info!(bytes = montage.image.len(), captioned = montage.text.is_some(), "montage generated");
                GenerationState::Succeeded(montage)
            }
            Err(e) => {
                warn!(error = %e, "montage generation failed");
                GenerationState::Failed(e.to_string())
            }
        };
        true
    }

    /// `begin`, call the generator, `complete`.
    pub async fn run<G: MontageGenerator + ?Sized>(
        &mut self,
        generator: &G,
        character: Option<&Image>,
        product: Option<&Image>,
        instruction: &str,
    ) -> Result<&GenerationState, MontageError> {
        let (ticket, request) = self.begin(character, product, instruction)?;
        let outcome = generator.generate(&request).await;
        self.complete(ticket, outcome);
        Ok(&self.state)
    }

    /// Back to `Idle`, orphaning any request in flight.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.state = GenerationState::Idle;
    }
}
