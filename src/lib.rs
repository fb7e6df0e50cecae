//! # Product Montage
//!
//! A personal album of product images plus an AI "virtual try-on" step that
//! composes a character photo with a product photo into a single montage.
//!
//! # Architecture
//!
//! ```text
//! Session ──┬── Album         (root images + one level of folders)
//!           ├── AlbumStore    (per-user slot in a KeyValueStore)
//!           └── Orchestrator  (Idle → Loading → Succeeded | Failed)
//!                   │
//!                   └── MontageGenerator  (Gemini over HTTP, or a mock)
//! ```
//!
//! The album is a pure value type: every operation is total, and an unknown
//! id is a no-op rather than an error. Persistence is write-through: the
//! [`session::Session`] saves the whole album after each change, and loading
//! never fails. Missing, corrupt or inconsistent stored data all come back as
//! an empty album.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`image`] | Image payloads: id, bytes, MIME type, content hash, base64 wire form |
//! | [`album`] | The album tree and its operations (add with dedup, folders, move, delete) |
//! | [`store`] | Key-value backends (file, memory) and the per-user album slot |
//! | [`montage`] | Prompt building, the generator trait, and the request state machine |
//! | [`gemini`] | `generateContent` HTTP client implementing [`montage::MontageGenerator`] |
//! | [`mock`] | In-process generators for tests |
//! | [`session`] | Current identity, selections, and write-through album edits |
//! | [`config`] | `config.toml` loading, stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Dedup by Content, Not by Name
//!
//! Uploading the same bytes twice must not grow the album. Each [`image::Image`]
//! carries a SHA-256 of its payload computed once at construction, so the
//! duplicate check is a hash comparison per stored image instead of a byte
//! comparison of multi-megabyte payloads.
//!
//! ## One Request at a Time
//!
//! The [`montage::Orchestrator`] refuses to start while a request is in
//! flight and tags every request with a ticket. A result that arrives for a
//! ticket that is no longer current is dropped, so a reset or identity change
//! can never be overwritten by a late response.

pub mod album;
pub mod config;
pub mod gemini;
pub mod image;
pub mod mock;
pub mod montage;
pub mod output;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
