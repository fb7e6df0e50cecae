//! CLI output formatting.
//!
//! # Entity Display Contract
//!
//! Every entity follows the same two-level pattern:
//!
//! 1. **Header line**: positional index + identity (+ optional detail like an
//!    image count)
//! 2. **Context lines**: indented `Id:`, `Text:`, status, etc.
//!
//! # Output Format
//!
//! ## Album
//!
//! ```text
//! ana@example.com: 3 images, 1 folder
//! Root
//!     001 5f0c2a9e-3b1d-4c6a-9f1e-0b7d2c4e81e1 (image/png, 2.1 KB)
//! Folders
//! 001 Outfits (2 images)
//!     Id: 9d3a6b10-7c2e-4f55-8a0d-1e2f3a4b5c6d
//!     001 77aa0c3e-91b2-4d7f-b6a5-2c8e9f0d1a01 (image/jpeg, 48.0 KB)
//!     002 c2d41f7a-0e3b-4a9c-8d2e-5f6a7b8c9d9b (image/png, 512 B)
//! ```
//!
//! ## Generation
//!
//! ```text
//! Montage ready (image/png, 310.4 KB)
//!     Text: Here is your product on the character.
//!     Saved: montage.png
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::album::{AddOutcome, Album};
use crate::image::Image;
use crate::montage::GenerationState;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

/// Human-readable byte size: `512 B`, `2.1 KB`, `3.4 MB`.
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

/// Format an entity header: positional index + title, with optional count.
///
/// ```text
/// 001 Outfits (2 images)
/// 002 Shoes
/// ```
fn entity_header(index: usize, title: &str, count: Option<usize>) -> String {
    match count {
        Some(n) => format!("{} {} ({})", format_index(index), title, plural(n, "image", "images")),
        None => format!("{} {}", format_index(index), title),
    }
}

/// Format an image line: full id plus type and size.
///
/// ```text
/// 001 5f0c2a9e-3b1d-4c6a-9f1e-0b7d2c4e81e1 (image/png, 2.1 KB)
/// ```
fn image_line(index: usize, image: &Image) -> String {
    format!(
        "{} {} ({}, {})",
        format_index(index),
        image.id(),
        image.mime_type(),
        format_size(image.len())
    )
}

// ============================================================================
// Album
// ============================================================================

/// Format the album as a two-level inventory: root images, then folders.
pub fn format_album(user: &str, album: &Album) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {}, {}",
        user,
        plural(album.image_count(), "image", "images"),
        plural(album.folders.len(), "folder", "folders")
    )];

    if album.is_empty() {
        lines.push(format!("{}(empty)", indent(1)));
        return lines;
    }

    if !album.root_images.is_empty() {
        lines.push("Root".to_string());
        for (i, image) in album.root_images.iter().enumerate() {
            lines.push(format!("{}{}", indent(1), image_line(i + 1, image)));
        }
    }

    if !album.folders.is_empty() {
        lines.push("Folders".to_string());
        for (i, folder) in album.folders.iter().enumerate() {
            lines.push(entity_header(i + 1, &folder.name, Some(folder.images.len())));
            lines.push(format!("{}Id: {}", indent(1), folder.id));
            for (j, image) in folder.images.iter().enumerate() {
                lines.push(format!("{}{}", indent(1), image_line(j + 1, image)));
            }
        }
    }

    lines
}

pub fn print_album(user: &str, album: &Album) {
    for line in format_album(user, album) {
        println!("{}", line);
    }
}

/// One line describing what an upload did to the album.
pub fn format_add_outcome(outcome: &AddOutcome) -> String {
    match outcome {
        AddOutcome::Added(id) => format!("Added {}", id),
        AddOutcome::Duplicate(id) => format!("Already in album as {}", id),
        AddOutcome::IdConflict(id) => format!("Id {} is taken by another image; not added", id),
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Format the montage state, with the path the image was written to if any.
pub fn format_generation_state(state: &GenerationState, saved_to: Option<&Path>) -> Vec<String> {
    match state {
        GenerationState::Idle => vec!["No montage yet".to_string()],
        GenerationState::Loading => vec!["Generating montage...".to_string()],
        GenerationState::Failed(message) => vec![format!("Montage failed: {}", message)],
        GenerationState::Succeeded(montage) => {
            let mut lines = vec![format!(
                "Montage ready ({}, {})",
                montage.image.mime_type(),
                format_size(montage.image.len())
            )];
            if let Some(text) = montage.text.as_deref()
                && !text.trim().is_empty()
            {
                lines.push(format!("{}Text: {}", indent(1), text.trim()));
            }
            if let Some(path) = saved_to {
                lines.push(format!("{}Saved: {}", indent(1), path.display()));
            }
            lines
        }
    }
}

pub fn print_generation_state(state: &GenerationState, saved_to: Option<&Path>) {
    for line in format_generation_state(state, saved_to) {
        println!("{}", line);
    }
}
