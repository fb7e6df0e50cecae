//! Shared test utilities for the product-montage test suite.
//!
//! Provides image builders, album lookups that panic with a readable message
//! on a miss, and the single-membership invariant assertion.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut album = album_with_root(&[("a", b"1"), ("b", b"2")]);
//! let folder = album.create_folder("Outfits");
//! album.move_image(&"a".into(), Some(&folder));
//!
//! assert_eq!(folder_image_ids(&album, "Outfits"), vec!["a"]);
//! assert_single_membership(&album);
//! ```

use std::collections::HashMap;

use crate::album::{Album, Folder};
use crate::image::Image;

// =========================================================================
// Builders
// =========================================================================

/// A PNG-typed image with a fixed id and payload.
pub fn image_with(id: &str, payload: &[u8]) -> Image {
    Image::with_id(id.into(), payload.to_vec(), "image/png").unwrap()
}

/// An album whose root list holds the given images in the given order.
pub fn album_with_root(images: &[(&str, &[u8])]) -> Album {
    Album {
        root_images: images.iter().map(|(id, p)| image_with(id, p)).collect(),
        folders: Vec::new(),
    }
}

// =========================================================================
// Lookups (panic with a clear message on miss)
// =========================================================================

/// Find a folder by name. Panics if not found.
pub fn find_folder<'a>(album: &'a Album, name: &str) -> &'a Folder {
    album
        .folders
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| {
            let names = folder_names(album);
            panic!("folder '{name}' not found. Available: {names:?}")
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// Root image ids in album order.
pub fn root_ids(album: &Album) -> Vec<&str> {
    album.root_images.iter().map(|i| i.id().as_str()).collect()
}

/// Folder names in album order.
pub fn folder_names(album: &Album) -> Vec<&str> {
    album.folders.iter().map(|f| f.name.as_str()).collect()
}

/// Image ids inside the named folder.
pub fn folder_image_ids<'a>(album: &'a Album, name: &str) -> Vec<&'a str> {
    find_folder(album, name)
        .images
        .iter()
        .map(|i| i.id().as_str())
        .collect()
}

// =========================================================================
// Invariants
// =========================================================================

/// Assert every image id appears in exactly one location.
pub fn assert_single_membership(album: &Album) {
    let mut seen: HashMap<&str, Vec<String>> = HashMap::new();
    for img in &album.root_images {
        seen.entry(img.id().as_str()).or_default().push("root".into());
    }
    for folder in &album.folders {
        for img in &folder.images {
            seen.entry(img.id().as_str())
                .or_default()
                .push(format!("folder '{}'", folder.name));
        }
    }
    for (id, places) in seen {
        assert_eq!(places.len(), 1, "image '{id}' found in {places:?}");
    }
}
