//! The product album: unfiled root images plus named folders.
//!
//! The album is a fixed two-level tree. Root images sit directly in the album;
//! folders hold their own image lists and cannot be nested. This shape is
//! encoded as two parallel collections rather than a recursive tree:
//!
//! ```text
//! Album
//! ├── root_images: [img-c, img-b]        # most recent first
//! └── folders
//!     ├── Outfits   [img-a]
//!     └── Shoes     []
//! ```
//!
//! ## Invariants
//!
//! - Every image id appears in at most one location across the root list and
//!   all folder lists.
//! - Folder ids are unique.
//! - Order is insertion order. New uploads are prepended to the root list;
//!   moves and folder deletion append.
//!
//! Every mutating operation is total: an unknown image or folder id is a
//! no-op, never an error. Mutators return whether the album changed so the
//! caller can skip a write when nothing happened.

use crate::image::{Image, ImageId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Name given to folders created without an explicit name.
pub const DEFAULT_FOLDER_NAME: &str = "New folder";

/// Opaque folder identity, unique within an album.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(String);

impl FolderId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FolderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FolderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named folder of images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub images: Vec<Image>,
}

impl Folder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            id: FolderId::generate(),
            name: name.into(),
            images: Vec::new(),
        }
    }
}

/// Where an image lives: the root list or a specific folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Root,
    Folder(FolderId),
}

impl Location {
    /// `None` means root, matching how move destinations are expressed.
    fn from_folder(folder: Option<FolderId>) -> Self {
        match folder {
            Some(id) => Location::Folder(id),
            None => Location::Root,
        }
    }
}

/// Result of [`Album::add_root_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The image was prepended to the root list.
    Added(ImageId),
    /// An image with the same bytes already exists; nothing was inserted.
    Duplicate(ImageId),
    /// The id already names a different image; nothing was inserted.
    IdConflict(ImageId),
}

impl AddOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, AddOutcome::Added(_))
    }

    /// Id of the album entry involved.
    pub fn image_id(&self) -> &ImageId {
        match self {
            AddOutcome::Added(id) | AddOutcome::Duplicate(id) | AddOutcome::IdConflict(id) => id,
        }
    }
}

/// Invariant violations found by [`Album::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumViolation {
    DuplicateImage(ImageId),
    DuplicateFolder(FolderId),
}

impl fmt::Display for AlbumViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlbumViolation::DuplicateImage(id) => {
                write!(f, "image {id} appears in more than one location")
            }
            AlbumViolation::DuplicateFolder(id) => write!(f, "folder id {id} is not unique"),
        }
    }
}

/// A user's product album.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub root_images: Vec<Image>,
    pub folders: Vec<Folder>,
}

impl Album {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_empty(&self) -> bool {
        self.root_images.is_empty() && self.folders.is_empty()
    }

    /// Total number of images across the root list and all folders.
    pub fn image_count(&self) -> usize {
        self.root_images.len() + self.folders.iter().map(|f| f.images.len()).sum::<usize>()
    }

    /// All images, root first, then each folder in order.
    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.root_images
            .iter()
            .chain(self.folders.iter().flat_map(|f| f.images.iter()))
    }

    pub fn find_image(&self, id: &ImageId) -> Option<&Image> {
        self.images().find(|img| img.id() == id)
    }

    /// Find an image holding the same bytes as `image`.
    pub fn find_by_content(&self, image: &Image) -> Option<&Image> {
        self.images().find(|existing| existing.same_content(image))
    }

    pub fn find_folder(&self, id: &FolderId) -> Option<&Folder> {
        self.folders.iter().find(|f| &f.id == id)
    }

    /// Where an image currently lives, or `None` if it isn't in the album.
    pub fn locate(&self, id: &ImageId) -> Option<Location> {
        if self.root_images.iter().any(|img| img.id() == id) {
            return Some(Location::Root);
        }
        self.folders
            .iter()
            .find(|f| f.images.iter().any(|img| img.id() == id))
            .map(|f| Location::Folder(f.id.clone()))
    }

    /// Check the membership and folder-id invariants.
    pub fn validate(&self) -> Result<(), AlbumViolation> {
        let mut folder_ids = HashSet::new();
        for folder in &self.folders {
            if !folder_ids.insert(&folder.id) {
                return Err(AlbumViolation::DuplicateFolder(folder.id.clone()));
            }
        }
        let mut image_ids = HashSet::new();
        for image in self.images() {
            if !image_ids.insert(image.id()) {
                return Err(AlbumViolation::DuplicateImage(image.id().clone()));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Prepend an uploaded image unless its bytes are already in the album.
    pub fn add_root_image(&mut self, image: Image) -> AddOutcome {
        if let Some(existing) = self.find_by_content(&image) {
            return AddOutcome::Duplicate(existing.id().clone());
        }
        if self.locate(image.id()).is_some() {
            return AddOutcome::IdConflict(image.id().clone());
        }
        let id = image.id().clone();
        self.root_images.insert(0, image);
        AddOutcome::Added(id)
    }

    /// Remove an image from wherever it lives. Returns the removed image.
    pub fn remove_image(&mut self, id: &ImageId) -> Option<Image> {
        if let Some(pos) = self.root_images.iter().position(|img| img.id() == id) {
            return Some(self.root_images.remove(pos));
        }
        self.folders.iter_mut().find_map(|folder| {
            folder
                .images
                .iter()
                .position(|img| img.id() == id)
                .map(|pos| folder.images.remove(pos))
        })
    }

    /// Append a new empty folder and return its id.
    pub fn create_folder(&mut self, name: impl Into<String>) -> FolderId {
        let folder = Folder::new(name);
        let id = folder.id.clone();
        self.folders.push(folder);
        id
    }

    pub fn create_default_folder(&mut self) -> FolderId {
        self.create_folder(DEFAULT_FOLDER_NAME)
    }

    /// Set a folder's display name. Blank names are the caller's problem.
    pub fn rename_folder(&mut self, id: &FolderId, new_name: impl Into<String>) -> bool {
        match self.folders.iter_mut().find(|f| &f.id == id) {
            Some(folder) => {
                let new_name = new_name.into();
                if folder.name == new_name {
                    return false;
                }
                folder.name = new_name;
                true
            }
            None => false,
        }
    }

    /// Delete a folder, moving its images to the end of the root list.
    pub fn delete_folder(&mut self, id: &FolderId) -> bool {
        let Some(pos) = self.folders.iter().position(|f| &f.id == id) else {
            return false;
        };
        let folder = self.folders.remove(pos);
        self.root_images.extend(folder.images);
        true
    }

    /// Move an image to a folder (`Some`) or back to the root list (`None`).
    ///
    /// Moving to the current location, an unknown image, or an unknown
    /// destination folder are all no-ops.
    pub fn move_image(&mut self, id: &ImageId, destination: Option<&FolderId>) -> bool {
        let Some(source) = self.locate(id) else {
            return false;
        };
        let target = Location::from_folder(destination.cloned());
        if source == target {
            return false;
        }
        if let Location::Folder(dest) = &target
            && self.find_folder(dest).is_none()
        {
            return false;
        }

        let Some(image) = self.remove_image(id) else {
            return false;
        };
        match target {
            Location::Root => self.root_images.push(image),
            Location::Folder(dest) => {
                if let Some(folder) = self.folders.iter_mut().find(|f| f.id == dest) {
                    folder.images.push(image);
                }
            }
        }
        true
    }
}
