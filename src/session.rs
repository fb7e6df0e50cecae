//! The signed-in session: who is using the app, their album, and what they
//! have selected for the next montage.
//!
//! A [`Session`] is the explicit context every operation goes through. It owns
//! the storage backend, remembers the current identity in the backend's
//! identity slot, and keeps the album of that identity in memory. Every album
//! change is written through to storage immediately; a failed write is logged
//! and otherwise ignored, since the in-memory album is still correct and the
//! next successful write will catch storage up.
//!
//! Switching identity (login, signup, logout) replaces the album with the one
//! stored for the new identity and discards all transient state: both image
//! selections, the instruction text, and the last montage result.
//!
//! Authentication here is a stub. Credentials are checked for presence only
//! and the password is never stored or compared.

use crate::album::{AddOutcome, Album, FolderId};
use crate::image::{Image, ImageId};
use crate::montage::{GenerationState, MontageError, MontageGenerator, Orchestrator};
use crate::store::{self, AlbumStore, KeyValueStore};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("please enter both an email and a password")]
    MissingCredentials,
    #[error("not signed in")]
    NotSignedIn,
    #[error("folder name must not be blank")]
    BlankFolderName,
    #[error("image {0} is not in the album")]
    UnknownImage(String),
}

/// Transient choices for the next montage. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub character: Option<Image>,
    pub product: Option<Image>,
    pub instruction: String,
}

/// One user's working session.
pub struct Session {
    backend: Box<dyn KeyValueStore>,
    user: Option<String>,
    album: Album,
    selection: Selection,
    orchestrator: Orchestrator,
}

impl Session {
    /// Open a session, restoring whoever was signed in last.
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        let user = store::load_current_user(backend.as_ref());
        let album = match &user {
            Some(u) => AlbumStore::for_user(backend.as_ref(), u.as_str()).load(),
            None => Album::new(),
        };
        Self {
            backend,
            user,
            album,
            selection: Selection::default(),
            orchestrator: Orchestrator::new(),
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    pub fn current_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Sign in and load the user's stored album.
    pub fn login(&mut self, email: &str, password: &str) -> Result<(), SessionError> {
        let email = check_credentials(email, password)?;
        self.switch_user(Some(email));
        info!(user = self.current_user(), images = self.album.image_count(), "signed in");
        Ok(())
    }

    /// Sign up: like login, but the user starts over with an empty album.
    pub fn signup(&mut self, email: &str, password: &str) -> Result<(), SessionError> {
        let email = check_credentials(email, password)?;
        self.switch_user(Some(email));
        self.album = Album::new();
        self.persist();
        info!(user = self.current_user(), "signed up");
        Ok(())
    }

    pub fn logout(&mut self) {
        if let Some(user) = &self.user {
            info!(user = %user, "signed out");
        }
        self.switch_user(None);
    }

    fn switch_user(&mut self, user: Option<String>) {
        let remembered = match &user {
            Some(u) => store::save_current_user(self.backend.as_ref(), u),
            None => store::clear_current_user(self.backend.as_ref()),
        };
        if let Err(e) = remembered {
            warn!(error = %e, "could not remember current user");
        }
        self.album = match &user {
            Some(u) => self.album_store(u).load(),
            None => Album::new(),
        };
        self.user = user;
        self.selection = Selection::default();
        self.orchestrator.reset();
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn album(&self) -> &Album {
        &self.album
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn generation_state(&self) -> &GenerationState {
        self.orchestrator.state()
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn set_character_image(&mut self, image: Option<Image>) {
        self.selection.character = image;
    }

    pub fn set_instruction(&mut self, text: impl Into<String>) {
        self.selection.instruction = text.into();
    }

    pub fn clear_product_image(&mut self) {
        self.selection.product = None;
    }

    /// Upload a product image: select it, and add it to the album unless the
    /// same bytes are already there. An image whose id is already taken by
    /// different content is neither added nor selected.
    pub fn upload_product_image(&mut self, image: Image) -> Result<AddOutcome, SessionError> {
        self.require_user()?;
        let outcome = self.album.add_root_image(image.clone());
        match outcome {
            AddOutcome::Added(_) => {
                self.selection.product = Some(image);
                self.persist();
            }
            AddOutcome::Duplicate(_) => self.selection.product = Some(image),
            AddOutcome::IdConflict(_) => {}
        }
        Ok(outcome)
    }

    /// Select an album image as the product for the next montage.
    pub fn select_product(&mut self, id: &ImageId) -> Result<(), SessionError> {
        let image = self
            .album
            .find_image(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownImage(id.to_string()))?;
        self.selection.product = Some(image);
        Ok(())
    }

    // =========================================================================
    // Album operations (write-through)
    // =========================================================================

    /// Delete an image from the album, dropping it from the selection too.
    pub fn delete_image(&mut self, id: &ImageId) -> Result<bool, SessionError> {
        self.require_user()?;
        if self.selection.product.as_ref().is_some_and(|p| p.id() == id) {
            self.selection.product = None;
        }
        let removed = self.album.remove_image(id).is_some();
        if removed {
            self.persist();
        }
        Ok(removed)
    }

    /// Create a folder; `None` uses the default name.
    pub fn create_folder(&mut self, name: Option<&str>) -> Result<FolderId, SessionError> {
        self.require_user()?;
        let id = match name.map(str::trim) {
            Some(n) if !n.is_empty() => self.album.create_folder(n),
            Some(_) => return Err(SessionError::BlankFolderName),
            None => self.album.create_default_folder(),
        };
        self.persist();
        Ok(id)
    }

    /// Rename a folder. Names are trimmed; blank names are rejected.
    pub fn rename_folder(&mut self, id: &FolderId, name: &str) -> Result<bool, SessionError> {
        self.require_user()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::BlankFolderName);
        }
        let changed = self.album.rename_folder(id, name);
        if changed {
            self.persist();
        }
        Ok(changed)
    }

    pub fn delete_folder(&mut self, id: &FolderId) -> Result<bool, SessionError> {
        self.require_user()?;
        let changed = self.album.delete_folder(id);
        if changed {
            self.persist();
        }
        Ok(changed)
    }

    pub fn move_image(
        &mut self,
        id: &ImageId,
        destination: Option<&FolderId>,
    ) -> Result<bool, SessionError> {
        self.require_user()?;
        let changed = self.album.move_image(id, destination);
        if changed {
            self.persist();
        }
        Ok(changed)
    }

    // =========================================================================
    // Montage
    // =========================================================================

    /// Generate a montage from the current selection.
    ///
    /// Validation failures leave the state as it was and come back as `Err`;
    /// generation failures land in [`GenerationState::Failed`].
    pub async fn generate<G: MontageGenerator + ?Sized>(
        &mut self,
        generator: &G,
    ) -> Result<&GenerationState, MontageError> {
        self.orchestrator
            .run(
                generator,
                self.selection.character.as_ref(),
                self.selection.product.as_ref(),
                &self.selection.instruction,
            )
            .await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_user(&self) -> Result<&str, SessionError> {
        self.user.as_deref().ok_or(SessionError::NotSignedIn)
    }

    fn album_store<'a>(&'a self, user: &str) -> AlbumStore<'a> {
        AlbumStore::for_user(self.backend.as_ref(), user)
    }

    /// Write the album through to storage. Failures are logged, not raised.
    fn persist(&self) {
        let Some(user) = self.user.as_deref() else {
            return;
        };
        if let Err(e) = self.album_store(user).save(&self.album) {
            warn!(user = %user, error = %e, "failed to save album");
        }
    }
}

fn check_credentials(email: &str, password: &str) -> Result<String, SessionError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(SessionError::MissingCredentials);
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::StaticGenerator;
    use crate::store::{MemoryStore, album_key};
    use crate::test_helpers::*;
    use std::rc::Rc;

    /// A `MemoryStore` the test can keep looking at after the session owns it.
    #[derive(Clone, Default)]
    struct SharedStore(Rc<MemoryStore>);

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Result<Option<String>, store::StoreError> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), store::StoreError> {
            self.0.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), store::StoreError> {
            self.0.remove(key)
        }
    }

    fn signed_in(user: &str) -> (Session, SharedStore) {
        let backend = SharedStore::default();
        let mut session = Session::new(Box::new(backend.clone()));
        session.login(user, "secret").unwrap();
        (session, backend)
    }

    fn stored_album(backend: &SharedStore, user: &str) -> Album {
        AlbumStore::for_user(backend, user).load()
    }

    // =========================================================================
    // Identity
    // =========================================================================

    #[test]
    fn login_requires_email_and_password() {
        let mut session = Session::new(Box::new(MemoryStore::new()));
        assert_eq!(session.login("", "pw"), Err(SessionError::MissingCredentials));
        assert_eq!(session.login("a@b.c", ""), Err(SessionError::MissingCredentials));
        assert_eq!(session.current_user(), None);
    }

    #[test]
    fn new_session_restores_current_user_and_album() {
        let backend = SharedStore::default();
        {
            let mut session = Session::new(Box::new(backend.clone()));
            session.login("ana@example.com", "pw").unwrap();
            session.upload_product_image(image_with("a", b"1")).unwrap();
        }
        let session = Session::new(Box::new(backend));
        assert_eq!(session.current_user(), Some("ana@example.com"));
        assert_eq!(root_ids(session.album()), vec!["a"]);
        assert!(session.selection().product.is_none());
    }

    #[test]
    fn logout_clears_everything_transient() {
        let (mut session, backend) = signed_in("ana@example.com");
        session.upload_product_image(image_with("a", b"1")).unwrap();
        session.set_character_image(Some(image_with("c", b"c")));
        session.set_instruction("beach");

        session.logout();
        assert_eq!(session.current_user(), None);
        assert!(session.album().is_empty());
        assert!(session.selection().character.is_none());
        assert!(session.selection().product.is_none());
        assert!(session.selection().instruction.is_empty());
        assert_eq!(store::load_current_user(&backend), None);
        // The album itself survives in storage.
        assert_eq!(stored_album(&backend, "ana@example.com").image_count(), 1);
    }

    #[test]
    fn switching_user_swaps_album() {
        let (mut session, _backend) = signed_in("ana@example.com");
        session.upload_product_image(image_with("a", b"1")).unwrap();

        session.login("bo@example.com", "pw").unwrap();
        assert!(session.album().is_empty());

        session.login("ana@example.com", "pw").unwrap();
        assert_eq!(root_ids(session.album()), vec!["a"]);
    }

    #[test]
    fn signup_starts_with_empty_album() {
        let (mut session, backend) = signed_in("ana@example.com");
        session.upload_product_image(image_with("a", b"1")).unwrap();
        session.logout();

        session.signup("ana@example.com", "pw").unwrap();
        assert!(session.album().is_empty());
        assert!(stored_album(&backend, "ana@example.com").is_empty());
    }

    #[test]
    fn album_operations_need_a_user() {
        let mut session = Session::new(Box::new(MemoryStore::new()));
        assert_eq!(
            session.upload_product_image(image_with("a", b"1")),
            Err(SessionError::NotSignedIn)
        );
        assert_eq!(session.create_folder(None), Err(SessionError::NotSignedIn));
    }

    // =========================================================================
    // Uploads and selection
    // =========================================================================

    #[test]
    fn duplicate_upload_selects_without_adding() {
        let (mut session, _backend) = signed_in("u");
        session.upload_product_image(image_with("a", b"same")).unwrap();
        let outcome = session.upload_product_image(image_with("b", b"same")).unwrap();

        assert_eq!(outcome, AddOutcome::Duplicate("a".into()));
        assert_eq!(session.album().image_count(), 1);
        assert_eq!(session.selection().product.as_ref().unwrap().id().as_str(), "b");
    }

    #[test]
    fn id_conflict_neither_adds_nor_selects() {
        let (mut session, _backend) = signed_in("u");
        session.upload_product_image(image_with("a", b"1")).unwrap();
        session.clear_product_image();

        let outcome = session.upload_product_image(image_with("a", b"2")).unwrap();
        assert_eq!(outcome, AddOutcome::IdConflict("a".into()));
        assert!(session.selection().product.is_none());
        assert_eq!(session.album().find_image(&"a".into()).unwrap().payload(), b"1");
    }

    #[test]
    fn stored_album_with_empty_entry_survives_a_write() {
        let backend = SharedStore::default();
        let json = r#"{"rootImages":[{"id":"a","base64":"YWJj","mimeType":"image/png"},{"id":"b","base64":"","mimeType":"image/png"},{"id":"c","base64":"eHl6","mimeType":"image/jpeg"}],"folders":[]}"#;
        backend.set(&album_key("u"), json).unwrap();

        let mut session = Session::new(Box::new(backend.clone()));
        session.login("u", "pw").unwrap();
        assert_eq!(session.album().image_count(), 3);

        session.create_folder(Some("New")).unwrap();
        let stored = stored_album(&backend, "u");
        assert_eq!(root_ids(&stored), vec!["a", "b", "c"]);
        assert_eq!(folder_names(&stored), vec!["New"]);
    }

    #[test]
    fn deleting_selected_image_clears_selection() {
        let (mut session, backend) = signed_in("u");
        session.upload_product_image(image_with("a", b"1")).unwrap();
        assert!(session.delete_image(&"a".into()).unwrap());
        assert!(session.selection().product.is_none());
        assert!(stored_album(&backend, "u").is_empty());
    }

    #[test]
    fn deleting_other_image_keeps_selection() {
        let (mut session, _backend) = signed_in("u");
        session.upload_product_image(image_with("a", b"1")).unwrap();
        session.upload_product_image(image_with("b", b"2")).unwrap();
        session.delete_image(&"a".into()).unwrap();
        assert_eq!(session.selection().product.as_ref().unwrap().id().as_str(), "b");
    }

    #[test]
    fn select_product_from_album() {
        let (mut session, _backend) = signed_in("u");
        session.upload_product_image(image_with("a", b"1")).unwrap();
        session.clear_product_image();
        session.select_product(&"a".into()).unwrap();
        assert!(session.selection().product.is_some());
        assert_eq!(
            session.select_product(&"zz".into()),
            Err(SessionError::UnknownImage("zz".into()))
        );
    }

    // =========================================================================
    // Folders (write-through)
    // =========================================================================

    #[test]
    fn folder_operations_are_written_through() {
        let (mut session, backend) = signed_in("u");
        session.upload_product_image(image_with("a", b"1")).unwrap();
        let folder = session.create_folder(Some("  Outfits ")).unwrap();
        assert_eq!(folder_names(&stored_album(&backend, "u")), vec!["Outfits"]);

        session.move_image(&"a".into(), Some(&folder)).unwrap();
        assert_eq!(folder_image_ids(&stored_album(&backend, "u"), "Outfits"), vec!["a"]);

        session.rename_folder(&folder, "Shoes").unwrap();
        assert_eq!(folder_names(&stored_album(&backend, "u")), vec!["Shoes"]);

        session.delete_folder(&folder).unwrap();
        let stored = stored_album(&backend, "u");
        assert!(stored.folders.is_empty());
        assert_eq!(root_ids(&stored), vec!["a"]);
    }

    #[test]
    fn default_folder_name() {
        let (mut session, _backend) = signed_in("u");
        session.create_folder(None).unwrap();
        assert_eq!(folder_names(session.album()), vec![crate::album::DEFAULT_FOLDER_NAME]);
    }

    #[test]
    fn blank_folder_names_rejected() {
        let (mut session, _backend) = signed_in("u");
        assert_eq!(session.create_folder(Some("   ")), Err(SessionError::BlankFolderName));
        let folder = session.create_folder(Some("Keep")).unwrap();
        assert_eq!(
            session.rename_folder(&folder, " "),
            Err(SessionError::BlankFolderName)
        );
        assert_eq!(folder_names(session.album()), vec!["Keep"]);
    }

    #[test]
    fn noop_operations_do_not_write() {
        let (mut session, backend) = signed_in("u");
        assert!(!session.delete_folder(&"ghost".into()).unwrap());
        assert!(!session.move_image(&"ghost".into(), None).unwrap());
        assert_eq!(backend.0.get(&album_key("u")).unwrap(), None);
    }

    // =========================================================================
    // Montage
    // =========================================================================

    #[tokio::test]
    async fn generate_without_character_is_rejected() {
        let (mut session, _backend) = signed_in("u");
        session.upload_product_image(image_with("p", b"p")).unwrap();
        let generator = StaticGenerator::image_only(b"out".to_vec());

        let err = session.generate(&generator).await.unwrap_err();
        assert!(matches!(err, MontageError::MissingSelection));
        assert_eq!(session.generation_state(), &GenerationState::Idle);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn generate_then_logout_resets_result() {
        let (mut session, _backend) = signed_in("u");
        session.upload_product_image(image_with("p", b"p")).unwrap();
        session.set_character_image(Some(image_with("c", b"c")));
        let generator = StaticGenerator::image_only(b"out".to_vec());

        session.generate(&generator).await.unwrap();
        assert!(session.generation_state().montage().is_some());

        session.logout();
        assert_eq!(session.generation_state(), &GenerationState::Idle);
    }
}
