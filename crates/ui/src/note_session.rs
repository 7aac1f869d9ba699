//! Save flow for an editing session
//!
//! The first explicit save creates the note; later saves replace its whole
//! annotation payload. A failed save leaves the editor untouched, still dirty, so
//! the user can retry without losing ink.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::{self, FilterType};
use image::ImageFormat;
use scoremark_render::RgbaImage;
use scoremark_storage::{NoteRepository, PersistenceError, SavedNote};

use crate::editor::Editor;

/// Thumbnail width in pixels
pub const THUMBNAIL_WIDTH: u32 = 240;

pub struct NoteSession<R> {
    repository: R,
    owner: String,
    title: String,
    note: Option<SavedNote>,
}

impl<R: NoteRepository> NoteSession<R> {
    /// Session for a note that has not been saved yet
    pub fn new(repository: R, owner: impl Into<String>, title: impl Into<String>) -> Self {
        Self { repository, owner: owner.into(), title: title.into(), note: None }
    }

    /// Session continuing an existing note
    pub fn resume(repository: R, note: SavedNote) -> Self {
        Self { repository, owner: note.owner.clone(), title: note.title.clone(), note: Some(note) }
    }

    pub fn note(&self) -> Option<&SavedNote> {
        self.note.as_ref()
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    /// Persist the editor's full payload
    pub fn save(&mut self, editor: &mut Editor) -> Result<&SavedNote, PersistenceError> {
        let revision = editor.store().revision();
        let annotations = editor.store().to_payload();

        let mut note = match &self.note {
            Some(existing) => {
                let mut note = existing.clone();
                note.replace_annotations(annotations);
                note
            }
            None => SavedNote::new(
                self.owner.clone(),
                editor.source().clone(),
                self.title.clone(),
                annotations,
            ),
        };
        note.thumbnail = thumbnail_base64(&editor.canvas().flatten(), THUMBNAIL_WIDTH);

        if let Err(err) = self.repository.save(&note) {
            tracing::warn!(
                error = %err,
                source = %editor.source(),
                "save failed, keeping unsaved changes"
            );
            return Err(err);
        }

        editor.mark_saved(revision);
        tracing::info!(note = %note.id, pages = note.annotations.len(), "annotations saved");
        Ok(self.note.insert(note))
    }

    /// Delete the saved note, if it was ever saved
    pub fn delete(&mut self) -> Result<(), PersistenceError> {
        if let Some(note) = &self.note {
            self.repository.delete(note.id)?;
            tracing::info!(note = %note.id, "note deleted");
        }
        self.note = None;
        Ok(())
    }
}

/// Downscaled PNG of `image`, base64 encoded
pub fn thumbnail_base64(image: &RgbaImage, max_width: u32) -> Option<String> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let thumb = if width > max_width {
        let scaled_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
        imageops::resize(image, max_width, scaled_height, FilterType::Triangle)
    } else {
        image.clone()
    };

    let mut png = Cursor::new(Vec::new());
    match thumb.write_to(&mut png, ImageFormat::Png) {
        Ok(()) => Some(STANDARD.encode(png.into_inner())),
        Err(err) => {
            tracing::warn!(error = %err, "thumbnail encoding failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Tool;
    use crate::test_support::{shared_session, PDF_REF};
    use scoremark_core::{Color, EngineConfig};
    use scoremark_storage::MemoryRepository;
    use uuid::Uuid;

    /// Repository whose writes fail until `online` is set
    #[derive(Default)]
    struct FlakyRepository {
        online: bool,
        inner: MemoryRepository,
    }

    impl NoteRepository for FlakyRepository {
        fn get(&self, id: Uuid) -> Result<SavedNote, PersistenceError> {
            self.inner.get(id)
        }

        fn list_by_owner(&self, owner: &str) -> Result<Vec<SavedNote>, PersistenceError> {
            self.inner.list_by_owner(owner)
        }

        fn save(&mut self, note: &SavedNote) -> Result<(), PersistenceError> {
            if !self.online {
                return Err(PersistenceError::Unavailable("offline".to_owned()));
            }
            self.inner.save(note)
        }

        fn delete(&mut self, id: Uuid) -> Result<(), PersistenceError> {
            self.inner.delete(id)
        }
    }

    fn open_editor() -> Editor {
        let config = EngineConfig::default();
        let mut editor =
            Editor::open(shared_session(), PDF_REF.into(), None, vec![], &config).unwrap();
        editor.settle().unwrap();
        editor
    }

    fn editor() -> Editor {
        let mut editor = open_editor();
        editor.pointer_down(10.0, 10.0, None);
        editor.pointer_move(60.0, 10.0, None);
        editor.pointer_up(120.0, 10.0, None).unwrap();
        editor
    }

    #[test]
    fn test_first_save_creates_then_replaces() {
        let mut editor = editor();
        let mut session = NoteSession::new(MemoryRepository::new(), "ana", "Air");

        let id = session.save(&mut editor).unwrap().id;
        assert!(!editor.is_dirty());
        assert!(session.note().unwrap().thumbnail.is_some());

        editor.undo();
        assert!(editor.is_dirty());
        assert_eq!(session.save(&mut editor).unwrap().id, id);

        let stored = session.repository().get(id).unwrap();
        assert_eq!(stored.annotations.len(), 3);
        assert!(stored.annotations[0].is_empty());
        assert_eq!(session.repository().len(), 1);
    }

    #[test]
    fn test_failed_save_keeps_ink_and_dirty_flag() {
        let mut editor = editor();
        let mut session = NoteSession::new(FlakyRepository::default(), "ana", "Air");

        assert!(matches!(session.save(&mut editor), Err(PersistenceError::Unavailable(_))));
        assert!(editor.is_dirty());
        assert_eq!(editor.store().page(0).unwrap().strokes.len(), 1);
        assert!(session.note().is_none());

        session.repository_mut().online = true;
        session.save(&mut editor).unwrap();
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_delete() {
        let mut editor = editor();
        let mut session = NoteSession::new(MemoryRepository::new(), "ana", "Air");
        let id = session.save(&mut editor).unwrap().id;

        session.delete().unwrap();
        assert!(session.note().is_none());
        assert!(session.repository().get(id).is_err());
    }

    #[test]
    fn test_thumbnail_shows_current_page() {
        let mut editor = open_editor();
        editor.go_to_page(1).unwrap();
        editor.settle().unwrap();
        editor.set_tool(Tool::Pen { color: Color::RED, size: 40.0 }).unwrap();
        editor.pointer_down(100.0, 400.0, None);
        editor.pointer_move(600.0, 400.0, None);
        editor.pointer_up(1100.0, 400.0, None).unwrap();

        let mut session = NoteSession::new(MemoryRepository::new(), "ana", "Air");
        let encoded = session.save(&mut editor).unwrap().thumbnail.clone().unwrap();
        let thumb = image::load_from_memory(&STANDARD.decode(encoded).unwrap()).unwrap().to_rgba8();

        assert!(thumb.pixels().any(|p| p[0] > 200 && p[1] < 100 && p[2] < 100));
    }

    #[test]
    fn test_thumbnail_is_small_png() {
        let image = RgbaImage::from_pixel(1224, 1584, image::Rgba([255, 255, 255, 255]));
        let encoded = thumbnail_base64(&image, THUMBNAIL_WIDTH).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();

        assert_eq!(decoded.width(), THUMBNAIL_WIDTH);
        assert_eq!(decoded.height(), 310);
    }
}
