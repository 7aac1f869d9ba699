//! Persistence boundary for saved notes and source metadata
//!
//! Notes are stored as opaque, fully replaced payloads. [`JsonFileRepository`] keeps
//! one versioned JSON file per note and replaces it atomically on save;
//! [`MemoryRepository`] serves tests and embedding shells.

mod json_file;
mod memory;
mod note;

use scoremark_core::PageAnnotation;
use uuid::Uuid;

pub use json_file::JsonFileRepository;
pub use memory::{MemoryCatalog, MemoryRepository};
pub use note::{SavedNote, SourceItem};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("note {0} not found")]
    NotFound(Uuid),
    #[error("source item {0} not found")]
    SourceNotFound(String),
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("unsupported note schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Read access to source document metadata
pub trait SourceCatalog {
    fn source_item(&self, id: &str) -> Result<SourceItem, PersistenceError>;
}

/// Saved notes keyed by id and owned by one user each
pub trait NoteRepository {
    fn get(&self, id: Uuid) -> Result<SavedNote, PersistenceError>;

    /// Notes for `owner`, most recently updated first
    fn list_by_owner(&self, owner: &str) -> Result<Vec<SavedNote>, PersistenceError>;

    /// Insert or fully replace a note
    fn save(&mut self, note: &SavedNote) -> Result<(), PersistenceError>;

    /// Replace a note's annotations, returning the stored note
    fn update(
        &mut self,
        id: Uuid,
        annotations: Vec<PageAnnotation>,
    ) -> Result<SavedNote, PersistenceError> {
        let mut note = self.get(id)?;
        note.replace_annotations(annotations);
        self.save(&note)?;
        Ok(note)
    }

    fn delete(&mut self, id: Uuid) -> Result<(), PersistenceError>;
}

fn newest_first(notes: &mut [SavedNote]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}
