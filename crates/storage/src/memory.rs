use std::collections::HashMap;

use uuid::Uuid;

use crate::{newest_first, NoteRepository, PersistenceError, SavedNote, SourceCatalog, SourceItem};

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    notes: HashMap<Uuid, SavedNote>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

impl NoteRepository for MemoryRepository {
    fn get(&self, id: Uuid) -> Result<SavedNote, PersistenceError> {
        self.notes.get(&id).cloned().ok_or(PersistenceError::NotFound(id))
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<SavedNote>, PersistenceError> {
        let mut notes: Vec<SavedNote> =
            self.notes.values().filter(|note| note.owner == owner).cloned().collect();
        newest_first(&mut notes);
        Ok(notes)
    }

    fn save(&mut self, note: &SavedNote) -> Result<(), PersistenceError> {
        self.notes.insert(note.id, note.clone());
        Ok(())
    }

    fn delete(&mut self, id: Uuid) -> Result<(), PersistenceError> {
        self.notes.remove(&id).map(|_| ()).ok_or(PersistenceError::NotFound(id))
    }
}

/// Fixed set of source items
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    items: HashMap<String, SourceItem>,
}

impl MemoryCatalog {
    pub fn new(items: impl IntoIterator<Item = SourceItem>) -> Self {
        Self { items: items.into_iter().map(|item| (item.id.clone(), item)).collect() }
    }

    pub fn insert(&mut self, item: SourceItem) {
        self.items.insert(item.id.clone(), item);
    }
}

impl SourceCatalog for MemoryCatalog {
    fn source_item(&self, id: &str) -> Result<SourceItem, PersistenceError> {
        self.items.get(id).cloned().ok_or_else(|| PersistenceError::SourceNotFound(id.to_owned()))
    }
}
