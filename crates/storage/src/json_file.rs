use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{newest_first, NoteRepository, PersistenceError, SavedNote};

const NOTE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct NoteEnvelope {
    version: u32,
    note: SavedNote,
}

/// One `<id>.json` file per note under a root directory
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn from_default_project() -> Result<Self, PersistenceError> {
        let dirs = ProjectDirs::from("dev", "Scoremark", "Scoremark")
            .ok_or(PersistenceError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().join("notes") })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn note_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read_note(path: &Path) -> Result<SavedNote, PersistenceError> {
        let bytes = fs::read(path)?;
        let envelope: NoteEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != NOTE_SCHEMA_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: envelope.version,
                expected: NOTE_SCHEMA_VERSION,
            });
        }
        Ok(envelope.note)
    }
}

impl NoteRepository for JsonFileRepository {
    fn get(&self, id: Uuid) -> Result<SavedNote, PersistenceError> {
        match Self::read_note(&self.note_path(id)) {
            Err(PersistenceError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                Err(PersistenceError::NotFound(id))
            }
            other => other,
        }
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<SavedNote>, PersistenceError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut notes = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_note(&path) {
                Ok(note) if note.owner == owner => notes.push(note),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable note")
                }
            }
        }

        newest_first(&mut notes);
        Ok(notes)
    }

    /// Written to a temporary sibling and renamed over the old file
    fn save(&mut self, note: &SavedNote) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.root)?;

        let envelope = NoteEnvelope { version: NOTE_SCHEMA_VERSION, note: note.clone() };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let path = self.note_path(note.id);
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, bytes)?;
        if let Err(err) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }

        tracing::info!(note = %note.id, owner = %note.owner, "note saved");
        Ok(())
    }

    fn delete(&mut self, id: Uuid) -> Result<(), PersistenceError> {
        match fs::remove_file(self.note_path(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(PersistenceError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }
}
