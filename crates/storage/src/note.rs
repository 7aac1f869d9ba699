use chrono::{DateTime, Utc};
use scoremark_core::PageAnnotation;
use scoremark_render::{SourceKind, SourceRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for a document that can be annotated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceItem {
    pub id: String,
    pub title: String,
    pub source_ref: SourceRef,
    pub source_kind: SourceKind,
}

/// One user's annotation set for one source document
///
/// `annotations` is replaced wholesale on every save, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedNote {
    pub id: Uuid,
    pub owner: String,
    pub source_ref: SourceRef,
    pub title: String,
    pub annotations: Vec<PageAnnotation>,
    /// Base64 PNG of the page on screen when the note was last saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedNote {
    pub fn new(
        owner: impl Into<String>,
        source_ref: SourceRef,
        title: impl Into<String>,
        annotations: Vec<PageAnnotation>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            source_ref,
            title: title.into(),
            annotations,
            thumbnail: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the annotation payload and bump `updated_at`
    pub fn replace_annotations(&mut self, annotations: Vec<PageAnnotation>) {
        self.annotations = annotations;
        self.updated_at = Utc::now();
    }
}
