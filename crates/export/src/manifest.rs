//! Export manifest: what goes into one merged document

use std::fs;
use std::path::Path;

use scoremark_core::PageAnnotation;
use scoremark_storage::SourceItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Ordered list of sources to merge under one title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub title: String,
    pub items: Vec<ExportItem>,
}

/// One source in the merged document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportItem {
    #[serde(flatten)]
    pub source: SourceItem,
    /// Short structural tag drawn as a label on the item's first page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Ink burned into the item's pages, indexed by page
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<PageAnnotation>,
}

impl ExportManifest {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), items: Vec::new() }
    }

    pub fn with_item(mut self, item: ExportItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl ExportItem {
    pub fn new(source: SourceItem) -> Self {
        Self { source, key: None, annotations: Vec::new() }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_annotations(mut self, annotations: Vec<PageAnnotation>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Label text for the item's first page, if any
    pub fn label(&self) -> Option<&str> {
        self.key.as_deref().map(str::trim).filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoremark_render::SourceKind;

    #[test]
    fn test_parses_flattened_items() {
        let json = r#"{
            "title": "Spring Concert",
            "items": [
                {
                    "id": "a",
                    "title": "Air",
                    "sourceRef": "scores/air.pdf",
                    "sourceKind": "paginated",
                    "key": "Verse"
                },
                {"id": "b", "title": "Bourree", "sourceRef": "scans/b.png", "sourceKind": "image"}
            ]
        }"#;

        let manifest = ExportManifest::from_json(json).unwrap();
        assert_eq!(manifest.title, "Spring Concert");
        assert_eq!(manifest.items.len(), 2);
        assert_eq!(manifest.items[0].source.source_ref.as_str(), "scores/air.pdf");
        assert_eq!(manifest.items[0].label(), Some("Verse"));
        assert_eq!(manifest.items[1].source.source_kind, SourceKind::Image);
        assert!(manifest.items[1].key.is_none());
        assert!(manifest.items[1].annotations.is_empty());
    }

    #[test]
    fn test_blank_key_has_no_label() {
        let item = ExportItem::new(SourceItem {
            id: "a".into(),
            title: "Air".into(),
            source_ref: "a.pdf".into(),
            source_kind: SourceKind::Paginated,
        })
        .with_key("  ");
        assert_eq!(item.label(), None);
    }

    #[test]
    fn test_rejects_missing_title() {
        let result = ExportManifest::from_json(r#"{"items": []}"#);
        assert!(matches!(result, Err(ManifestError::Serde(_))));
    }
}
