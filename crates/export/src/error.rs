use scoremark_render::{FetchError, SourceRef};

/// Why one item could not be added
#[derive(Debug, thiserror::Error)]
pub enum ItemFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unreadable PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("unreadable image: {0}")]
    Image(#[from] image::ImageError),
    #[error("encrypted documents are not supported")]
    Encrypted,
    #[error("source has no pages")]
    Empty,
}

/// An item left out of the merged document
#[derive(Debug, thiserror::Error)]
#[error("skipped \"{title}\" ({source_ref})")]
pub struct ExportItemError {
    pub title: String,
    pub source_ref: SourceRef,
    #[source]
    pub reason: ItemFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no item could be exported ({} skipped)", .0.len())]
    NothingExported(Vec<ExportItemError>),
    #[error("failed to write the merged document: {0}")]
    Write(String),
}
