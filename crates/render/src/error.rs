use crate::engine::EngineError;
use crate::source::SourceRef;

/// Errors surfaced by the raster pipeline
///
/// None of these touch annotation state; a failed render leaves the surface's last
/// committed page in place.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("failed to load source {reference}: {message}")]
    SourceLoad { reference: SourceRef, message: String },
    #[error("render engine unavailable for {reference}")]
    EngineUnavailable { reference: SourceRef },
    #[error("render cancelled")]
    Cancelled,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("no document is open")]
    NoDocument,
    #[error("{reference} is not the open document")]
    NotOpen { reference: SourceRef },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RasterError {
    pub(crate) fn load(reference: &SourceRef, message: impl ToString) -> Self {
        Self::SourceLoad { reference: reference.clone(), message: message.to_string() }
    }

    /// Whether the engine asked to be retried later
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::Engine(EngineError::NotReady))
    }
}
