//! Scoremark render library
//!
//! Source fetching, the paginated-document engine, the document session, per-surface
//! render slots and the two-layer page surface. Ink is rasterized here too, so every
//! consumer draws annotations with the same code.

pub mod engine;
pub mod error;
pub mod font;
pub mod ink;
pub mod raster;
pub mod renderer;
pub mod session;
pub mod source;
pub mod surface;

pub use engine::{
    default_engine, DocumentHandle, EngineError, LopdfEngine, PageEngine, PageSize, RgbaImage,
};
pub use error::RasterError;
pub use font::{Font, FontError, FontMetrics};
pub use ink::{paint_page, render_overlay};
pub use renderer::{PageRenderer, RenderEvent, RenderRequest, RenderedPage, SurfaceId};
pub use session::DocumentSession;
pub use source::{DirectoryFetcher, FetchError, MemoryFetcher, SourceFetcher, SourceKind, SourceRef};
pub use surface::LayeredCanvas;

#[cfg(feature = "pdfium")]
pub use engine::pdfium_backend::PdfiumEngine;
