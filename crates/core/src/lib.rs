//! Scoremark core
//!
//! Annotation model, stroke geometry, canvas normalization, the per-document
//! annotation store and lasso hit-testing. Everything here is pure and synchronous.

pub mod canvas;
pub mod config;
pub mod geometry;
pub mod lasso;
pub mod model;
pub mod store;
pub mod units;

pub use canvas::{
    fit_scale, image_scale_factor, CanvasGeometry, CanvasLimits, CanvasSize, DisplayTransform,
    RenderContext, DEFAULT_SCALE, MIN_SCALE,
};
pub use config::{ConfigError, EngineConfig};
pub use geometry::{
    fill_path, outline_options, stroke_fill_path, FillPath, OutlineOptions, QuadSegment, Vec2,
};
pub use lasso::{point_in_polygon, select_strokes, Selection};
pub use model::{Color, PageAnnotation, Stroke, StrokePoint, StrokeTool, TextElement};
pub use store::{AnnotationStore, StoreError};
