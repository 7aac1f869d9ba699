//! Scoremark export merger
//!
//! Builds one PDF from a manifest of sources: a cover page listing the items, then
//! each item's pages with its ink burned in and an optional label on its first page.
//! An item that cannot be fetched or parsed is skipped and reported, never fatal.

pub mod cover;
pub mod document;
pub mod error;
pub mod exporter;
pub mod label;
pub mod manifest;
pub mod pages;

pub use error::{ExportError, ExportItemError, ItemFailure};
pub use exporter::{export_file_name, ExportOutcome, Exporter};
pub use manifest::{ExportItem, ExportManifest, ManifestError};
