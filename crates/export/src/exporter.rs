//! Merge a manifest into one downloadable document

use chrono::NaiveDate;
use lopdf::Document;
use scoremark_core::CanvasLimits;
use scoremark_render::{Font, SourceFetcher, SourceKind};
use tracing::{info, warn};

use crate::cover::{add_cover, CoverEntry};
use crate::document::OutputDocument;
use crate::error::{ExportError, ExportItemError, ItemFailure};
use crate::label::LabelFont;
use crate::manifest::{ExportItem, ExportManifest};
use crate::pages::{image_item, pdf_item};

/// Result of an export that produced a document
///
/// Items that failed are listed in `skipped`; the document holds the rest.
#[derive(Debug)]
pub struct ExportOutcome {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Titles of the items in the document, in order
    pub included: Vec<String>,
    pub skipped: Vec<ExportItemError>,
    pub page_count: usize,
}

impl ExportOutcome {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

pub struct Exporter {
    fetcher: Box<dyn SourceFetcher>,
    font: Option<Font>,
    limits: CanvasLimits,
}

impl Exporter {
    pub fn new(fetcher: Box<dyn SourceFetcher>) -> Self {
        Self { fetcher, font: None, limits: CanvasLimits::default() }
    }

    /// Font for labels and typed text in burned-in ink
    pub fn with_font(mut self, font: Font) -> Self {
        self.font = Some(font);
        self
    }

    /// Canvas ceilings; must match the editor's so image ink lines up
    pub fn with_limits(mut self, limits: CanvasLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn export(
        &self,
        manifest: &ExportManifest,
        date: NaiveDate,
    ) -> Result<ExportOutcome, ExportError> {
        let mut parts: Vec<(&ExportItem, Document)> = Vec::new();
        let mut skipped = Vec::new();

        for item in &manifest.items {
            match self.build_item(item) {
                Ok(part) => parts.push((item, part)),
                Err(reason) => {
                    warn!(
                        title = %item.source.title,
                        source = %item.source.source_ref,
                        error = %reason,
                        "export item skipped"
                    );
                    skipped.push(ExportItemError {
                        title: item.source.title.clone(),
                        source_ref: item.source.source_ref.clone(),
                        reason,
                    });
                }
            }
        }

        if parts.is_empty() && !skipped.is_empty() {
            return Err(ExportError::NothingExported(skipped));
        }

        let mut out = OutputDocument::new();
        let entries: Vec<CoverEntry> = parts
            .iter()
            .map(|(item, _)| CoverEntry {
                title: item.source.title.clone(),
                key: item.label().map(str::to_owned),
            })
            .collect();
        add_cover(&mut out, &manifest.title, &date.format("%Y-%m-%d").to_string(), &entries);

        let labels: Vec<&str> = parts.iter().filter_map(|(item, _)| item.label()).collect();
        let label_font = match &self.font {
            Some(font) if !labels.is_empty() => {
                Some(LabelFont::embed(out.doc_mut(), font, &labels))
            }
            None if !labels.is_empty() => {
                warn!(count = labels.len(), "no label font available, labels skipped");
                None
            }
            _ => None,
        };

        let mut included = Vec::with_capacity(parts.len());
        for (item, part) in parts {
            let page_ids = out.absorb(part);
            let first_page = page_ids.first();
            if let (Some(label), Some(label_font), Some(first)) =
                (item.label(), &label_font, first_page)
            {
                if let Err(err) = label_font.draw(out.doc_mut(), *first, label) {
                    warn!(title = %item.source.title, error = %err, "label skipped");
                }
            }
            included.push(item.source.title.clone());
        }

        let page_count = out.page_count();
        let mut doc = out.finish();
        doc.prune_objects();
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).map_err(|err| ExportError::Write(err.to_string()))?;

        let file_name = export_file_name(&manifest.title, date);
        info!(
            file = %file_name,
            pages = page_count,
            included = included.len(),
            skipped = skipped.len(),
            "export finished"
        );
        Ok(ExportOutcome { bytes, file_name, included, skipped, page_count })
    }

    fn build_item(&self, item: &ExportItem) -> Result<Document, ItemFailure> {
        let bytes = self.fetcher.fetch(&item.source.source_ref)?;
        let kind = SourceKind::sniff(&bytes).unwrap_or(item.source.source_kind);
        match kind {
            SourceKind::Paginated => pdf_item(&bytes, &item.annotations, self.font.as_ref()),
            SourceKind::Image => {
                image_item(&bytes, &item.annotations, &self.limits, self.font.as_ref())
            }
        }
    }
}

/// `{title}_{YYYY-MM-DD}.pdf` with characters unsafe in file names replaced
pub fn export_file_name(title: &str, date: NaiveDate) -> String {
    let mut stem: String = title
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    if stem.is_empty() {
        stem.push_str("export");
    }
    format!("{stem}_{}.pdf", date.format("%Y-%m-%d"))
}
