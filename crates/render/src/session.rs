//! Document session
//!
//! Holds the one open source document: the engine handle (or decoded image) and its
//! page count. Opening is lazy on first access to a source ref and reused across page
//! navigation. Switching to another source closes the old one first, and dropping the
//! session closes whatever is open.

use image::imageops::{self, FilterType};
use scoremark_core::{CanvasGeometry, CanvasLimits};

use crate::engine::{DocumentHandle, PageEngine, RgbaImage};
use crate::error::RasterError;
use crate::source::{SourceFetcher, SourceKind, SourceRef};

enum Content {
    Image(RgbaImage),
    Paginated { handle: DocumentHandle, page_count: u32 },
}

struct OpenDocument {
    reference: SourceRef,
    kind: SourceKind,
    content: Content,
}

pub struct DocumentSession {
    fetcher: Box<dyn SourceFetcher>,
    engine: Box<dyn PageEngine>,
    limits: CanvasLimits,
    current: Option<OpenDocument>,
    opens: u64,
}

impl DocumentSession {
    pub fn new(fetcher: Box<dyn SourceFetcher>, engine: Box<dyn PageEngine>) -> Self {
        Self { fetcher, engine, limits: CanvasLimits::default(), current: None, opens: 0 }
    }

    pub fn with_limits(mut self, limits: CanvasLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> CanvasLimits {
        self.limits
    }

    /// Open `reference` unless it is already the open document
    ///
    /// `kind` is sniffed from the bytes when not given.
    pub fn open(
        &mut self,
        reference: &SourceRef,
        kind: Option<SourceKind>,
    ) -> Result<(), RasterError> {
        if self.is_open(reference) {
            return Ok(());
        }
        self.close();

        let bytes = self.fetcher.fetch(reference).map_err(|err| RasterError::load(reference, err))?;
        let kind = kind
            .or_else(|| SourceKind::sniff(&bytes))
            .ok_or_else(|| RasterError::load(reference, "unrecognized source format"))?;

        let content = match kind {
            SourceKind::Image => {
                let image = image::load_from_memory(&bytes)
                    .map_err(|err| RasterError::load(reference, err))?;
                Content::Image(image.to_rgba8())
            }
            SourceKind::Paginated => {
                let handle = self.engine.open(bytes).map_err(|err| match err {
                    crate::engine::EngineError::NotReady => RasterError::Engine(err),
                    other => RasterError::load(reference, other),
                })?;
                let page_count = self.engine.page_count(handle)?;
                Content::Paginated { handle, page_count }
            }
        };

        self.opens += 1;
        tracing::debug!(source = %reference, ?kind, "opened source document");
        self.current = Some(OpenDocument { reference: reference.clone(), kind, content });
        Ok(())
    }

    pub fn is_open(&self, reference: &SourceRef) -> bool {
        self.current.as_ref().is_some_and(|doc| &doc.reference == reference)
    }

    pub fn current_source(&self) -> Option<&SourceRef> {
        self.current.as_ref().map(|doc| &doc.reference)
    }

    pub fn kind(&self) -> Option<SourceKind> {
        self.current.as_ref().map(|doc| doc.kind)
    }

    /// How many times a source has actually been opened
    pub fn open_count(&self) -> u64 {
        self.opens
    }

    pub fn page_count(&self) -> Result<u32, RasterError> {
        let doc = self.current.as_ref().ok_or(RasterError::NoDocument)?;
        Ok(match doc.content {
            Content::Image(_) => 1,
            Content::Paginated { page_count, .. } => page_count,
        })
    }

    /// Canonical geometry of a page
    pub fn geometry(&self, page_index: u32) -> Result<CanvasGeometry, RasterError> {
        let doc = self.current.as_ref().ok_or(RasterError::NoDocument)?;
        self.check_page(page_index)?;

        match &doc.content {
            Content::Image(image) => {
                Ok(CanvasGeometry::for_image(image.width(), image.height(), &self.limits))
            }
            Content::Paginated { handle, .. } => {
                let size = self.engine.page_size(*handle, page_index)?;
                Ok(CanvasGeometry::for_page(size.width_pt as f64, size.height_pt as f64))
            }
        }
    }

    /// Rasterize a page of `reference` at its canonical canvas size
    ///
    /// Fails with [`RasterError::NotOpen`] when another source has been opened since.
    pub fn rasterize(
        &self,
        reference: &SourceRef,
        page_index: u32,
    ) -> Result<(CanvasGeometry, RgbaImage), RasterError> {
        let doc = self.current.as_ref().ok_or(RasterError::NoDocument)?;
        if &doc.reference != reference {
            return Err(RasterError::NotOpen { reference: reference.clone() });
        }
        let geometry = self.geometry(page_index)?;
        let canvas = geometry.canvas;

        let image = match &doc.content {
            Content::Image(image) => {
                if image.dimensions() == (canvas.width, canvas.height) {
                    image.clone()
                } else {
                    let (width, height) = (canvas.width.max(1), canvas.height.max(1));
                    imageops::resize(image, width, height, FilterType::Triangle)
                }
            }
            Content::Paginated { handle, .. } => {
                self.engine.render_page(*handle, page_index, canvas)?
            }
        };

        Ok((geometry, image))
    }

    fn check_page(&self, page_index: u32) -> Result<(), RasterError> {
        let page_count = self.page_count()?;
        if page_index >= page_count {
            return Err(RasterError::PageOutOfRange { page: page_index, page_count });
        }
        Ok(())
    }

    /// Release the open document, if any
    pub fn close(&mut self) {
        let Some(doc) = self.current.take() else {
            return;
        };
        if let Content::Paginated { handle, .. } = doc.content {
            if let Err(err) = self.engine.close(handle) {
                tracing::warn!(source = %doc.reference, error = %err, "failed to close document");
            }
        }
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::tests::sample_pdf;
    use crate::engine::LopdfEngine;
    use crate::source::MemoryFetcher;
    use image::{ImageFormat, Rgba};
    use scoremark_core::CanvasSize;
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 200, 200, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).expect("png should encode");
        bytes.into_inner()
    }

    fn session() -> DocumentSession {
        let fetcher = MemoryFetcher::new()
            .with("three.pdf", sample_pdf(&[(612, 792), (612, 792), (612, 792)]))
            .with("scan.png", png_bytes(300, 400))
            .with("broken.png", b"\x89PNG\r\n\x1a\nnot really".to_vec());
        DocumentSession::new(Box::new(fetcher), Box::new(LopdfEngine::new()))
    }

    #[test]
    fn test_open_is_reused_across_pages() {
        let mut session = session();
        let reference = SourceRef::new("three.pdf");
        session.open(&reference, None).unwrap();
        session.open(&reference, None).unwrap();

        assert_eq!(session.open_count(), 1);
        assert_eq!(session.page_count().unwrap(), 3);
        assert_eq!(session.kind(), Some(SourceKind::Paginated));

        let (geometry, image) = session.rasterize(&reference, 2).unwrap();
        assert_eq!(geometry.canvas, CanvasSize::new(1224, 1584));
        assert_eq!(image.dimensions(), (1224, 1584));
    }

    #[test]
    fn test_switching_source_reopens() {
        let mut session = session();
        session.open(&"three.pdf".into(), None).unwrap();
        session.open(&"scan.png".into(), None).unwrap();

        assert_eq!(session.open_count(), 2);
        assert_eq!(session.current_source(), Some(&SourceRef::new("scan.png")));
        assert_eq!(session.page_count().unwrap(), 1);

        let (geometry, image) = session.rasterize(&"scan.png".into(), 0).unwrap();
        assert_eq!(geometry.canvas, CanvasSize::new(600, 800));
        assert_eq!(image.dimensions(), (600, 800));
    }

    #[test]
    fn test_missing_and_broken_sources() {
        let mut session = session();
        let missing = session.open(&"nope.pdf".into(), None).unwrap_err();
        assert!(matches!(missing, RasterError::SourceLoad { .. }));

        let broken = session.open(&"broken.png".into(), None).unwrap_err();
        assert!(matches!(broken, RasterError::SourceLoad { .. }));
        assert!(session.current_source().is_none());
    }

    #[test]
    fn test_page_out_of_range() {
        let mut session = session();
        session.open(&"scan.png".into(), None).unwrap();
        let result = session.rasterize(&"scan.png".into(), 1);
        assert!(matches!(result, Err(RasterError::PageOutOfRange { page: 1, page_count: 1 })));
    }

    #[test]
    fn test_rasterize_refuses_a_replaced_source() {
        let mut session = session();
        session.open(&"three.pdf".into(), None).unwrap();
        session.open(&"scan.png".into(), None).unwrap();

        let result = session.rasterize(&"three.pdf".into(), 0);
        assert!(matches!(
            result,
            Err(RasterError::NotOpen { reference }) if reference.as_str() == "three.pdf"
        ));
    }

    #[test]
    fn test_close_releases_document() {
        let mut session = session();
        session.open(&"three.pdf".into(), None).unwrap();
        session.close();
        assert!(matches!(session.page_count(), Err(RasterError::NoDocument)));
    }
}
