//! Paginated document engines
//!
//! An engine opens PDF bytes and rasterizes single pages to an exact canvas size.
//! The default [`LopdfEngine`] reads geometry with `lopdf` and produces a blank page
//! of the right size; the `pdfium` feature adds a real rasterizer.

use std::collections::HashMap;

use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use scoremark_core::CanvasSize;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Page size used when a page declares no usable MediaBox (US Letter)
pub const FALLBACK_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("engine is not ready")]
    NotReady,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Rasterizer for paginated documents
pub trait PageEngine {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, EngineError>;
    /// Render one page scaled to exactly `target` pixels
    fn render_page(&self, handle: DocumentHandle, page_index: u32, target: CanvasSize)
        -> Result<RgbaImage, EngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError>;
}

/// Size of a page, following `Parent` links for an inherited MediaBox
pub fn resolve_page_size(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")?;
    let array = match media_box {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        other => other.as_array().ok()?,
    };
    if array.len() != 4 {
        return None;
    }

    let number = |obj: &Object| match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    };
    let x0 = number(&array[0])?;
    let y0 = number(&array[1])?;
    let x1 = number(&array[2])?;
    let y1 = number(&array[3])?;

    let size = PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() };
    (size.width_pt > 0.0 && size.height_pt > 0.0).then_some(size)
}

/// Look up a page attribute on the page or the nearest ancestor that defines it
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    // Page trees are shallow; the bound only guards against Parent cycles
    for _ in 0..64 {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, EngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(EngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let sizes: Vec<PageSize> = doc
            .get_pages()
            .into_values()
            .map(|page_id| resolve_page_size(&doc, page_id).unwrap_or(FALLBACK_PAGE_SIZE))
            .collect();

        if sizes.is_empty() {
            return Err(EngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, EngineError> {
        self.docs.get(&handle).ok_or(EngineError::InvalidHandle(handle.raw()))
    }
}

impl PageEngine for LopdfEngine {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError> {
        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, EngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(EngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: CanvasSize,
    ) -> Result<RgbaImage, EngineError> {
        self.page_size(handle, page_index)?;

        let width = target.width.max(1);
        let height = target.height.max(1);
        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            let edge = Rgba([220, 220, 220, 255]);
            for x in 0..width {
                image.put_pixel(x, 0, edge);
                image.put_pixel(x, height - 1, edge);
            }
            for y in 0..height {
                image.put_pixel(0, y, edge);
                image.put_pixel(width - 1, y, edge);
            }
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(EngineError::InvalidHandle(handle.raw()))
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// PDFium-backed rasterizer
    pub struct PdfiumEngine {
        pdfium: &'static Pdfium,
        next_handle: u64,
        docs: HashMap<DocumentHandle, PdfDocument<'static>>,
    }

    impl PdfiumEngine {
        /// Bind the PDFium library from the working directory or the system
        pub fn from_system_library() -> Result<Self, EngineError> {
            let local = Pdfium::pdfium_platform_library_name_at_path("./");
            let bindings = Pdfium::bind_to_library(local)
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|err| {
                    EngineError::Backend(format!("failed to bind pdfium library: {err}"))
                })?;

            Ok(Self {
                pdfium: Box::leak(Box::new(Pdfium::new(bindings))),
                next_handle: 0,
                docs: HashMap::new(),
            })
        }

        fn document(&self, handle: DocumentHandle) -> Result<&PdfDocument<'static>, EngineError> {
            self.docs.get(&handle).ok_or(EngineError::InvalidHandle(handle.raw()))
        }

        fn page(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PdfPage<'_>, EngineError> {
            let document = self.document(handle)?;
            let page_count = document.pages().len() as u32;
            let out_of_range = || EngineError::PageOutOfRange { page: page_index, page_count };
            let index = u16::try_from(page_index).map_err(|_| out_of_range())?;
            document.pages().get(index).map_err(|_| out_of_range())
        }
    }

    impl PageEngine for PdfiumEngine {
        fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError> {
            let document = self
                .pdfium
                .load_pdf_from_byte_vec(bytes, None)
                .map_err(|err| EngineError::Backend(err.to_string()))?;

            self.next_handle += 1;
            let handle = DocumentHandle(self.next_handle);
            self.docs.insert(handle, document);
            Ok(handle)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError> {
            Ok(self.document(handle)?.pages().len() as u32)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, EngineError> {
            let page = self.page(handle, page_index)?;
            Ok(PageSize { width_pt: page.width().value, height_pt: page.height().value })
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            page_index: u32,
            target: CanvasSize,
        ) -> Result<RgbaImage, EngineError> {
            let page = self.page(handle, page_index)?;
            let width = target.width.max(1);
            let height = target.height.max(1);
            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);

            let bitmap = page
                .render_with_config(&config)
                .map_err(|err| EngineError::Backend(err.to_string()))?;

            RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes().to_vec())
                .ok_or_else(|| EngineError::Backend("pdfium bitmap size mismatch".to_owned()))
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError> {
            self.docs.remove(&handle).map(|_| ()).ok_or(EngineError::InvalidHandle(handle.raw()))
        }
    }
}

/// The engine used when no other backend is configured
pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
