//! Two-layer page surface
//!
//! The base layer holds the rasterized source page and the overlay holds ink. Both
//! always have the same size. Ink edits repaint only the overlay, so the base raster
//! is never redrawn for an annotation change.

use image::Rgba;
use scoremark_core::{CanvasSize, PageAnnotation};

use crate::engine::RgbaImage;
use crate::font::Font;
use crate::ink::paint_page;
use crate::raster::composite_over;
use crate::renderer::RenderedPage;

#[derive(Debug, Clone)]
pub struct LayeredCanvas {
    base: RgbaImage,
    overlay: RgbaImage,
    base_page: Option<u32>,
    base_renders: u64,
    overlay_renders: u64,
}

impl LayeredCanvas {
    pub fn new(size: CanvasSize) -> Self {
        Self {
            base: RgbaImage::from_pixel(size.width, size.height, Rgba([255, 255, 255, 255])),
            overlay: RgbaImage::new(size.width, size.height),
            base_page: None,
            base_renders: 0,
            overlay_renders: 0,
        }
    }

    pub fn size(&self) -> CanvasSize {
        let (width, height) = self.base.dimensions();
        CanvasSize::new(width, height)
    }

    /// Page whose raster is currently on the base layer
    pub fn base_page(&self) -> Option<u32> {
        self.base_page
    }

    /// Put a finished page render on the base layer
    ///
    /// The canvas takes the render's size; the overlay is cleared so the caller can
    /// paint the new page's ink on top.
    pub fn commit_base(&mut self, page: &RenderedPage) {
        let (width, height) = page.image.dimensions();
        self.base = page.image.clone();
        if self.overlay.dimensions() != (width, height) {
            self.overlay = RgbaImage::new(width, height);
        } else {
            self.clear_overlay_pixels();
        }
        self.base_page = Some(page.page_index);
        self.base_renders += 1;
    }

    /// Repaint the ink layer from scratch
    pub fn repaint_overlay(&mut self, annotations: &PageAnnotation, font: Option<&Font>) {
        self.clear_overlay_pixels();
        paint_page(&mut self.overlay, annotations, font);
        self.overlay_renders += 1;
    }

    fn clear_overlay_pixels(&mut self) {
        self.overlay.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
    }

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub fn overlay(&self) -> &RgbaImage {
        &self.overlay
    }

    /// Number of base layer commits
    pub fn base_renders(&self) -> u64 {
        self.base_renders
    }

    /// Number of overlay repaints
    pub fn overlay_renders(&self) -> u64 {
        self.overlay_renders
    }

    /// Both layers composited into one image (snapshots and thumbnails only)
    pub fn flatten(&self) -> RgbaImage {
        let mut flattened = self.base.clone();
        composite_over(&mut flattened, &self.overlay);
        flattened
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceRef;
    use scoremark_core::{CanvasGeometry, Color, Stroke, StrokePoint, StrokeTool};

    fn rendered(page_index: u32, width: u32, height: u32) -> RenderedPage {
        RenderedPage {
            source: SourceRef::new("doc.pdf"),
            page_index,
            page_count: 3,
            geometry: CanvasGeometry::for_page(width as f64 / 2.0, height as f64 / 2.0),
            image: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
        }
    }

    fn ink() -> PageAnnotation {
        PageAnnotation {
            strokes: vec![Stroke::new(
                (0..20).map(|i| StrokePoint::new(5.0 + i as f32 * 4.0, 20.0)).collect(),
                StrokeTool::Pen,
                Color::BLACK,
                4.0,
                1.0,
            )],
            text_elements: vec![],
        }
    }

    #[test]
    fn test_commit_resizes_both_layers() {
        let mut canvas = LayeredCanvas::new(CanvasSize::new(10, 10));
        canvas.commit_base(&rendered(1, 100, 40));

        assert_eq!(canvas.size(), CanvasSize::new(100, 40));
        assert_eq!(canvas.overlay().dimensions(), (100, 40));
        assert_eq!(canvas.base_page(), Some(1));
    }

    #[test]
    fn test_overlay_repaint_leaves_base_alone() {
        let mut canvas = LayeredCanvas::new(CanvasSize::new(100, 40));
        canvas.commit_base(&rendered(0, 100, 40));
        canvas.repaint_overlay(&ink(), None);
        canvas.repaint_overlay(&ink(), None);

        assert_eq!(canvas.base_renders(), 1);
        assert_eq!(canvas.overlay_renders(), 2);
        assert!(canvas.base().pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_flatten_composites_ink() {
        let mut canvas = LayeredCanvas::new(CanvasSize::new(100, 40));
        canvas.commit_base(&rendered(0, 100, 40));
        canvas.repaint_overlay(&ink(), None);

        let flat = canvas.flatten();
        assert!(flat.get_pixel(40, 20)[0] < 100);
        assert_eq!(flat.get_pixel(40, 5), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_new_base_clears_overlay() {
        let mut canvas = LayeredCanvas::new(CanvasSize::new(100, 40));
        canvas.repaint_overlay(&ink(), None);
        canvas.commit_base(&rendered(2, 100, 40));
        assert!(canvas.overlay().pixels().all(|p| p[3] == 0));
    }
}
