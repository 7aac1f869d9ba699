//! Ink layer rasterization
//!
//! Paints a page's strokes and typed text onto a transparent overlay in canonical
//! pixel space. The editor, the viewer and export all go through [`paint_page`], so
//! the same annotation produces the same pixels everywhere.

use image::Rgba;
use scoremark_core::{stroke_fill_path, CanvasSize, PageAnnotation, Stroke, StrokeTool, TextElement};

use crate::engine::RgbaImage;
use crate::font::Font;
use crate::raster::{fill_polygons, Paint};

/// Flattening tolerance for stroke boundaries, in canvas pixels
const FLATTEN_TOLERANCE: f32 = 0.2;

/// Draw one stroke in a single fill
///
/// Eraser strokes clear overlay alpha under their outline. Degenerate strokes draw
/// nothing.
pub fn paint_stroke(target: &mut RgbaImage, stroke: &Stroke) {
    let path = stroke_fill_path(stroke);
    if path.is_empty() {
        return;
    }
    let polygon = path.flatten(FLATTEN_TOLERANCE);

    let paint = match stroke.tool {
        StrokeTool::Eraser => Paint::Erase,
        StrokeTool::Pen | StrokeTool::Highlighter => {
            let color = stroke.color;
            let alpha = color.a as f32 / 255.0 * stroke.opacity;
            Paint::Over { r: color.r, g: color.g, b: color.b, alpha }
        }
    };

    fill_polygons(target, &[polygon], paint);
}

/// Draw one text element; returns `false` when there is no font to draw it with
pub fn paint_text(target: &mut RgbaImage, text: &TextElement, font: Option<&Font>) -> bool {
    let Some(font) = font else {
        return false;
    };
    let polygons = font.text_polygons(&text.text, text.font_size, text.x, text.baseline_y());
    let color = text.color;
    fill_polygons(
        target,
        &polygons,
        Paint::Over { r: color.r, g: color.g, b: color.b, alpha: color.a as f32 / 255.0 },
    );
    true
}

/// Paint a whole page in z-order: strokes in recorded order, then text
pub fn paint_page(target: &mut RgbaImage, page: &PageAnnotation, font: Option<&Font>) {
    for stroke in &page.strokes {
        paint_stroke(target, stroke);
    }

    if !page.text_elements.is_empty() && font.is_none() {
        tracing::debug!(count = page.text_elements.len(), "no font loaded, typed text not drawn");
    }
    for text in &page.text_elements {
        paint_text(target, text, font);
    }
}

/// Fresh transparent overlay for a page
pub fn render_overlay(size: CanvasSize, page: &PageAnnotation, font: Option<&Font>) -> RgbaImage {
    let mut overlay = RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, 0]));
    paint_page(&mut overlay, page, font);
    overlay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::tests::system_font;
    use scoremark_core::{Color, StrokePoint};

    fn horizontal(tool: StrokeTool, color: Color, y: f32) -> Stroke {
        let points = (0..30).map(|i| StrokePoint::new(10.0 + i as f32 * 6.0, y)).collect();
        Stroke::new(points, tool, color, 6.0, 1.0)
    }

    #[test]
    fn test_pen_stroke_marks_pixels() {
        let mut overlay = RgbaImage::new(200, 100);
        paint_stroke(&mut overlay, &horizontal(StrokeTool::Pen, Color::RED, 50.0));

        let pixel = overlay.get_pixel(100, 50);
        assert_eq!(pixel[0], 255);
        assert!(pixel[3] > 200);
        assert_eq!(overlay.get_pixel(100, 10)[3], 0);
    }

    #[test]
    fn test_highlighter_is_translucent() {
        let mut overlay = RgbaImage::new(200, 100);
        paint_stroke(&mut overlay, &horizontal(StrokeTool::Highlighter, Color::YELLOW, 50.0));

        let alpha = overlay.get_pixel(100, 50)[3];
        assert_eq!(alpha, 102);
    }

    #[test]
    fn test_eraser_removes_ink() {
        let page = PageAnnotation {
            strokes: vec![
                horizontal(StrokeTool::Highlighter, Color::BLUE, 50.0),
                horizontal(StrokeTool::Eraser, Color::BLACK, 50.0),
            ],
            text_elements: vec![],
        };
        let overlay = render_overlay(CanvasSize::new(200, 100), &page, None);
        assert_eq!(overlay.get_pixel(100, 50)[3], 0);
    }

    #[test]
    fn test_single_point_stroke_is_noop() {
        let mut overlay = RgbaImage::new(20, 20);
        let stroke =
            Stroke::new(vec![StrokePoint::new(5.0, 5.0)], StrokeTool::Pen, Color::BLACK, 4.0, 1.0);
        paint_stroke(&mut overlay, &stroke);
        assert!(overlay.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut overlay = RgbaImage::new(20, 20);
        let text = TextElement::new(0.0, 0.0, "p", 12.0, Color::BLACK);
        assert!(!paint_text(&mut overlay, &text, None));
    }

    #[test]
    fn test_text_is_filled_from_glyph_outlines() {
        let Some(font) = system_font() else {
            return;
        };
        let mut overlay = RgbaImage::new(200, 80);
        let text = TextElement::new(10.0, 10.0, "Adagio", 32.0, Color::BLUE);
        assert!(paint_text(&mut overlay, &text, Some(&font)));

        let inked: Vec<(u32, u32)> = overlay
            .enumerate_pixels()
            .filter(|(_, _, p)| p[3] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(inked.len() > 100);
        assert!(inked.iter().all(|&(_, y)| y >= 10));
        assert!(overlay.enumerate_pixels().any(|(_, _, p)| p[3] > 200 && p[2] == 255 && p[0] == 0));
    }

    #[test]
    fn test_same_input_same_pixels() {
        let page = PageAnnotation {
            strokes: vec![horizontal(StrokeTool::Pen, Color::BLACK, 40.0)],
            text_elements: vec![],
        };
        let size = CanvasSize::new(220, 80);
        assert_eq!(render_overlay(size, &page, None), render_overlay(size, &page, None));
    }
}
