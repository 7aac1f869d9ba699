//! TrueType font access for typed text and export labels
//!
//! Wraps the raw font bytes and parses them with `ttf-parser` on demand. Glyph
//! outlines are flattened to polygons in canvas space so the ink rasterizer can fill
//! them like strokes.

use std::fs;
use std::path::Path;

use scoremark_core::Vec2;
use ttf_parser::{name_id, Face, GlyphId, OutlineBuilder};

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read font {path}: {error}")]
    Read { path: String, error: std::io::Error },
    #[error("font data could not be parsed")]
    ParseFailed,
}

/// Vertical and bounding metrics in font units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    pub cap_height: i16,
    /// [x_min, y_min, x_max, y_max]
    pub bbox: [i16; 4],
}

#[derive(Debug, Clone)]
pub struct Font {
    data: Vec<u8>,
    metrics: FontMetrics,
    postscript_name: String,
}

impl Font {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FontError> {
        let face = Face::parse(&data, 0).map_err(|_| FontError::ParseFailed)?;

        let bbox = face.global_bounding_box();
        let metrics = FontMetrics {
            units_per_em: face.units_per_em().max(1),
            ascender: face.ascender(),
            descender: face.descender(),
            cap_height: face.capital_height().unwrap_or_else(|| face.ascender()),
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
        };

        let postscript_name = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
            .map(|name| {
                name.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect::<String>()
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "ScoremarkLabel".to_owned());

        Ok(Self { data, metrics, postscript_name })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FontError> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|error| FontError::Read { path: path.display().to_string(), error })?;
        Self::from_bytes(data)
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn metrics(&self) -> FontMetrics {
        self.metrics
    }

    pub fn postscript_name(&self) -> &str {
        &self.postscript_name
    }

    /// Glyph ids for every character, `None` if any character has no glyph
    pub fn glyph_ids(&self, text: &str) -> Option<Vec<u16>> {
        let face = self.face()?;
        text.chars().map(|ch| face.glyph_index(ch).map(|gid| gid.0)).collect()
    }

    /// Whether the font can draw every character of `text`
    pub fn covers(&self, text: &str) -> bool {
        self.glyph_ids(text).is_some()
    }

    /// Advance width of a glyph in font units
    pub fn advance(&self, glyph_id: u16) -> u16 {
        self.face().and_then(|face| face.glyph_hor_advance(GlyphId(glyph_id))).unwrap_or(0)
    }

    /// Width of `text` at `size`, counting only characters the font has
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let Some(face) = self.face() else {
            return 0.0;
        };
        let units: u32 = text
            .chars()
            .filter_map(|ch| face.glyph_index(ch))
            .map(|gid| face.glyph_hor_advance(gid).unwrap_or(0) as u32)
            .sum();
        units as f32 * size / self.metrics.units_per_em as f32
    }

    /// Outlines of `text` laid out from `(x, baseline)`, flattened to closed polygons
    ///
    /// Canvas y grows downward, font y grows upward.
    pub fn text_polygons(&self, text: &str, size: f32, x: f32, baseline: f32) -> Vec<Vec<Vec2>> {
        let Some(face) = self.face() else {
            return Vec::new();
        };
        let scale = size / self.metrics.units_per_em as f32;

        let mut polygons = Vec::new();
        let mut pen_x = x;
        for ch in text.chars() {
            let Some(gid) = face.glyph_index(ch) else {
                continue;
            };
            let mut builder = PolygonBuilder::new(pen_x, baseline, scale);
            let _ = face.outline_glyph(gid, &mut builder);
            polygons.extend(builder.finish());
            pen_x += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
        }
        polygons
    }
}

/// Collects glyph contours as flattened polygons
struct PolygonBuilder {
    origin_x: f32,
    baseline: f32,
    scale: f32,
    current: Vec<Vec2>,
    polygons: Vec<Vec<Vec2>>,
}

impl PolygonBuilder {
    const CURVE_STEPS: usize = 8;

    fn new(origin_x: f32, baseline: f32, scale: f32) -> Self {
        Self { origin_x, baseline, scale, current: Vec::new(), polygons: Vec::new() }
    }

    fn map(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }

    fn last(&self) -> Vec2 {
        self.current.last().copied().unwrap_or_default()
    }

    fn flush(&mut self) {
        let contour = std::mem::take(&mut self.current);
        if contour.len() >= 3 {
            self.polygons.push(contour);
        }
    }

    fn finish(mut self) -> Vec<Vec<Vec2>> {
        self.flush();
        self.polygons
    }
}

impl OutlineBuilder for PolygonBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.flush();
        let p = self.map(x, y);
        self.current.push(p);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.current.push(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.last();
        let c = self.map(x1, y1);
        let p1 = self.map(x, y);
        for step in 1..=Self::CURVE_STEPS {
            let t = step as f32 / Self::CURVE_STEPS as f32;
            self.current.push(p0.lerp(c, t).lerp(c.lerp(p1, t), t));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.last();
        let c1 = self.map(x1, y1);
        let c2 = self.map(x2, y2);
        let p1 = self.map(x, y);
        for step in 1..=Self::CURVE_STEPS {
            let t = step as f32 / Self::CURVE_STEPS as f32;
            let a = p0.lerp(c1, t);
            let b = c1.lerp(c2, t);
            let c = c2.lerp(p1, t);
            self.current.push(a.lerp(b, t).lerp(b.lerp(c, t), t));
        }
    }

    fn close(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const SYSTEM_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

    /// DejaVu Sans when the host has it; font tests are skipped otherwise
    pub(crate) fn system_font() -> Option<Font> {
        Font::from_file(SYSTEM_FONT).ok()
    }

    #[test]
    fn test_system_font_metrics() {
        let Some(font) = system_font() else {
            return;
        };
        let metrics = font.metrics();
        assert!(metrics.units_per_em > 0);
        assert!(metrics.ascender > 0);
        assert!(metrics.descender < 0);
        assert!(metrics.cap_height > 0 && metrics.cap_height <= metrics.ascender);
        assert_eq!(font.postscript_name(), "DejaVuSans");
    }

    #[test]
    fn test_glyph_coverage() {
        let Some(font) = system_font() else {
            return;
        };
        let ids = font.glyph_ids("Adagio 3/4").unwrap();
        assert_eq!(ids.len(), 10);
        assert!(ids.iter().all(|&id| id != 0));
        assert!(font.advance(ids[0]) > 0);

        assert!(font.glyph_ids("A\u{10FFFD}").is_none());
        assert!(!font.covers("\u{10FFFD}"));
        assert!(font.covers("cresc."));
    }

    #[test]
    fn test_text_width_grows_with_text_and_size() {
        let Some(font) = system_font() else {
            return;
        };
        let short = font.text_width("ff", 12.0);
        let long = font.text_width("fff", 12.0);
        assert!(short > 0.0);
        assert!(long > short);
        assert!((font.text_width("ff", 24.0) - short * 2.0).abs() < 1e-3);
        assert_eq!(font.text_width("", 12.0), 0.0);
    }

    #[test]
    fn test_text_polygons_stay_inside_font_box() {
        let Some(font) = system_font() else {
            return;
        };
        let (size, x, baseline) = (20.0, 10.0, 50.0);
        let polygons = font.text_polygons("Hp", size, x, baseline);
        assert!(polygons.len() >= 2);
        assert!(polygons.iter().all(|polygon| polygon.len() >= 3));

        let metrics = font.metrics();
        let scale = size / metrics.units_per_em as f32;
        let [x_min, y_min, x_max, y_max] = metrics.bbox.map(|v| v as f32 * scale);
        let width = font.text_width("Hp", size);
        let points = polygons.iter().flatten();
        for p in points.clone() {
            let (left, right) = (x + x_min - 0.5, x + width + x_max + 0.5);
            let (top, bottom) = (baseline - y_max - 0.5, baseline - y_min + 0.5);
            assert!(p.x >= left && p.x <= right, "x out of range: {p:?}");
            assert!(p.y >= top && p.y <= bottom, "y out of range: {p:?}");
        }

        // H rises above the baseline, p descends below it
        assert!(points.clone().any(|p| p.y < baseline - size * 0.5));
        assert!(points.clone().any(|p| p.y > baseline + 1.0));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(Font::from_bytes(vec![0, 1, 2, 3]), Err(FontError::ParseFailed)));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(Font::from_file("/no/such/font.ttf"), Err(FontError::Read { .. })));
    }

    #[test]
    fn test_builder_flattens_curves() {
        let mut builder = PolygonBuilder::new(10.0, 100.0, 0.5);
        builder.move_to(0.0, 0.0);
        builder.line_to(100.0, 0.0);
        builder.quad_to(100.0, 100.0, 0.0, 100.0);
        builder.close();
        let polygons = builder.finish();

        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0][0], Vec2::new(10.0, 100.0));
        assert_eq!(polygons[0].last().copied(), Some(Vec2::new(10.0, 50.0)));
        assert_eq!(polygons[0].len(), 2 + PolygonBuilder::CURVE_STEPS);
    }
}
