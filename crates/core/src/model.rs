//! Annotation data model
//!
//! Ink and text recorded on the pages of a source document. All coordinates are
//! stored in the canonical pixel space of the page (see [`crate::canvas`]), never in
//! percentages and never adjusted for device pixel ratio.

use serde::{Deserialize, Serialize};

/// Smallest stroke size a stroke can carry
pub const MIN_STROKE_SIZE: f32 = 0.5;

/// Opacity applied to every highlighter stroke
pub const HIGHLIGHTER_OPACITY: f32 = 0.4;

/// Width multiplier applied to highlighter strokes
pub const HIGHLIGHTER_WIDTH_FACTOR: f32 = 8.0;

/// RGBA color
///
/// Serialized as a `#rrggbb` hex string (or `#rrggbbaa` when not opaque) so the
/// persisted payload stays readable by other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a new color
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Convert to normalized RGBA values (0.0 to 1.0)
    pub fn to_normalized(&self) -> (f32, f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();

        match hex.len() {
            3 => {
                let expand = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Self::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Some(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, channel(6..8)?)),
            _ => None,
        }
    }

    /// Format as a hex string
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 235, 59);
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// One pointer sample in canonical pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
    /// Pen pressure in `[0, 1]`, absent for devices without pressure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f32>,
}

impl StrokePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, pressure: None }
    }

    pub fn with_pressure(x: f32, y: f32, pressure: f32) -> Self {
        Self { x, y, pressure: Some(pressure.clamp(0.0, 1.0)) }
    }

    /// Calculate distance to another point
    pub fn distance_to(&self, other: &StrokePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Which ink tool produced a stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeTool {
    Pen,
    Highlighter,
    Eraser,
}

/// One continuous ink gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<StrokePoint>,
    pub color: Color,
    pub size: f32,
    pub opacity: f32,
    pub tool: StrokeTool,
}

impl Stroke {
    /// Create a stroke, normalizing the parameters the tool fixes
    ///
    /// Highlighters always carry [`HIGHLIGHTER_OPACITY`]; size is clamped to
    /// [`MIN_STROKE_SIZE`].
    pub fn new(
        points: Vec<StrokePoint>,
        tool: StrokeTool,
        color: Color,
        size: f32,
        opacity: f32,
    ) -> Self {
        let size = if size.is_finite() { size.max(MIN_STROKE_SIZE) } else { MIN_STROKE_SIZE };
        let opacity = match tool {
            StrokeTool::Highlighter => HIGHLIGHTER_OPACITY,
            StrokeTool::Pen | StrokeTool::Eraser => {
                if opacity.is_finite() {
                    opacity.clamp(0.0, 1.0)
                } else {
                    1.0
                }
            }
        };

        Self { points, color, size, opacity, tool }
    }

    /// Bounding box as (min_x, min_y, max_x, max_y), `None` for an empty stroke
    pub fn bounding_box(&self) -> Option<(f32, f32, f32, f32)> {
        let first = self.points.first()?;
        let mut bounds = (first.x, first.y, first.x, first.y);
        for point in self.points.iter().skip(1) {
            bounds.0 = bounds.0.min(point.x);
            bounds.1 = bounds.1.min(point.y);
            bounds.2 = bounds.2.max(point.x);
            bounds.3 = bounds.3.max(point.y);
        }
        Some(bounds)
    }

    /// Copy of this stroke moved by (dx, dy)
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        let mut moved = self.clone();
        for point in &mut moved.points {
            point.x += dx;
            point.y += dy;
        }
        moved
    }
}

/// Typed text placed on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    /// Left edge
    pub x: f32,
    /// Top edge; the baseline sits `font_size` below it
    pub y: f32,
    pub text: String,
    pub font_size: f32,
    pub color: Color,
}

impl TextElement {
    pub fn new(x: f32, y: f32, text: impl Into<String>, font_size: f32, color: Color) -> Self {
        Self { x, y, text: text.into(), font_size, color }
    }

    /// Y coordinate of the text baseline
    pub fn baseline_y(&self) -> f32 {
        self.y + self.font_size
    }
}

/// Ink and text belonging to one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnnotation {
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub text_elements: Vec<TextElement>,
}

impl PageAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.text_elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_round_trip() {
        let color = Color::new(18, 52, 86, 255);
        assert_eq!(color.to_hex(), "#123456");
        assert_eq!(Color::from_hex("#123456"), Some(color));

        let translucent = Color::new(255, 0, 0, 128);
        assert_eq!(translucent.to_hex(), "#ff000080");
        assert_eq!(Color::from_hex("#ff000080"), Some(translucent));
    }

    #[test]
    fn test_color_short_hex() {
        assert_eq!(Color::from_hex("#f00"), Some(Color::RED));
        assert_eq!(Color::from_hex("f00"), None);
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#gg0000"), None);
    }

    #[test]
    fn test_color_normalization() {
        let (r, g, b, a) = Color::rgb(255, 128, 0).to_normalized();
        assert!((r - 1.0).abs() < 0.001);
        assert!((g - 0.502).abs() < 0.01);
        assert!(b.abs() < 0.001);
        assert!((a - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_highlighter_opacity_is_fixed() {
        let stroke = Stroke::new(vec![], StrokeTool::Highlighter, Color::YELLOW, 4.0, 1.0);
        assert_eq!(stroke.opacity, HIGHLIGHTER_OPACITY);

        let pen = Stroke::new(vec![], StrokeTool::Pen, Color::BLACK, 4.0, 0.8);
        assert_eq!(pen.opacity, 0.8);
    }

    #[test]
    fn test_stroke_size_is_positive() {
        let stroke = Stroke::new(vec![], StrokeTool::Pen, Color::BLACK, 0.0, 1.0);
        assert!(stroke.size > 0.0);

        let stroke = Stroke::new(vec![], StrokeTool::Pen, Color::BLACK, f32::NAN, 1.0);
        assert!(stroke.size > 0.0);
    }

    #[test]
    fn test_stroke_bounding_box() {
        let stroke = Stroke::new(
            vec![StrokePoint::new(10.0, 40.0), StrokePoint::new(30.0, 20.0)],
            StrokeTool::Pen,
            Color::BLACK,
            2.0,
            1.0,
        );
        assert_eq!(stroke.bounding_box(), Some((10.0, 20.0, 30.0, 40.0)));

        let empty = Stroke::new(vec![], StrokeTool::Pen, Color::BLACK, 2.0, 1.0);
        assert_eq!(empty.bounding_box(), None);
    }

    #[test]
    fn test_payload_uses_camel_case() {
        let page = PageAnnotation {
            strokes: vec![Stroke::new(
                vec![StrokePoint::with_pressure(1.0, 2.0, 0.5), StrokePoint::new(3.0, 4.0)],
                StrokeTool::Highlighter,
                Color::YELLOW,
                3.0,
                1.0,
            )],
            text_elements: vec![TextElement::new(5.0, 6.0, "rit.", 18.0, Color::RED)],
        };

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["textElements"][0]["fontSize"], 18.0);
        assert_eq!(json["strokes"][0]["tool"], "highlighter");
        assert_eq!(json["strokes"][0]["color"], "#ffeb3b");
        assert!(json["strokes"][0]["points"][1].get("pressure").is_none());

        let back: PageAnnotation = serde_json::from_value(json).unwrap();
        assert_eq!(back, page);
    }

    #[test]
    fn test_page_annotation_defaults_missing_lists() {
        let page: PageAnnotation = serde_json::from_str("{}").unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn test_text_baseline() {
        let text = TextElement::new(0.0, 100.0, "f", 24.0, Color::BLACK);
        assert_eq!(text.baseline_y(), 124.0);
    }
}
