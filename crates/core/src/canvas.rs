//! Coordinate and scale normalization
//!
//! Every page has one canonical pixel space: the native size of the source page
//! multiplied by a scale factor. Ink is stored in that space, so the editor, the
//! read-only viewer and export must all derive the scale through these functions.
//! Zoom and pan while viewing are a [`DisplayTransform`] on top and never leak into
//! stored coordinates.

/// Scale applied to sources that fit inside the canvas ceilings
pub const DEFAULT_SCALE: f64 = 2.0;

/// Scale factors never drop below this, even for oversized sources
pub const MIN_SCALE: f64 = 1.0;

/// Hardware ceilings for a single canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLimits {
    /// Largest width or height in pixels
    pub max_dimension: u32,
    /// Largest width × height in pixels
    pub max_area: u64,
}

impl Default for CanvasLimits {
    fn default() -> Self {
        Self { max_dimension: 16_384, max_area: 16_777_216 }
    }
}

impl CanvasLimits {
    pub fn new(max_dimension: u32, max_area: u64) -> Self {
        Self { max_dimension, max_area }
    }

    /// Whether a canvas of this size fits both ceilings
    pub fn allows(&self, size: CanvasSize) -> bool {
        size.width <= self.max_dimension
            && size.height <= self.max_dimension
            && size.area() <= self.max_area
    }
}

/// Scale factor for a raster image of the given native size
///
/// [`DEFAULT_SCALE`] unless the scaled canvas would exceed a ceiling, in which case the
/// largest scale that respects both ceilings, floored at [`MIN_SCALE`].
pub fn image_scale_factor(native_width: u32, native_height: u32, limits: &CanvasLimits) -> f64 {
    if native_width == 0 || native_height == 0 {
        return DEFAULT_SCALE;
    }

    let width = native_width as f64;
    let height = native_height as f64;
    let by_dimension = limits.max_dimension as f64 / width.max(height);
    let by_area = (limits.max_area as f64 / (width * height)).sqrt();

    DEFAULT_SCALE.min(by_dimension).min(by_area).max(MIN_SCALE)
}

/// Pixel size of a canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Native size of a source page together with its canonical canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasGeometry {
    /// Width in native units (image pixels or PDF points)
    pub native_width: f64,
    /// Height in native units (image pixels or PDF points)
    pub native_height: f64,
    pub scale: f64,
    pub canvas: CanvasSize,
}

impl CanvasGeometry {
    /// Geometry for a raster image source
    pub fn for_image(native_width: u32, native_height: u32, limits: &CanvasLimits) -> Self {
        let scale = image_scale_factor(native_width, native_height, limits);
        Self::scaled(native_width as f64, native_height as f64, scale)
    }

    /// Geometry for a paginated (PDF) page given in points
    pub fn for_page(width_pt: f64, height_pt: f64) -> Self {
        Self::scaled(width_pt, height_pt, DEFAULT_SCALE)
    }

    fn scaled(native_width: f64, native_height: f64, scale: f64) -> Self {
        let to_px = |v: f64| if v.is_finite() && v > 0.0 { (v * scale).floor() as u32 } else { 0 };
        Self {
            native_width,
            native_height,
            scale,
            canvas: CanvasSize::new(to_px(native_width), to_px(native_height)),
        }
    }

    /// Convert a canvas pixel coordinate back to native units
    pub fn canvas_to_native(&self, x: f32, y: f32) -> (f64, f64) {
        (x as f64 / self.scale, y as f64 / self.scale)
    }
}

/// Per-document render state, recomputed whenever a document is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    pub canvas_size: CanvasSize,
    pub scale_factor: f64,
    /// 1-based page number
    pub current_page: u32,
    pub total_pages: u32,
}

impl RenderContext {
    pub fn new(geometry: &CanvasGeometry, total_pages: u32) -> Self {
        Self {
            canvas_size: geometry.canvas,
            scale_factor: geometry.scale,
            current_page: 1,
            total_pages: total_pages.max(1),
        }
    }

    /// Zero-based index of the current page
    pub fn page_index(&self) -> usize {
        self.current_page.saturating_sub(1) as usize
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Replace the page geometry after navigating
    pub fn apply_geometry(&mut self, geometry: &CanvasGeometry) {
        self.canvas_size = geometry.canvas;
        self.scale_factor = geometry.scale;
    }
}

/// Zoom that fits a canvas inside a viewport
pub fn fit_scale(viewport_width: f32, viewport_height: f32, canvas: CanvasSize) -> f32 {
    if viewport_width <= 0.0 || viewport_height <= 0.0 || canvas.is_empty() {
        return 1.0;
    }

    let width = viewport_width / canvas.width as f32;
    let height = viewport_height / canvas.height as f32;
    width.min(height)
}

/// Screen ↔ canvas mapping used only for display
///
/// `screen = canvas * zoom + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub zoom: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl DisplayTransform {
    pub fn identity() -> Self {
        Self { zoom: 1.0, offset_x: 0.0, offset_y: 0.0 }
    }

    pub fn new(zoom: f32, offset_x: f32, offset_y: f32) -> Self {
        Self { zoom, offset_x, offset_y }
    }

    /// Fit the canvas inside the viewport and center it
    pub fn fit(viewport_width: f32, viewport_height: f32, canvas: CanvasSize) -> Self {
        let zoom = fit_scale(viewport_width, viewport_height, canvas);
        Self {
            zoom,
            offset_x: (viewport_width - canvas.width as f32 * zoom) / 2.0,
            offset_y: (viewport_height - canvas.height as f32 * zoom) / 2.0,
        }
    }

    pub fn screen_to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        ((x - self.offset_x) / zoom, (y - self.offset_y) / zoom)
    }

    pub fn canvas_to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.zoom + self.offset_x, y * self.zoom + self.offset_y)
    }

    /// Change zoom while keeping the canvas point under `anchor` fixed on screen
    pub fn zoom_around(&mut self, anchor_x: f32, anchor_y: f32, zoom: f32) {
        if !(zoom > 0.0) || !zoom.is_finite() {
            return;
        }
        let (cx, cy) = self.screen_to_canvas(anchor_x, anchor_y);
        self.zoom = zoom;
        self.offset_x = anchor_x - cx * zoom;
        self.offset_y = anchor_y - cy * zoom;
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }
}
