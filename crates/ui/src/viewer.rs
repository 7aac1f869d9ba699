//! Read-only compositor
//!
//! Shows a page's base raster with its saved ink on top. The canvas geometry comes
//! from the document session at render time, exactly as in the editor, never from
//! the annotation payload. Zoom is display-only and lives in the [`DisplayTransform`].

use std::time::Instant;

use scoremark_core::{
    fit_scale, CanvasSize, DisplayTransform, EngineConfig, PageAnnotation, RenderContext,
};
use scoremark_render::{
    Font, LayeredCanvas, PageRenderer, RasterError, RenderEvent, RenderRequest, SourceKind,
    SourceRef, SurfaceId,
};
use scoremark_scheduler::{OneShot, RetryPolicy};

use crate::gesture::{Gesture, GestureConfig, GestureRecognizer, SwipeDirection};
use crate::SharedSession;

pub const MAX_ZOOM: f32 = 4.0;

/// Zoom a double tap switches to from fit
pub const DOUBLE_TAP_ZOOM: f32 = 2.0;

/// Left and right screen fraction where a tap turns the page
pub const TAP_BAND: f32 = 0.25;

/// Zoom change per modified wheel step
const WHEEL_ZOOM_STEP: f32 = 1.1;

const FIT_EPSILON: f32 = 1e-3;

pub struct Viewer {
    session: SharedSession,
    renderer: PageRenderer,
    source: SourceRef,
    kind: Option<SourceKind>,
    annotations: Vec<PageAnnotation>,
    context: RenderContext,
    canvas: LayeredCanvas,
    transform: DisplayTransform,
    viewport: (f32, f32),
    fit_pending: OneShot,
    gestures: GestureRecognizer,
    font: Option<Font>,
}

impl Viewer {
    pub fn open(
        session: SharedSession,
        source: SourceRef,
        kind: Option<SourceKind>,
        annotations: Vec<PageAnnotation>,
        viewport: (f32, f32),
        config: &EngineConfig,
    ) -> Result<Self, RasterError> {
        let (geometry, page_count) = {
            let mut session = session.borrow_mut();
            session.open(&source, kind)?;
            (session.geometry(0)?, session.page_count()?)
        };

        let mut viewer = Self {
            session,
            renderer: PageRenderer::new(RetryPolicy::once_after(config.engine_retry_delay)),
            source,
            kind,
            annotations,
            context: RenderContext::new(&geometry, page_count),
            canvas: LayeredCanvas::new(geometry.canvas),
            transform: DisplayTransform::identity(),
            viewport,
            fit_pending: OneShot::new(),
            gestures: GestureRecognizer::new(GestureConfig::default()),
            font: None,
        };
        viewer.request_current_page();
        Ok(viewer)
    }

    pub fn with_font(mut self, font: Option<Font>) -> Self {
        self.font = font;
        self
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn canvas(&self) -> &LayeredCanvas {
        &self.canvas
    }

    pub fn canvas_size(&self) -> CanvasSize {
        self.canvas.size()
    }

    pub fn transform(&self) -> DisplayTransform {
        self.transform
    }

    pub fn zoom(&self) -> f32 {
        self.transform.zoom
    }

    pub fn current_page(&self) -> usize {
        self.context.page_index()
    }

    pub fn is_rendering(&self) -> bool {
        !self.renderer.is_idle()
    }

    /// Zoom at which the whole page is visible
    pub fn fit_zoom(&self) -> f32 {
        fit_scale(self.viewport.0, self.viewport.1, self.canvas.size())
    }

    pub fn is_at_fit(&self) -> bool {
        (self.transform.zoom - self.fit_zoom()).abs() <= FIT_EPSILON
    }

    fn request_current_page(&mut self) {
        let mut request = RenderRequest::new(self.source.clone(), self.context.page_index() as u32);
        request.kind = self.kind;
        self.renderer.request(SurfaceId::VIEWER, request);
    }

    /// Advance rendering and release held taps
    ///
    /// Returns `true` when a new base page was committed.
    pub fn poll(&mut self, now: Instant) -> Result<bool, RasterError> {
        if let Some(tap) = self.gestures.tick(now) {
            self.apply(tap);
        }

        let events = {
            let mut session = self.session.borrow_mut();
            self.renderer.poll(&mut session, now)
        };

        let mut committed = false;
        for event in events {
            match event {
                RenderEvent::Committed { page, .. } => {
                    if page.page_index as usize != self.current_page() {
                        continue;
                    }
                    self.context.apply_geometry(&page.geometry);
                    self.canvas.commit_base(&page);
                    let blank = PageAnnotation::new();
                    let annotations = self.annotations.get(self.current_page()).unwrap_or(&blank);
                    self.canvas.repaint_overlay(annotations, self.font.as_ref());
                    if self.fit_pending.take() {
                        self.fit_to_screen();
                    }
                    committed = true;
                }
                RenderEvent::Failed { error, .. } => return Err(error),
            }
        }
        Ok(committed)
    }

    /// Poll until the pending render finishes
    pub fn settle(&mut self) -> Result<(), RasterError> {
        while self.is_rendering() {
            if let Some(deadline) = self.renderer.next_deadline() {
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
            }
            self.poll(Instant::now())?;
        }
        Ok(())
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        let was_fit = self.is_at_fit();
        self.viewport = (width, height);
        if was_fit {
            self.fit_to_screen();
        }
    }

    pub fn fit_to_screen(&mut self) {
        let (width, height) = self.viewport;
        self.transform = DisplayTransform::fit(width, height, self.canvas.size());
    }

    /// Set zoom around a screen point, clamped to `[fit, MAX_ZOOM]`
    pub fn zoom_to(&mut self, zoom: f32, anchor_x: f32, anchor_y: f32) {
        let fit = self.fit_zoom();
        let zoom = zoom.clamp(fit.min(MAX_ZOOM), MAX_ZOOM);
        if (zoom - fit).abs() <= FIT_EPSILON {
            self.fit_to_screen();
        } else {
            self.transform.zoom_around(anchor_x, anchor_y, zoom);
        }
    }

    pub fn go_to_page(&mut self, page_index: u32) -> bool {
        if page_index >= self.context.total_pages || page_index as usize == self.current_page() {
            return false;
        }
        self.context.current_page = page_index + 1;
        self.fit_pending.arm();
        self.gestures.reset();
        self.request_current_page();
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.context.current_page)
    }

    pub fn previous_page(&mut self) -> bool {
        match self.context.page_index() {
            0 => false,
            index => self.go_to_page(index as u32 - 1),
        }
    }

    // --- input ---

    pub fn touch_start(&mut self, id: u64, x: f32, y: f32, now: Instant) {
        self.gestures.on_touch_start(id, x, y, now);
    }

    pub fn touch_move(&mut self, id: u64, x: f32, y: f32) {
        if let Some(gesture) = self.gestures.on_touch_move(id, x, y) {
            self.apply(gesture);
        }
    }

    pub fn touch_end(&mut self, id: u64, x: f32, y: f32, now: Instant) {
        if let Some(gesture) = self.gestures.on_touch_end(id, x, y, now) {
            self.apply(gesture);
        }
    }

    pub fn click(&mut self, x: f32, y: f32, now: Instant) {
        if let Some(gesture) = self.gestures.on_click(x, y, now) {
            self.apply(gesture);
        }
    }

    pub fn wheel(&mut self, delta_x: f32, delta_y: f32, x: f32, y: f32, zoom_modifier: bool) {
        let gesture = self.gestures.on_wheel(delta_x, delta_y, x, y, zoom_modifier);
        self.apply(gesture);
    }

    fn apply(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::Pan { dx, dy } => {
                // panning only means something once zoomed in
                if !self.is_at_fit() {
                    self.transform.pan(dx, dy);
                }
            }
            Gesture::Pinch { ratio, center_x, center_y } => {
                self.zoom_to(self.transform.zoom * ratio, center_x, center_y);
            }
            Gesture::Swipe(direction) => {
                if self.is_at_fit() {
                    match direction {
                        SwipeDirection::Left => self.next_page(),
                        SwipeDirection::Right => self.previous_page(),
                    };
                }
            }
            Gesture::Tap { x, .. } => {
                let width = self.viewport.0;
                if x < width * TAP_BAND {
                    self.previous_page();
                } else if x > width * (1.0 - TAP_BAND) {
                    self.next_page();
                }
            }
            Gesture::DoubleTap { x, y } => {
                if self.is_at_fit() {
                    self.zoom_to(DOUBLE_TAP_ZOOM, x, y);
                } else {
                    self.fit_to_screen();
                }
            }
            Gesture::WheelZoom { steps, x, y } => {
                self.zoom_to(self.transform.zoom * WHEEL_ZOOM_STEP.powf(steps), x, y);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;
    use crate::test_support::{shared_session, PDF_REF, PNG_REF};
    use std::time::Duration;

    fn viewer(viewport: (f32, f32)) -> Viewer {
        let config = EngineConfig::default();
        let session = shared_session();
        let mut viewer =
            Viewer::open(session, PDF_REF.into(), None, vec![], viewport, &config).unwrap();
        viewer.settle().unwrap();
        viewer
    }

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_editor_and_viewer_agree_on_canvas() {
        for source in [PDF_REF, PNG_REF] {
            let session = shared_session();
            let config = EngineConfig::default();
            let mut editor =
                Editor::open(session.clone(), source.into(), None, vec![], &config).unwrap();
            let mut viewer =
                Viewer::open(session.clone(), source.into(), None, vec![], (800.0, 600.0), &config)
                    .unwrap();
            editor.settle().unwrap();
            viewer.settle().unwrap();

            assert_eq!(editor.canvas_size(), viewer.canvas_size());
            assert_eq!(editor.context().scale_factor, viewer.context().scale_factor);
            assert_eq!(session.borrow().open_count(), 1);
        }
    }

    #[test]
    fn test_editor_and_viewer_on_different_sources() {
        let session = shared_session();
        let config = EngineConfig::default();
        let mut editor =
            Editor::open(session.clone(), PDF_REF.into(), None, vec![], &config).unwrap();
        let mut viewer =
            Viewer::open(session.clone(), PNG_REF.into(), None, vec![], (800.0, 600.0), &config)
                .unwrap();

        // interleave both surfaces over the shared session
        while editor.is_rendering() || viewer.is_rendering() {
            let now = Instant::now();
            editor.poll(now).unwrap();
            viewer.poll(now).unwrap();
        }

        assert_eq!(editor.canvas().base().dimensions(), (1224, 1584));
        assert_eq!(editor.context().canvas_size, CanvasSize::new(1224, 1584));
        assert_eq!(editor.context().total_pages, 3);

        assert_eq!(viewer.canvas().base().dimensions(), (600, 800));
        assert_eq!(viewer.context().canvas_size, CanvasSize::new(600, 800));
        assert_eq!(viewer.context().total_pages, 1);
    }

    #[test]
    fn test_fits_once_per_page() {
        let mut viewer = viewer((612.0, 792.0));
        assert!(viewer.is_at_fit());
        assert_eq!(viewer.zoom(), 0.5);

        viewer.zoom_to(1.5, 0.0, 0.0);
        viewer.settle().unwrap();
        assert_eq!(viewer.zoom(), 1.5);

        assert!(viewer.go_to_page(1));
        viewer.settle().unwrap();
        assert!(viewer.is_at_fit());
    }

    #[test]
    fn test_pinch_is_clamped() {
        let mut viewer = viewer((612.0, 792.0));
        let t0 = Instant::now();
        viewer.touch_start(1, 100.0, 100.0, t0);
        viewer.touch_start(2, 110.0, 100.0, t0);
        viewer.touch_move(2, 1000.0, 100.0);
        assert_eq!(viewer.zoom(), MAX_ZOOM);

        viewer.touch_move(2, 100.5, 100.0);
        assert!(viewer.is_at_fit());
    }

    #[test]
    fn test_swipe_turns_page_only_at_fit() {
        let mut viewer = viewer((612.0, 792.0));
        let t0 = Instant::now();
        viewer.touch_start(1, 400.0, 300.0, t0);
        viewer.touch_end(1, 250.0, 310.0, ms(t0, 100));
        assert_eq!(viewer.current_page(), 1);

        viewer.settle().unwrap();
        viewer.zoom_to(2.0, 300.0, 300.0);
        viewer.touch_start(1, 400.0, 300.0, ms(t0, 500));
        viewer.touch_end(1, 250.0, 310.0, ms(t0, 600));
        assert_eq!(viewer.current_page(), 1);
    }

    #[test]
    fn test_tap_bands_wait_for_double_tap_window() {
        let mut viewer = viewer((600.0, 800.0));
        let t0 = Instant::now();
        viewer.click(580.0, 400.0, t0);
        assert_eq!(viewer.current_page(), 0);

        viewer.poll(ms(t0, 350)).unwrap();
        assert_eq!(viewer.current_page(), 1);

        viewer.settle().unwrap();
        viewer.click(10.0, 400.0, ms(t0, 1000));
        viewer.poll(ms(t0, 1400)).unwrap();
        assert_eq!(viewer.current_page(), 0);

        // middle band does nothing
        viewer.settle().unwrap();
        viewer.click(300.0, 400.0, ms(t0, 2000));
        viewer.poll(ms(t0, 2400)).unwrap();
        assert_eq!(viewer.current_page(), 0);
    }

    #[test]
    fn test_double_tap_toggles_zoom() {
        let mut viewer = viewer((612.0, 792.0));
        let t0 = Instant::now();
        viewer.click(300.0, 400.0, t0);
        viewer.click(300.0, 400.0, ms(t0, 200));
        assert_eq!(viewer.zoom(), DOUBLE_TAP_ZOOM);
        assert_eq!(viewer.current_page(), 0);

        viewer.click(300.0, 400.0, ms(t0, 1000));
        viewer.click(300.0, 400.0, ms(t0, 1200));
        assert!(viewer.is_at_fit());
    }

    #[test]
    fn test_modified_wheel_zooms() {
        let mut viewer = viewer((612.0, 792.0));
        viewer.wheel(0.0, 120.0, 100.0, 100.0, false);
        assert!(viewer.is_at_fit());

        viewer.wheel(0.0, -3.0, 100.0, 100.0, true);
        assert!(viewer.zoom() > 0.5);
    }

    #[test]
    fn test_saved_ink_on_overlay() {
        use scoremark_core::{Color, Stroke, StrokePoint, StrokeTool};

        let page = PageAnnotation {
            strokes: vec![Stroke::new(
                (0..20).map(|i| StrokePoint::new(100.0 + i as f32 * 10.0, 200.0)).collect(),
                StrokeTool::Pen,
                Color::BLACK,
                6.0,
                1.0,
            )],
            text_elements: vec![],
        };
        let config = EngineConfig::default();
        let session = shared_session();
        let mut viewer =
            Viewer::open(session, PDF_REF.into(), None, vec![page], (612.0, 792.0), &config)
                .unwrap();
        viewer.settle().unwrap();

        assert!(viewer.canvas().overlay().get_pixel(200, 200)[3] > 200);
    }
}
