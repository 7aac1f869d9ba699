//! Interactive editor surface
//!
//! Pointer input arrives in screen coordinates and is mapped into the page's canonical
//! pixel space through the display transform before anything is stored. The editor is
//! a small state machine:
//!
//! ```text
//! Idle -> Drawing         (down with pen / highlighter / eraser)
//! Drawing -> Idle         (up commits the stroke to the current page)
//! Idle -> Lassoing        (down with lasso)
//! Lassoing -> Selection   (up computes the selected strokes)
//! Selection -> Idle       (deselect, tool change, page change)
//! Idle -> TextPlacing     (tap with the text tool)
//! TextPlacing -> Idle     (commit or cancel)
//! ```
//!
//! Base page rasters come from the shared document session through a render slot;
//! annotation commits repaint only the overlay.

use std::time::Instant;

use scoremark_core::lasso::stroke_at;
use scoremark_core::{
    AnnotationStore, CanvasSize, Color, DisplayTransform, EngineConfig, PageAnnotation,
    RenderContext, Selection, StoreError, Stroke, StrokePoint, StrokeTool, TextElement,
};
use scoremark_render::{
    Font, LayeredCanvas, PageRenderer, RasterError, RenderEvent, RenderRequest, SourceKind,
    SourceRef, SurfaceId,
};
use scoremark_scheduler::RetryPolicy;

use crate::SharedSession;

/// Screen-space distance under which a lasso release counts as a tap
const LASSO_TAP_SLOP: f32 = 4.0;

/// Hit tolerance in canvas pixels for tap selection
const HIT_TOLERANCE: f32 = 6.0;

/// Active tool with its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tool {
    Pen { color: Color, size: f32 },
    Highlighter { color: Color, size: f32 },
    Eraser { size: f32 },
    Lasso,
    Text { color: Color, font_size: f32 },
}

impl Default for Tool {
    fn default() -> Self {
        Tool::Pen { color: Color::BLACK, size: 3.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorState {
    Idle,
    Drawing { points: Vec<StrokePoint> },
    Lassoing { path: Vec<StrokePoint>, start: (f32, f32) },
    SelectionActive { selection: Selection },
    TextPlacing { x: f32, y: f32, draft: String },
}

impl EditorState {
    /// Whether a pointer gesture is still open
    pub fn is_gesture(&self) -> bool {
        matches!(self, Self::Drawing { .. } | Self::Lassoing { .. } | Self::TextPlacing { .. })
    }
}

/// What to do with an open gesture before leaving the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingGesture {
    Commit,
    Discard,
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("a gesture is in progress; commit or discard it first")]
    GestureInProgress,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("no strokes selected")]
    NothingSelected,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Raster(#[from] RasterError),
}

pub struct Editor {
    session: SharedSession,
    renderer: PageRenderer,
    source: SourceRef,
    kind: Option<SourceKind>,
    store: AnnotationStore,
    saved_revision: u64,
    tool: Tool,
    state: EditorState,
    context: RenderContext,
    canvas: LayeredCanvas,
    transform: DisplayTransform,
    viewport: (f32, f32),
    font: Option<Font>,
}

impl Editor {
    /// Open `source` on the shared session and start rendering its first page
    pub fn open(
        session: SharedSession,
        source: SourceRef,
        kind: Option<SourceKind>,
        annotations: Vec<PageAnnotation>,
        config: &EngineConfig,
    ) -> Result<Self, EditorError> {
        let (geometry, page_count) = {
            let mut session = session.borrow_mut();
            session.open(&source, kind)?;
            (session.geometry(0)?, session.page_count()?)
        };

        let store = AnnotationStore::from_payload(annotations, page_count as usize);
        let mut editor = Self {
            session,
            renderer: PageRenderer::new(RetryPolicy::once_after(config.engine_retry_delay)),
            source,
            kind,
            saved_revision: store.revision(),
            store,
            tool: Tool::default(),
            state: EditorState::Idle,
            context: RenderContext::new(&geometry, page_count),
            canvas: LayeredCanvas::new(geometry.canvas),
            transform: DisplayTransform::identity(),
            viewport: (geometry.canvas.width as f32, geometry.canvas.height as f32),
            font: None,
        };
        editor.request_current_page();
        Ok(editor)
    }

    pub fn with_font(mut self, font: Option<Font>) -> Self {
        self.font = font;
        self
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
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

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Zero-based index of the page being edited
    pub fn current_page(&self) -> usize {
        self.context.page_index()
    }

    /// Unsaved changes exist
    pub fn is_dirty(&self) -> bool {
        self.store.revision() != self.saved_revision
    }

    /// Record that the store's current revision has been persisted
    pub fn mark_saved(&mut self, revision: u64) {
        self.saved_revision = revision;
    }

    pub fn is_rendering(&self) -> bool {
        !self.renderer.is_idle()
    }

    // --- rendering ---

    fn request_current_page(&mut self) {
        let mut request = RenderRequest::new(self.source.clone(), self.context.page_index() as u32);
        request.kind = self.kind;
        self.renderer.request(SurfaceId::EDITOR, request);
    }

    /// Advance the page render; returns `true` when a new base page was committed
    pub fn poll(&mut self, now: Instant) -> Result<bool, RasterError> {
        let events = {
            let mut session = self.session.borrow_mut();
            self.renderer.poll(&mut session, now)
        };

        let mut committed = false;
        for event in events {
            match event {
                RenderEvent::Committed { page, .. } => {
                    if page.page_index as usize != self.current_page() {
                        tracing::debug!(
                            page = page.page_index,
                            "ignoring render for a page no longer current"
                        );
                        continue;
                    }
                    self.context.apply_geometry(&page.geometry);
                    self.canvas.commit_base(&page);
                    self.fit_to_viewport();
                    self.repaint_overlay();
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

    /// Repaint ink for the current page; waits for that page's base raster
    fn repaint_overlay(&mut self) {
        let page = self.current_page();
        if self.canvas.base_page() != Some(page as u32) {
            return;
        }
        if let Some(annotations) = self.store.page(page) {
            self.canvas.repaint_overlay(annotations, self.font.as_ref());
        }
    }

    // --- viewport ---

    /// Size of the on-screen area; the page is fitted into it
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = (width, height);
        self.fit_to_viewport();
    }

    fn fit_to_viewport(&mut self) {
        self.transform =
            DisplayTransform::fit(self.viewport.0, self.viewport.1, self.canvas.size());
    }

    fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        self.transform.screen_to_canvas(x, y)
    }

    // --- navigation ---

    /// Move to another page; fails while a gesture is open
    pub fn go_to_page(&mut self, page_index: u32) -> Result<(), EditorError> {
        if self.state.is_gesture() {
            return Err(EditorError::GestureInProgress);
        }
        if page_index >= self.context.total_pages {
            return Err(EditorError::PageOutOfRange {
                page: page_index,
                page_count: self.context.total_pages,
            });
        }

        self.state = EditorState::Idle;
        self.context.current_page = page_index + 1;
        self.request_current_page();
        Ok(())
    }

    pub fn next_page(&mut self) -> Result<(), EditorError> {
        self.go_to_page(self.context.current_page)
    }

    pub fn previous_page(&mut self) -> Result<(), EditorError> {
        let current = self.context.page_index() as u32;
        if current == 0 {
            return Err(EditorError::PageOutOfRange {
                page: 0,
                page_count: self.context.total_pages,
            });
        }
        self.go_to_page(current - 1)
    }

    /// Close an open gesture explicitly
    pub fn finish_gesture(&mut self, pending: PendingGesture) -> Result<(), EditorError> {
        match (pending, std::mem::replace(&mut self.state, EditorState::Idle)) {
            (PendingGesture::Commit, EditorState::Drawing { points }) => {
                self.commit_stroke(points)?
            }
            (PendingGesture::Commit, EditorState::Lassoing { path, .. }) => self.finish_lasso(path),
            (PendingGesture::Commit, EditorState::TextPlacing { x, y, draft }) => {
                self.commit_text_at(x, y, draft)?
            }
            (PendingGesture::Commit, other @ EditorState::SelectionActive { .. }) => {
                self.state = other
            }
            (PendingGesture::Discard, other) => {
                if other.is_gesture() {
                    tracing::debug!("discarding open gesture");
                } else {
                    self.state = other;
                }
            }
            (PendingGesture::Commit, EditorState::Idle) => {}
        }
        Ok(())
    }

    // --- tools ---

    /// Switch tools; clears an active selection and cancels text placement
    pub fn set_tool(&mut self, tool: Tool) -> Result<(), EditorError> {
        match self.state {
            EditorState::Drawing { .. } | EditorState::Lassoing { .. } => {
                return Err(EditorError::GestureInProgress)
            }
            EditorState::SelectionActive { .. } | EditorState::TextPlacing { .. } => {
                self.state = EditorState::Idle
            }
            EditorState::Idle => {}
        }
        self.tool = tool;
        Ok(())
    }

    pub fn pointer_down(&mut self, screen_x: f32, screen_y: f32, pressure: Option<f32>) {
        let (x, y) = self.to_canvas(screen_x, screen_y);
        let point = sample(x, y, pressure);

        let idle = matches!(self.state, EditorState::Idle);
        let selecting = matches!(self.state, EditorState::SelectionActive { .. });

        match self.tool {
            Tool::Lasso if idle || selecting => {
                self.state =
                    EditorState::Lassoing { path: vec![point], start: (screen_x, screen_y) };
            }
            Tool::Pen { .. } | Tool::Highlighter { .. } | Tool::Eraser { .. } if idle => {
                self.state = EditorState::Drawing { points: vec![point] };
            }
            _ => {}
        }
    }

    pub fn pointer_move(&mut self, screen_x: f32, screen_y: f32, pressure: Option<f32>) {
        let (x, y) = self.to_canvas(screen_x, screen_y);
        match &mut self.state {
            EditorState::Drawing { points } => points.push(sample(x, y, pressure)),
            EditorState::Lassoing { path, .. } => path.push(StrokePoint::new(x, y)),
            _ => {}
        }
    }

    pub fn pointer_up(
        &mut self,
        screen_x: f32,
        screen_y: f32,
        pressure: Option<f32>,
    ) -> Result<(), EditorError> {
        let (x, y) = self.to_canvas(screen_x, screen_y);

        match std::mem::replace(&mut self.state, EditorState::Idle) {
            EditorState::Drawing { mut points } => {
                if points.last().map_or(true, |last| (last.x, last.y) != (x, y)) {
                    points.push(sample(x, y, pressure));
                }
                self.commit_stroke(points)?;
            }
            EditorState::Lassoing { path, start } => {
                let travel = (screen_x - start.0).hypot(screen_y - start.1);
                if travel <= LASSO_TAP_SLOP && path.len() < 3 {
                    self.select_at(x, y);
                } else {
                    self.finish_lasso(path);
                }
            }
            EditorState::Idle => {
                if let Tool::Text { .. } = self.tool {
                    self.state = EditorState::TextPlacing { x, y, draft: String::new() };
                }
            }
            other => self.state = other,
        }
        Ok(())
    }

    fn commit_stroke(&mut self, points: Vec<StrokePoint>) -> Result<(), EditorError> {
        if points.len() < 2 {
            tracing::trace!("dropping single-sample stroke");
            return Ok(());
        }
        let stroke = match self.tool {
            Tool::Pen { color, size } => Stroke::new(points, StrokeTool::Pen, color, size, 1.0),
            Tool::Highlighter { color, size } => {
                Stroke::new(points, StrokeTool::Highlighter, color, size, 1.0)
            }
            Tool::Eraser { size } => {
                Stroke::new(points, StrokeTool::Eraser, Color::BLACK, size, 1.0)
            }
            Tool::Lasso | Tool::Text { .. } => return Ok(()),
        };
        self.store.add_stroke(self.current_page(), stroke)?;
        self.repaint_overlay();
        Ok(())
    }

    fn finish_lasso(&mut self, path: Vec<StrokePoint>) {
        let page = self.current_page();
        let strokes = self.store.page(page).map(|p| p.strokes.as_slice()).unwrap_or(&[]);
        let selection = Selection::from_lasso(page, strokes, &path);
        self.state = if selection.is_empty() {
            EditorState::Idle
        } else {
            EditorState::SelectionActive { selection }
        };
    }

    fn select_at(&mut self, x: f32, y: f32) {
        let page = self.current_page();
        let strokes = self.store.page(page).map(|p| p.strokes.as_slice()).unwrap_or(&[]);
        self.state = match stroke_at(strokes, x, y, HIT_TOLERANCE) {
            Some(index) => {
                EditorState::SelectionActive { selection: Selection::new(page, vec![index]) }
            }
            None => EditorState::Idle,
        };
    }

    // --- selection ---

    pub fn selection(&self) -> Option<&Selection> {
        match &self.state {
            EditorState::SelectionActive { selection } => Some(selection),
            _ => None,
        }
    }

    pub fn deselect(&mut self) {
        if let EditorState::SelectionActive { .. } = self.state {
            self.state = EditorState::Idle;
        }
    }

    fn selected_indices(&self) -> Result<Vec<usize>, EditorError> {
        self.selection().map(|s| s.indices.clone()).ok_or(EditorError::NothingSelected)
    }

    /// Delete the selected strokes and end the selection
    pub fn delete_selection(&mut self) -> Result<usize, EditorError> {
        let indices = self.selected_indices()?;
        let removed = self.store.delete_strokes(self.current_page(), &indices)?;
        self.state = EditorState::Idle;
        self.repaint_overlay();
        Ok(removed)
    }

    /// Move the selected strokes by a canvas-space offset
    pub fn translate_selection(&mut self, dx: f32, dy: f32) -> Result<(), EditorError> {
        let indices = self.selected_indices()?;
        self.store.translate_strokes(self.current_page(), &indices, dx, dy)?;
        self.repaint_overlay();
        Ok(())
    }

    pub fn recolor_selection(&mut self, color: Color) -> Result<(), EditorError> {
        let indices = self.selected_indices()?;
        self.store.recolor_strokes(self.current_page(), &indices, color)?;
        self.repaint_overlay();
        Ok(())
    }

    // --- text ---

    /// Append typed characters to the text being placed
    pub fn type_text(&mut self, text: &str) {
        if let EditorState::TextPlacing { draft, .. } = &mut self.state {
            draft.push_str(text);
        }
    }

    pub fn commit_text(&mut self) -> Result<(), EditorError> {
        let state = std::mem::replace(&mut self.state, EditorState::Idle);
        if let EditorState::TextPlacing { x, y, draft } = state {
            self.commit_text_at(x, y, draft)?;
        }
        Ok(())
    }

    pub fn cancel_text(&mut self) {
        if let EditorState::TextPlacing { .. } = self.state {
            self.state = EditorState::Idle;
        }
    }

    fn commit_text_at(&mut self, x: f32, y: f32, draft: String) -> Result<(), EditorError> {
        let text = draft.trim();
        if text.is_empty() {
            return Ok(());
        }
        let (color, font_size) = match self.tool {
            Tool::Text { color, font_size } => (color, font_size),
            _ => (Color::BLACK, 16.0),
        };
        self.store.add_text(self.current_page(), TextElement::new(x, y, text, font_size, color))?;
        self.repaint_overlay();
        Ok(())
    }

    // --- history ---

    pub fn undo(&mut self) -> bool {
        if self.state.is_gesture() {
            return false;
        }
        let changed = self.store.undo(self.current_page());
        if changed {
            self.deselect();
            self.repaint_overlay();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        if self.state.is_gesture() {
            return false;
        }
        let changed = self.store.redo(self.current_page());
        if changed {
            self.deselect();
            self.repaint_overlay();
        }
        changed
    }
}

fn sample(x: f32, y: f32, pressure: Option<f32>) -> StrokePoint {
    match pressure {
        Some(p) => StrokePoint::with_pressure(x, y, p),
        None => StrokePoint::new(x, y),
    }
}
