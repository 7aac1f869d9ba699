//! Per-surface page render slots
//!
//! Each surface (editor, viewer, export preview) owns one slot. A render is a small
//! step machine, `Fetch -> Rasterize -> commit`, advanced one step per [`PageRenderer::poll`].
//! Requesting a new page for a surface cancels the slot's previous token before the
//! new task is queued, and a cancelled task is dropped without an event.

use std::fmt;
use std::thread;
use std::time::Instant;

use scoremark_core::CanvasGeometry;
use scoremark_scheduler::{CancellationRegistry, CancellationToken, RetryPolicy, RetryState};

use crate::engine::RgbaImage;
use crate::error::RasterError;
use crate::session::DocumentSession;
use crate::source::{SourceKind, SourceRef};

/// Identifies the surface a render belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(&'static str);

impl SurfaceId {
    pub const EDITOR: SurfaceId = SurfaceId("editor");
    pub const VIEWER: SurfaceId = SurfaceId("viewer");
    pub const EXPORT: SurfaceId = SurfaceId("export");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub source: SourceRef,
    /// Sniffed from the fetched bytes when `None`
    pub kind: Option<SourceKind>,
    pub page_index: u32,
}

impl RenderRequest {
    pub fn new(source: impl Into<SourceRef>, page_index: u32) -> Self {
        Self { source: source.into(), kind: None, page_index }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// A base-layer raster ready to commit
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub source: SourceRef,
    pub page_index: u32,
    pub page_count: u32,
    pub geometry: CanvasGeometry,
    pub image: RgbaImage,
}

#[derive(Debug)]
pub enum RenderEvent {
    Committed { surface: SurfaceId, page: RenderedPage },
    Failed { surface: SurfaceId, request: RenderRequest, error: RasterError },
}

impl RenderEvent {
    pub fn surface(&self) -> SurfaceId {
        match self {
            Self::Committed { surface, .. } | Self::Failed { surface, .. } => *surface,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Fetch,
    Rasterize,
}

#[derive(Debug)]
struct RenderTask {
    surface: SurfaceId,
    request: RenderRequest,
    token: CancellationToken,
    step: Step,
    waiting_until: Option<Instant>,
    retry: RetryState,
}

enum Advance {
    Pending(RenderTask),
    Done(RenderEvent),
    Dropped,
}

pub struct PageRenderer {
    slots: CancellationRegistry<SurfaceId>,
    tasks: Vec<RenderTask>,
    retry: RetryPolicy,
}

impl PageRenderer {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { slots: CancellationRegistry::new(), tasks: Vec::new(), retry }
    }

    /// Queue a render for `surface`, superseding any render still in flight there
    pub fn request(&mut self, surface: SurfaceId, request: RenderRequest) -> CancellationToken {
        let token = self.slots.register(surface);
        tracing::trace!(
            %surface,
            source = %request.source,
            page = request.page_index,
            "render requested"
        );
        self.tasks.push(RenderTask {
            surface,
            request,
            token: token.clone(),
            step: Step::Fetch,
            waiting_until: None,
            retry: self.retry.start(),
        });
        token
    }

    /// Cancel the render in flight for `surface`, if any
    pub fn cancel(&mut self, surface: SurfaceId) -> bool {
        self.slots.cancel(&surface)
    }

    pub fn cancel_all(&mut self) -> usize {
        self.slots.cancel_all()
    }

    /// Advance every queued task by one step
    pub fn poll(&mut self, session: &mut DocumentSession, now: Instant) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        for task in std::mem::take(&mut self.tasks) {
            match self.advance(task, session, now) {
                Advance::Pending(task) => self.tasks.push(task),
                Advance::Done(event) => events.push(event),
                Advance::Dropped => {}
            }
        }
        events
    }

    /// Poll until no task is left, sleeping through retry delays
    pub fn run_until_idle(&mut self, session: &mut DocumentSession) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        while !self.is_idle() {
            let now = Instant::now();
            if let Some(deadline) = self.next_deadline().filter(|deadline| *deadline > now) {
                if self.tasks.iter().all(|task| task.waiting_until.is_some()) {
                    thread::sleep(deadline - now);
                }
            }
            events.extend(self.poll(session, Instant::now()));
        }
        events
    }

    /// Render one page to completion on `surface`
    ///
    /// Events for other surfaces that finish meanwhile are discarded.
    pub fn render_now(
        &mut self,
        session: &mut DocumentSession,
        surface: SurfaceId,
        request: RenderRequest,
    ) -> Result<RenderedPage, RasterError> {
        self.request(surface, request);
        let mut outcome = Err(RasterError::Cancelled);
        for event in self.run_until_idle(session) {
            match event {
                RenderEvent::Committed { surface: done, page } if done == surface => {
                    outcome = Ok(page)
                }
                RenderEvent::Failed { surface: done, error, .. } if done == surface => {
                    outcome = Err(error)
                }
                _ => {}
            }
        }
        outcome
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Earliest time a waiting task becomes ready again
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().filter_map(|task| task.waiting_until).min()
    }

    fn advance(
        &self,
        mut task: RenderTask,
        session: &mut DocumentSession,
        now: Instant,
    ) -> Advance {
        if task.token.is_cancelled() {
            log_dropped(&task);
            return Advance::Dropped;
        }
        if let Some(until) = task.waiting_until {
            if now < until {
                return Advance::Pending(task);
            }
            task.waiting_until = None;
        }

        let request = &task.request;
        let result = match task.step {
            Step::Fetch => session.open(&request.source, request.kind).map(|()| None),
            // another surface may have switched the shared session since the fetch
            Step::Rasterize => session
                .open(&request.source, request.kind)
                .and_then(|()| session.rasterize(&request.source, request.page_index))
                .map(Some),
        };

        match result {
            Ok(None) => {
                task.step = Step::Rasterize;
                Advance::Pending(task)
            }
            Ok(Some((geometry, image))) => {
                if task.token.is_cancelled() {
                    log_dropped(&task);
                    return Advance::Dropped;
                }
                let page_count = match session.page_count() {
                    Ok(count) => count,
                    Err(error) => return self.fail(task, error),
                };
                self.release(&task);
                let page = RenderedPage {
                    source: task.request.source,
                    page_index: task.request.page_index,
                    page_count,
                    geometry,
                    image,
                };
                Advance::Done(RenderEvent::Committed { surface: task.surface, page })
            }
            Err(error) if error.is_not_ready() => match task.retry.schedule(now) {
                Some(until) => {
                    tracing::debug!(
                        surface = %task.surface,
                        retry = task.retry.retries(),
                        "engine not ready, retrying"
                    );
                    task.waiting_until = Some(until);
                    Advance::Pending(task)
                }
                None => {
                    let reference = task.request.source.clone();
                    self.fail(task, RasterError::EngineUnavailable { reference })
                }
            },
            Err(error) => self.fail(task, error),
        }
    }

    fn fail(&self, task: RenderTask, error: RasterError) -> Advance {
        tracing::warn!(
            surface = %task.surface,
            source = %task.request.source,
            %error,
            "page render failed"
        );
        self.release(&task);
        Advance::Done(RenderEvent::Failed { surface: task.surface, request: task.request, error })
    }

    /// Free the slot unless a newer render already took it over
    fn release(&self, task: &RenderTask) {
        if self.slots.get(&task.surface).is_some_and(|current| current.same_as(&task.token)) {
            self.slots.unregister(&task.surface);
        }
    }
}

fn log_dropped(task: &RenderTask) {
    tracing::debug!(
        surface = %task.surface,
        page = task.request.page_index,
        "dropping superseded render"
    );
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
