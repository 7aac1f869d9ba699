//! Touch and pointer gesture recognition for the read-only viewer
//!
//! Raw touches, wheel ticks and clicks are turned into intents: pan, pinch, swipe,
//! tap and double-tap. The recognizer knows nothing about zoom levels; the viewer
//! decides whether a pan at fit scale means anything or a swipe should turn the page.
//!
//! A single tap is held back until the double-tap window has passed, so a double tap
//! never turns the page first. Call [`GestureRecognizer::tick`] from the event loop to
//! release it.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Thresholds used to tell gestures apart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Horizontal travel, in screen pixels, that makes a swipe
    pub swipe_distance: f32,
    /// A swipe must be this many times wider than it is tall
    pub swipe_direction_ratio: f32,
    /// Movement below this stays a tap
    pub tap_slop: f32,
    /// Longest press that still counts as a tap
    pub tap_duration: Duration,
    /// Second tap must land within this window
    pub double_tap_window: Duration,
    /// ...and within this distance of the first
    pub double_tap_distance: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            swipe_distance: 80.0,
            swipe_direction_ratio: 1.5,
            tap_slop: 10.0,
            tap_duration: Duration::from_millis(300),
            double_tap_window: Duration::from_millis(300),
            double_tap_distance: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// Finger moved left: go forward
    Left,
    /// Finger moved right: go back
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Pan { dx: f32, dy: f32 },
    /// Distance ratio since the previous pinch event, around a screen point
    Pinch { ratio: f32, center_x: f32, center_y: f32 },
    Swipe(SwipeDirection),
    Tap { x: f32, y: f32 },
    DoubleTap { x: f32, y: f32 },
    /// Wheel with the zoom modifier held; positive zooms in
    WheelZoom { steps: f32, x: f32, y: f32 },
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    start: (f32, f32),
    current: (f32, f32),
    started_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct PendingTap {
    x: f32,
    y: f32,
    at: Instant,
}

#[derive(Debug, Default)]
pub struct GestureRecognizer {
    config: GestureConfig,
    touches: BTreeMap<u64, Touch>,
    /// Last finger distance while two fingers are down
    pinch_distance: Option<f32>,
    /// Set once a touch sequence has pinched; no tap or swipe until all fingers lift
    pinched: bool,
    pending_tap: Option<PendingTap>,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn on_touch_start(&mut self, id: u64, x: f32, y: f32, now: Instant) {
        self.touches.insert(id, Touch { start: (x, y), current: (x, y), started_at: now });
        if self.touches.len() == 2 {
            self.pinched = true;
            self.pinch_distance = self.finger_distance();
        }
    }

    pub fn on_touch_move(&mut self, id: u64, x: f32, y: f32) -> Option<Gesture> {
        let touch = self.touches.get_mut(&id)?;
        let (last_x, last_y) = touch.current;
        touch.current = (x, y);

        match self.touches.len() {
            1 => Some(Gesture::Pan { dx: x - last_x, dy: y - last_y }),
            2 => {
                let distance = self.finger_distance()?;
                let previous = self.pinch_distance.replace(distance)?;
                if previous <= f32::EPSILON {
                    return None;
                }
                let (center_x, center_y) = self.finger_center()?;
                Some(Gesture::Pinch { ratio: distance / previous, center_x, center_y })
            }
            _ => None,
        }
    }

    pub fn on_touch_end(&mut self, id: u64, x: f32, y: f32, now: Instant) -> Option<Gesture> {
        let mut touch = self.touches.remove(&id)?;
        touch.current = (x, y);

        if !self.touches.is_empty() {
            self.pinch_distance = None;
            return None;
        }
        if std::mem::take(&mut self.pinched) {
            self.pinch_distance = None;
            return None;
        }

        let dx = x - touch.start.0;
        let dy = y - touch.start.1;

        let far = dx.abs() >= self.config.swipe_distance;
        let horizontal = dx.abs() >= dy.abs() * self.config.swipe_direction_ratio;
        if far && horizontal {
            self.pending_tap = None;
            let direction = if dx < 0.0 { SwipeDirection::Left } else { SwipeDirection::Right };
            return Some(Gesture::Swipe(direction));
        }

        let still = dx.hypot(dy) <= self.config.tap_slop;
        let quick = now.saturating_duration_since(touch.started_at) <= self.config.tap_duration;
        if still && quick {
            return self.on_tap(x, y, now);
        }
        None
    }

    /// Mouse click; a second click inside the window becomes a double tap
    pub fn on_click(&mut self, x: f32, y: f32, now: Instant) -> Option<Gesture> {
        self.on_tap(x, y, now)
    }

    fn on_tap(&mut self, x: f32, y: f32, now: Instant) -> Option<Gesture> {
        if let Some(pending) = self.pending_tap.take() {
            let in_window =
                now.saturating_duration_since(pending.at) <= self.config.double_tap_window;
            let near = (x - pending.x).hypot(y - pending.y) <= self.config.double_tap_distance;
            if in_window && near {
                return Some(Gesture::DoubleTap { x: pending.x, y: pending.y });
            }
            // the earlier tap was never paired; it still counts
            self.pending_tap = Some(PendingTap { x, y, at: now });
            return Some(Gesture::Tap { x: pending.x, y: pending.y });
        }
        self.pending_tap = Some(PendingTap { x, y, at: now });
        None
    }

    /// Release a held single tap once the double-tap window has passed
    pub fn tick(&mut self, now: Instant) -> Option<Gesture> {
        let pending = self.pending_tap?;
        if now.saturating_duration_since(pending.at) < self.config.double_tap_window {
            return None;
        }
        self.pending_tap = None;
        Some(Gesture::Tap { x: pending.x, y: pending.y })
    }

    /// When the held tap (if any) becomes due
    pub fn tap_deadline(&self) -> Option<Instant> {
        self.pending_tap.map(|tap| tap.at + self.config.double_tap_window)
    }

    /// Scroll wheel; only zooms while the modifier (ctrl / cmd) is held
    pub fn on_wheel(
        &mut self,
        delta_x: f32,
        delta_y: f32,
        x: f32,
        y: f32,
        zoom_modifier: bool,
    ) -> Gesture {
        if zoom_modifier {
            Gesture::WheelZoom { steps: -delta_y, x, y }
        } else {
            Gesture::Pan { dx: -delta_x, dy: -delta_y }
        }
    }

    /// Forget touches and held taps (document or page change)
    pub fn reset(&mut self) {
        self.touches.clear();
        self.pinch_distance = None;
        self.pinched = false;
        self.pending_tap = None;
    }

    fn finger_distance(&self) -> Option<f32> {
        let mut fingers = self.touches.values();
        let a = fingers.next()?.current;
        let b = fingers.next()?.current;
        Some((a.0 - b.0).hypot(a.1 - b.1))
    }

    fn finger_center(&self) -> Option<(f32, f32)> {
        let mut fingers = self.touches.values();
        let a = fingers.next()?.current;
        let b = fingers.next()?.current;
        Some(((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0))
    }
}
