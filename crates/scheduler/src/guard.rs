//! One-shot guard
//!
//! Lets an action (such as fitting a page to the screen) run once per arming. Re-arm
//! whenever the thing it applies to changes.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneShot {
    armed: bool,
}

impl OneShot {
    /// New guard, armed
    pub fn new() -> Self {
        Self { armed: true }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Returns `true` exactly once per arming
    pub fn take(&mut self) -> bool {
        std::mem::replace(&mut self.armed, false)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Default for OneShot {
    fn default() -> Self {
        Self::new()
    }
}
