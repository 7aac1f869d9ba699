//! Scoremark UI surfaces
//!
//! The interactive editor, the read-only viewer with its gesture recognizer, and the
//! note save flow. Both surfaces share one document session and draw through the
//! same two-layer canvas, so a page has the same canvas size in either.

use std::cell::RefCell;
use std::rc::Rc;

use scoremark_render::DocumentSession;

pub mod editor;
pub mod gesture;
pub mod note_session;
pub mod viewer;

#[cfg(test)]
mod test_support;

pub use editor::{Editor, EditorError, EditorState, PendingGesture, Tool};
pub use gesture::{Gesture, GestureConfig, GestureRecognizer, SwipeDirection};
pub use note_session::{thumbnail_base64, NoteSession};
pub use viewer::Viewer;

/// Document session shared by every surface of one window
pub type SharedSession = Rc<RefCell<DocumentSession>>;
