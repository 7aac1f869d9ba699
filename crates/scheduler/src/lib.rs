//! Scoremark scheduling primitives
//!
//! Rendering runs cooperatively on one thread: tasks are advanced by polling and
//! checked against cancellation tokens between steps. This crate holds the small
//! pieces shared by every surface.
//!
//! ```
//! use scoremark_scheduler::CancellationRegistry;
//!
//! let slots = CancellationRegistry::new();
//! let first = slots.register("viewer");
//!
//! // Navigating again supersedes the in-flight render
//! let second = slots.register("viewer");
//! assert!(first.is_cancelled());
//! assert!(!second.is_cancelled());
//! ```

mod cancel;
mod guard;
mod retry;

pub use cancel::{CancellationRegistry, CancellationToken};
pub use guard::OneShot;
pub use retry::{RetryPolicy, RetryState};
