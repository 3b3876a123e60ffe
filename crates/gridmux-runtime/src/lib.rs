#![forbid(unsafe_code)]

//! Host-driven scheduling primitives for gridmux.
//!
//! Everything here is single-threaded and cooperative. Nothing blocks and
//! nothing reads the wall clock to decide *when* to run: the host pushes
//! messages, closes commits, and advances the frame clock explicitly.
//!
//! - [`commit`]: post-commit effect queue with nested batch scopes.
//! - [`frame`]: deterministic animation-frame scheduler.
//! - [`debounce`]: one-pending-at-a-time frame debouncer.
//! - [`outbox`]: shared message queue filled by UI callbacks.

pub mod commit;
pub mod debounce;
pub mod frame;
pub mod outbox;

pub use commit::CommitScheduler;
pub use debounce::FrameDebouncer;
pub use frame::{FrameClock, FrameHandle, FrameScheduler};
pub use outbox::Outbox;
