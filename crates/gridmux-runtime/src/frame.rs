#![forbid(unsafe_code)]

//! Deterministic animation-frame scheduling.
//!
//! [`FrameScheduler`] is the host-driven stand-in for
//! `requestAnimationFrame`: callbacks queue up until the host calls
//! [`FrameScheduler::run_frame`], which hands each one the frame context
//! (typically the document) and the frame timestamp. Callbacks requested
//! while a frame runs are deferred to the *next* frame, as in a browser.
//!
//! Handles are shared: cloning a scheduler yields another handle to the
//! same queue, so UI callbacks can capture one and request frames later.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;
use web_time::Duration;

type FrameCallback<C> = Box<dyn FnOnce(&mut C, Duration)>;

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

struct FrameInner<C> {
    next_id: u64,
    queue: Vec<(FrameHandle, FrameCallback<C>)>,
    frames_run: u64,
}

/// Shared queue of callbacks waiting for the next frame.
pub struct FrameScheduler<C> {
    inner: Rc<RefCell<FrameInner<C>>>,
}

impl<C> Clone for FrameScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C> Default for FrameScheduler<C> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(FrameInner {
                next_id: 1,
                queue: Vec::new(),
                frames_run: 0,
            })),
        }
    }
}

impl<C> std::fmt::Debug for FrameScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FrameScheduler")
            .field("pending", &inner.queue.len())
            .field("frames_run", &inner.frames_run)
            .finish()
    }
}

impl<C> FrameScheduler<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `callback` on the next frame.
    pub fn request(&self, callback: impl FnOnce(&mut C, Duration) + 'static) -> FrameHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = FrameHandle(inner.next_id);
        inner.next_id += 1;
        inner.queue.push((handle, Box::new(callback)));
        trace!(handle = handle.0, "frame requested");
        handle
    }

    /// Cancel a pending callback. Returns `false` if it already ran or was
    /// cancelled.
    pub fn cancel(&self, handle: FrameHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.queue.len();
        inner.queue.retain(|(pending, _)| *pending != handle);
        before != inner.queue.len()
    }

    /// Number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    #[must_use]
    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        self.inner
            .borrow()
            .queue
            .iter()
            .any(|(pending, _)| *pending == handle)
    }

    /// Frames run so far.
    #[must_use]
    pub fn frames_run(&self) -> u64 {
        self.inner.borrow().frames_run
    }

    /// Run every callback queued before this call, in request order.
    pub fn run_frame(&self, ctx: &mut C, now: Duration) -> usize {
        let due = {
            let mut inner = self.inner.borrow_mut();
            inner.frames_run += 1;
            std::mem::take(&mut inner.queue)
        };
        let count = due.len();
        for (handle, callback) in due {
            trace!(handle = handle.0, now_us = now.as_micros() as u64, "frame callback");
            callback(&mut *ctx, now);
        }
        count
    }
}

/// Host-controlled monotonic clock for frame timestamps.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    now: Duration,
}

impl FrameClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Set current monotonic time. Time never runs backwards.
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&mut self, dt: Duration) -> Duration {
        self.now = self.now.saturating_add(dt);
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_run_once_in_order() {
        let frames: FrameScheduler<Vec<u32>> = FrameScheduler::new();
        frames.request(|log, _| log.push(1));
        frames.request(|log, _| log.push(2));
        let mut log = Vec::new();
        assert_eq!(frames.run_frame(&mut log, Duration::from_millis(16)), 2);
        assert_eq!(frames.run_frame(&mut log, Duration::from_millis(32)), 0);
        assert_eq!(log, vec![1, 2]);
        assert_eq!(frames.frames_run(), 2);
    }

    #[test]
    fn cancelled_callback_never_runs() {
        let frames: FrameScheduler<Vec<u32>> = FrameScheduler::new();
        let handle = frames.request(|log, _| log.push(1));
        assert!(frames.is_pending(handle));
        assert!(frames.cancel(handle));
        assert!(!frames.cancel(handle));
        let mut log = Vec::new();
        frames.run_frame(&mut log, Duration::ZERO);
        assert!(log.is_empty());
    }

    #[test]
    fn requests_during_a_frame_wait_for_the_next() {
        let frames: FrameScheduler<Vec<u32>> = FrameScheduler::new();
        let again = frames.clone();
        frames.request(move |log, _| {
            log.push(1);
            again.request(|log, _| log.push(2));
        });
        let mut log = Vec::new();
        frames.run_frame(&mut log, Duration::ZERO);
        assert_eq!(log, vec![1]);
        frames.run_frame(&mut log, Duration::ZERO);
        assert_eq!(log, vec![1, 2]);
    }

    #[test]
    fn callback_sees_frame_time() {
        let frames: FrameScheduler<Vec<Duration>> = FrameScheduler::new();
        frames.request(|log, now| log.push(now));
        let mut log = Vec::new();
        frames.run_frame(&mut log, Duration::from_millis(48));
        assert_eq!(log, vec![Duration::from_millis(48)]);
    }

    #[test]
    fn clock_is_monotonic() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(Duration::from_millis(16)), Duration::from_millis(16));
        clock.set(Duration::from_millis(5));
        assert_eq!(clock.now(), Duration::from_millis(16));
    }
}
