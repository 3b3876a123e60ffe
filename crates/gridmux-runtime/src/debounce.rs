#![forbid(unsafe_code)]

//! One-pending-at-a-time frame debouncing.
//!
//! A burst of triggers (for example successive resize observations) must
//! produce one callback on the frame after the burst, never a queue of
//! them. Each [`FrameDebouncer::trigger`] cancels the pending request, if
//! any, and schedules a fresh one.

use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;
use web_time::Duration;

use crate::frame::{FrameHandle, FrameScheduler};

/// Coalesces triggers into at most one pending frame callback.
pub struct FrameDebouncer<C> {
    frames: FrameScheduler<C>,
    pending: Rc<Cell<Option<FrameHandle>>>,
    rescheduled: Rc<Cell<u64>>,
}

impl<C> Clone for FrameDebouncer<C> {
    fn clone(&self) -> Self {
        Self {
            frames: self.frames.clone(),
            pending: Rc::clone(&self.pending),
            rescheduled: Rc::clone(&self.rescheduled),
        }
    }
}

impl<C> std::fmt::Debug for FrameDebouncer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDebouncer")
            .field("pending", &self.pending.get())
            .field("rescheduled", &self.rescheduled.get())
            .finish()
    }
}

impl<C: 'static> FrameDebouncer<C> {
    #[must_use]
    pub fn new(frames: FrameScheduler<C>) -> Self {
        Self {
            frames,
            pending: Rc::new(Cell::new(None)),
            rescheduled: Rc::new(Cell::new(0)),
        }
    }

    /// Schedule `callback` for the next frame, replacing any pending one.
    pub fn trigger(&self, callback: impl FnOnce(&mut C, Duration) + 'static) -> FrameHandle {
        if let Some(previous) = self.pending.take()
            && self.frames.cancel(previous)
        {
            self.rescheduled.set(self.rescheduled.get() + 1);
            trace!(previous = previous.get(), "debounced frame rescheduled");
        }
        let pending = Rc::clone(&self.pending);
        let frames = self.frames.clone();
        let handle = self.frames.request(move |ctx, now| {
            // A trigger from inside this frame may already own the slot.
            if pending.get().is_some_and(|handle| !frames.is_pending(handle)) {
                pending.set(None);
            }
            callback(ctx, now);
        });
        self.pending.set(Some(handle));
        handle
    }

    /// Drop the pending callback, if any.
    pub fn cancel(&self) -> bool {
        self.pending
            .take()
            .is_some_and(|handle| self.frames.cancel(handle))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }

    /// How many pending callbacks were replaced by a later trigger.
    #[must_use]
    pub fn rescheduled(&self) -> u64 {
        self.rescheduled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_collapses_to_one_callback() {
        let frames: FrameScheduler<Vec<u32>> = FrameScheduler::new();
        let debouncer = FrameDebouncer::new(frames.clone());
        for i in 0..5 {
            debouncer.trigger(move |log, _| log.push(i));
        }
        assert_eq!(frames.pending_count(), 1);
        assert_eq!(debouncer.rescheduled(), 4);
        let mut log = Vec::new();
        frames.run_frame(&mut log, Duration::ZERO);
        assert_eq!(log, vec![4]);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn trigger_after_run_schedules_again() {
        let frames: FrameScheduler<Vec<u32>> = FrameScheduler::new();
        let debouncer = FrameDebouncer::new(frames.clone());
        let mut log = Vec::new();
        debouncer.trigger(|log, _| log.push(1));
        frames.run_frame(&mut log, Duration::ZERO);
        debouncer.trigger(|log, _| log.push(2));
        assert!(debouncer.is_pending());
        frames.run_frame(&mut log, Duration::ZERO);
        assert_eq!(log, vec![1, 2]);
        assert_eq!(debouncer.rescheduled(), 0);
    }

    #[test]
    fn cancel_drops_pending() {
        let frames: FrameScheduler<Vec<u32>> = FrameScheduler::new();
        let debouncer = FrameDebouncer::new(frames.clone());
        debouncer.trigger(|log, _| log.push(1));
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        let mut log = Vec::new();
        frames.run_frame(&mut log, Duration::ZERO);
        assert!(log.is_empty());
    }
}
