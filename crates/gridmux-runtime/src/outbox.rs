#![forbid(unsafe_code)]

//! Shared message queue between UI callbacks and the update loop.
//!
//! Event listeners run while the document is mutably borrowed, so they
//! cannot touch application state directly. They push a message instead;
//! the owner drains the outbox once dispatch returns and applies each
//! message in push order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Cloneable handle to one message queue.
pub struct Outbox<M> {
    queue: Rc<RefCell<VecDeque<M>>>,
}

impl<M> Clone for Outbox<M> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
        }
    }
}

impl<M> Default for Outbox<M> {
    fn default() -> Self {
        Self {
            queue: Rc::new(RefCell::new(VecDeque::new())),
        }
    }
}

impl<M: std::fmt::Debug> std::fmt::Debug for Outbox<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.queue.borrow().iter()).finish()
    }
}

impl<M> Outbox<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: M) {
        self.queue.borrow_mut().push_back(message);
    }

    /// Take every queued message, oldest first.
    pub fn drain(&self) -> Vec<M> {
        self.queue.borrow_mut().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}
