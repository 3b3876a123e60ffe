#![forbid(unsafe_code)]

//! Post-commit effect scheduling with nested batch scopes.
//!
//! Mutations never run side effects inline. They *schedule* an effect, and
//! the owner drains the queue once the declarative tree has been committed,
//! so every effect observes the latest committed state rather than an
//! intermediate one.
//!
//! # Invariants
//!
//! 1. Nested batches are supported: only closing the outermost batch reports
//!    that a commit is due.
//! 2. An effect scheduled twice before a drain runs once, at the position it
//!    was first scheduled (the latest value wins).
//! 3. [`CommitScheduler::take_effects`] returns effects in first-scheduled
//!    order and leaves the queue empty.

use tracing::{debug, info, info_span};
use web_time::Instant;

/// Queue of effects to run after the next commit.
#[derive(Debug, Clone)]
pub struct CommitScheduler<E> {
    depth: u32,
    pending: Vec<E>,
    commits: u64,
}

impl<E> Default for CommitScheduler<E> {
    fn default() -> Self {
        Self {
            depth: 0,
            pending: Vec::new(),
            commits: 0,
        }
    }
}

impl<E: PartialEq + std::fmt::Debug> CommitScheduler<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a batch. Commits are held back until the matching outermost
    /// [`end_batch`](Self::end_batch).
    pub fn begin_batch(&mut self) -> u32 {
        self.depth += 1;
        self.depth
    }

    /// Close a batch. Returns `true` when this closed the outermost batch
    /// and the owner should commit now.
    pub fn end_batch(&mut self) -> bool {
        match self.depth {
            0 => false,
            depth => {
                self.depth = depth - 1;
                self.depth == 0
            }
        }
    }

    /// Whether a batch is open.
    #[must_use]
    pub const fn is_batching(&self) -> bool {
        self.depth > 0
    }

    /// Queue `effect` for the next commit, coalescing duplicates.
    ///
    /// Returns `false` when an equal effect was already pending.
    pub fn schedule(&mut self, effect: E) -> bool {
        if let Some(slot) = self.pending.iter_mut().find(|pending| **pending == effect) {
            *slot = effect;
            return false;
        }
        debug!(effect = ?effect, depth = self.depth, "effect scheduled");
        self.pending.push(effect);
        true
    }

    /// Number of effects waiting for a commit.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of commits drained so far.
    #[must_use]
    pub const fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Drain pending effects after a commit.
    pub fn take_effects(&mut self) -> Vec<E> {
        self.commits += 1;
        std::mem::take(&mut self.pending)
    }

    /// Drain pending effects and run each one, inside a `gridmux.commit`
    /// span that records how long the effects took.
    pub fn run_effects(&mut self, mut run: impl FnMut(E)) -> usize {
        let effects = self.take_effects();
        let count = effects.len();
        if count == 0 {
            return 0;
        }
        let started = Instant::now();
        let _span = info_span!(
            "gridmux.commit",
            commit = self.commits,
            effects = count as u64,
            duration_us = tracing::field::Empty
        )
        .entered();
        for effect in effects {
            run(effect);
        }
        let duration_us = started.elapsed().as_micros() as u64;
        tracing::Span::current().record("duration_us", duration_us);
        info!(
            commit = self.commits,
            effects = count as u64,
            duration_us,
            "commit effects applied"
        );
        count
    }
}
