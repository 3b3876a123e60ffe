#![forbid(unsafe_code)]

//! Cell → session-key assignment state machine.
//!
//! # Invariants
//!
//! 1. `assignments.len() == layout.cell_count()` at all times (no holes).
//! 2. A key occupies at most one cell. Enforced here, never by callers.
//! 3. `version` increments by exactly 1 on each state-changing mutation;
//!    no-op calls leave it untouched.
//!
//! The store never creates or destroys sessions. Dropping a key from the
//! map only makes it *unassigned*; the session behind it is untouched.
//!
//! Invalid cell indices are not errors. Mutations addressed to a cell that
//! does not exist are ignored, lookups return `None`, and
//! [`GridAssignmentStore::set_layout`] repairs an out-of-range focus.

use tracing::{debug, warn};

use crate::{FocusDirection, GridLayout};

/// Layout, cell assignments, and the focused cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridAssignmentStore<K> {
    layout: GridLayout,
    assignments: Vec<Option<K>>,
    focused_cell: usize,
    version: u64,
}

impl<K: Clone + Eq + std::fmt::Debug> GridAssignmentStore<K> {
    /// Create a store with every cell of `layout` empty and focus on cell 0.
    #[must_use]
    pub fn new(layout: GridLayout) -> Self {
        Self {
            layout,
            assignments: vec![None; layout.cell_count()],
            focused_cell: 0,
            version: 0,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> GridLayout {
        self.layout
    }

    /// The full map, indexed by cell.
    #[must_use]
    pub fn assignments(&self) -> &[Option<K>] {
        &self.assignments
    }

    /// Key shown in `index`, or `None` for empty or nonexistent cells.
    #[must_use]
    pub fn assignment(&self, index: usize) -> Option<&K> {
        self.assignments.get(index).and_then(Option::as_ref)
    }

    #[must_use]
    pub const fn focused_cell(&self) -> usize {
        self.focused_cell
    }

    /// Mutation counter for dirty-checking renders.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Cell currently holding `key`.
    #[must_use]
    pub fn cell_of(&self, key: &K) -> Option<usize> {
        self.assignments
            .iter()
            .position(|slot| slot.as_ref() == Some(key))
    }

    #[must_use]
    pub fn is_placed(&self, key: &K) -> bool {
        self.cell_of(key).is_some()
    }

    /// Keys in cell order.
    pub fn placed_keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.assignments.iter().flatten()
    }

    /// Indices of empty cells in ascending order.
    pub fn empty_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.assignments
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.is_none().then_some(index))
    }

    /// Replace the layout, carrying over cells whose index still exists.
    ///
    /// New indices start empty. Keys in dropped indices become unassigned.
    /// An out-of-range focus resets to cell 0.
    pub fn set_layout(&mut self, next: GridLayout) {
        if next == self.layout {
            if !next.contains(self.focused_cell) {
                self.focused_cell = 0;
                self.bump();
            }
            return;
        }
        let count = next.cell_count();
        let dropped: Vec<K> = self
            .assignments
            .iter()
            .skip(count)
            .flatten()
            .cloned()
            .collect();
        self.assignments.resize(count, None);
        if self.focused_cell >= count {
            self.focused_cell = 0;
        }
        debug!(
            from = %self.layout,
            to = %next,
            dropped = ?dropped,
            focused_cell = self.focused_cell,
            "grid layout changed"
        );
        self.layout = next;
        self.bump();
    }

    /// Put `key` in cell `index`, or clear it when `key` is `None`.
    ///
    /// A key already shown elsewhere is moved, not duplicated. Returns
    /// `false` when nothing changed (including an out-of-range index).
    pub fn assign_cell(&mut self, index: usize, key: Option<K>) -> bool {
        if index >= self.assignments.len() {
            warn!(index, cells = self.assignments.len(), "assign to nonexistent cell ignored");
            return false;
        }
        if self.assignments[index] == key {
            return false;
        }
        if let Some(key) = key.as_ref()
            && let Some(previous) = self.cell_of(key)
        {
            self.assignments[previous] = None;
        }
        debug!(index, key = ?key, "cell assigned");
        self.assignments[index] = key;
        self.bump();
        true
    }

    /// Clear every cell holding `key`. Returns the vacated cells.
    pub fn evict_key(&mut self, key: &K) -> Vec<usize> {
        let mut vacated = Vec::new();
        for (index, slot) in self.assignments.iter_mut().enumerate() {
            if slot.as_ref() == Some(key) {
                *slot = None;
                vacated.push(index);
            }
        }
        if !vacated.is_empty() {
            debug!(key = ?key, vacated = ?vacated, "key evicted");
            self.bump();
        }
        vacated
    }

    /// Evict `key` and refill each vacated cell with the next unplaced key
    /// from `fallback`, in list order.
    ///
    /// Cells with no remaining fallback stay empty. `key` itself is never
    /// used as its own fallback.
    pub fn evict_key_with_fallback(&mut self, key: &K, fallback: &[K]) -> Vec<usize> {
        let vacated = self.evict_key(key);
        if vacated.is_empty() {
            return vacated;
        }
        let mut candidates = fallback.iter().filter(|candidate| *candidate != key);
        for &index in &vacated {
            let next = candidates.by_ref().find(|candidate| !self.is_placed(candidate));
            let Some(next) = next else {
                break;
            };
            debug!(index, key = ?next, "vacated cell refilled");
            self.assignments[index] = Some(next.clone());
        }
        // evict_key already bumped; the refill is part of the same mutation.
        vacated
    }

    /// Make `key` visible somewhere, idempotently.
    ///
    /// Already placed: no-op. Otherwise the first empty cell wins; with no
    /// empty cell the focused cell is overwritten. Returns the cell that
    /// shows `key`.
    pub fn auto_place(&mut self, key: K) -> usize {
        if let Some(index) = self.cell_of(&key) {
            return index;
        }
        let index = match self.empty_cells().next() {
            Some(index) => index,
            None if self.layout.contains(self.focused_cell) => self.focused_cell,
            None => 0,
        };
        if let Some(displaced) = self.assignments[index].as_ref() {
            debug!(index, displaced = ?displaced, key = ?key, "auto-place overwrote focused cell");
        } else {
            debug!(index, key = ?key, "auto-placed into empty cell");
        }
        self.assignments[index] = Some(key);
        self.bump();
        index
    }

    /// Set the focused cell without validation.
    ///
    /// Focus may briefly run ahead of a pending layout change; the next
    /// [`set_layout`](Self::set_layout) repairs it if needed.
    pub fn set_focused_cell(&mut self, index: usize) {
        if self.focused_cell == index {
            return;
        }
        self.focused_cell = index;
        self.bump();
    }

    /// Move focus to the neighbouring cell in `direction`.
    pub fn move_focus(&mut self, direction: FocusDirection) -> usize {
        if let Some(next) = self.layout.neighbor(self.focused_cell, direction) {
            self.set_focused_cell(next);
        }
        self.focused_cell
    }

    /// Exchange the contents of two cells.
    pub fn swap_cells(&mut self, a: usize, b: usize) -> bool {
        let len = self.assignments.len();
        if a >= len || b >= len {
            warn!(a, b, cells = len, "swap with nonexistent cell ignored");
            return false;
        }
        if self.assignments[a] == self.assignments[b] {
            return false;
        }
        self.assignments.swap(a, b);
        self.bump();
        true
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
