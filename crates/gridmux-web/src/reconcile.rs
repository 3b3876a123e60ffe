#![forbid(unsafe_code)]

//! Relocation of persistent panel nodes between the pool and grid cells.
//!
//! The reconciler owns two registries:
//!
//! - pool nodes: session key → persistent wrapper node, written only by the
//!   pool's attach/detach callbacks;
//! - mount points: cell index → empty per-cell container, written only by
//!   the cell views' attach/detach callbacks.
//!
//! [`PanelReconciler::reconcile`] runs after every commit and reads both.
//! It parks every wrapper that has no visible cell in the hidden pool
//! container, moves each assigned wrapper into its cell's mount point, and
//! dispatches [`EventKind::BecameVisible`](crate::event::EventKind) on
//! every wrapper it shows, whether or not it physically moved.
//!
//! A registered node may already be detached when the pass runs (its
//! owner tore it down earlier in the same tick). Such records are pruned
//! and never touched.
//!
//! Teardown ordering: the framework removes a wrapper from the pool
//! container it was mounted into. [`PanelReconciler::pool_node_detaching`]
//! therefore moves a wrapper that currently sits in a cell back to the pool
//! *before* that removal runs. Likewise
//! [`PanelReconciler::mount_point_detaching`] evacuates wrappers out of a
//! mount point that is about to be destroyed.

use std::hash::Hash;

use rustc_hash::FxHashMap;
use tracing::{debug, info, info_span, warn};
use web_time::Instant;

use crate::dom::{Document, DomError, NodeId};
use crate::event::Event;

/// Receiver for per-cell mount-point lifecycle callbacks.
pub trait MountPointSink {
    fn mount_point_attached(&mut self, index: usize, node: NodeId);

    /// Called before the framework removes the mount point of `index`.
    fn mount_point_detaching(&mut self, doc: &mut Document, index: usize, node: NodeId);
}

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    /// Stale records dropped because their node was detached.
    pub pruned: usize,
    /// Wrappers moved back into the pool container.
    pub parked: usize,
    /// Wrappers moved into a cell mount point.
    pub moved: usize,
    /// Wrappers shown in a cell (moved or re-affirmed).
    pub shown: usize,
    /// Visibility signals dispatched.
    pub signalled: usize,
    /// Assigned cells skipped because a node was not registered yet.
    pub skipped: usize,
    /// Relocations refused by the tree.
    pub failed: usize,
}

/// Registries plus the relocation pass.
#[derive(Debug)]
pub struct PanelReconciler<K> {
    pool_container: NodeId,
    pool_nodes: FxHashMap<K, NodeId>,
    mount_points: FxHashMap<usize, NodeId>,
    passes: u64,
}

impl<K> PanelReconciler<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    #[must_use]
    pub fn new(pool_container: NodeId) -> Self {
        Self {
            pool_container,
            pool_nodes: FxHashMap::default(),
            mount_points: FxHashMap::default(),
            passes: 0,
        }
    }

    #[must_use]
    pub const fn pool_container(&self) -> NodeId {
        self.pool_container
    }

    #[must_use]
    pub fn pool_node(&self, key: &K) -> Option<NodeId> {
        self.pool_nodes.get(key).copied()
    }

    #[must_use]
    pub fn mount_point(&self, index: usize) -> Option<NodeId> {
        self.mount_points.get(&index).copied()
    }

    /// Registered mount points as `(cell, node)`, sorted by cell.
    #[must_use]
    pub fn mount_points(&self) -> Vec<(usize, NodeId)> {
        let mut points: Vec<_> = self.mount_points.iter().map(|(i, n)| (*i, *n)).collect();
        points.sort_unstable();
        points
    }

    #[must_use]
    pub fn pool_len(&self) -> usize {
        self.pool_nodes.len()
    }

    /// Reconciliation passes run so far.
    #[must_use]
    pub const fn passes(&self) -> u64 {
        self.passes
    }

    /// Record the wrapper the pool mounted for `key`.
    pub fn pool_node_attached(&mut self, key: K, node: NodeId) {
        debug!(key = ?key, %node, "pool node registered");
        self.pool_nodes.insert(key, node);
    }

    /// Forget `key`'s wrapper, first returning it to the pool container so
    /// the framework finds it where it was mounted.
    pub fn pool_node_detaching(&mut self, doc: &mut Document, key: &K, node: NodeId) {
        if doc.exists(node) && doc.parent(node) != Some(self.pool_container) {
            match doc.append_child(self.pool_container, node) {
                Ok(()) => debug!(key = ?key, %node, "wrapper returned to pool before removal"),
                Err(err) => warn!(key = ?key, %node, %err, "wrapper could not be returned to pool"),
            }
        }
        doc.set_hidden(node, true);
        if self.pool_nodes.get(key) == Some(&node) {
            self.pool_nodes.remove(key);
        }
    }

    fn park(&self, doc: &mut Document, node: NodeId, report: &mut ReconcileReport) {
        doc.set_hidden(node, true);
        if doc.parent(node) == Some(self.pool_container) {
            return;
        }
        match doc.append_child(self.pool_container, node) {
            Ok(()) => report.parked += 1,
            Err(err) => {
                warn!(%node, %err, "wrapper could not be parked");
                report.failed += 1;
            }
        }
    }

    /// Relocate every registered wrapper to match `assignments`.
    pub fn reconcile(&mut self, doc: &mut Document, assignments: &[Option<K>]) -> ReconcileReport {
        self.passes += 1;
        let started = Instant::now();
        let _span = info_span!(
            "gridmux.reconcile",
            pass = self.passes,
            cells = assignments.len() as u64,
            duration_us = tracing::field::Empty
        )
        .entered();
        let mut report = ReconcileReport::default();

        // Keys that will be shown in a cell this pass.
        let shown: FxHashMap<&K, usize> = assignments
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|key| (key, index)))
            .filter(|(_, index)| {
                self.mount_points
                    .get(index)
                    .is_some_and(|mp| doc.is_connected(*mp))
            })
            .collect();

        let mut stale = Vec::new();
        for (key, &node) in &self.pool_nodes {
            if !doc.is_connected(node) {
                stale.push(key.clone());
                continue;
            }
            if !shown.contains_key(key) {
                self.park(doc, node, &mut report);
            }
        }
        for key in stale {
            debug!(key = ?key, "detached pool node pruned");
            self.pool_nodes.remove(&key);
            report.pruned += 1;
        }

        for (index, slot) in assignments.iter().enumerate() {
            let Some(key) = slot else {
                continue;
            };
            let (Some(&node), Some(&mount_point)) =
                (self.pool_nodes.get(key), self.mount_points.get(&index))
            else {
                report.skipped += 1;
                continue;
            };
            if !doc.is_connected(node) {
                self.pool_nodes.remove(key);
                report.pruned += 1;
                continue;
            }
            if !doc.is_connected(mount_point) {
                report.skipped += 1;
                continue;
            }
            if doc.parent(node) != Some(mount_point) {
                if let Err(err) = doc.append_child(mount_point, node) {
                    warn!(key = ?key, index, %err, "wrapper could not be moved into cell");
                    report.failed += 1;
                    continue;
                }
                report.moved += 1;
            }
            doc.set_hidden(node, false);
            report.shown += 1;
            match doc.dispatch(node, &Event::became_visible()) {
                Ok(_) => report.signalled += 1,
                Err(err) => warn!(key = ?key, %err, "visibility signal failed"),
            }
        }

        let duration_us = started.elapsed().as_micros() as u64;
        tracing::Span::current().record("duration_us", duration_us);
        info!(
            pass = self.passes,
            pruned = report.pruned,
            parked = report.parked,
            moved = report.moved,
            shown = report.shown,
            skipped = report.skipped,
            duration_us,
            "panels reconciled"
        );
        report
    }

    /// Move any registered wrapper living under `node` back to the pool.
    fn evacuate(&self, doc: &mut Document, node: NodeId) -> Result<usize, DomError> {
        let residents: Vec<NodeId> = doc
            .children(node)
            .iter()
            .copied()
            .filter(|child| self.pool_nodes.values().any(|n| n == child))
            .collect();
        for &resident in &residents {
            doc.append_child(self.pool_container, resident)?;
            doc.set_hidden(resident, true);
        }
        Ok(residents.len())
    }
}

impl<K> MountPointSink for PanelReconciler<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    fn mount_point_attached(&mut self, index: usize, node: NodeId) {
        debug!(index, %node, "mount point registered");
        self.mount_points.insert(index, node);
    }

    fn mount_point_detaching(&mut self, doc: &mut Document, index: usize, node: NodeId) {
        match self.evacuate(doc, node) {
            Ok(0) => {}
            Ok(count) => debug!(index, count, "wrappers evacuated from mount point"),
            Err(err) => warn!(index, %err, "mount point evacuation failed"),
        }
        if self.mount_points.get(&index) == Some(&node) {
            self.mount_points.remove(&index);
        }
    }
}
