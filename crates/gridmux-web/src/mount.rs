#![forbid(unsafe_code)]

//! Keyed child mounting: the declarative layer over [`Document`].
//!
//! [`KeyedMount`] keeps one node per key under a container. Each
//! [`reconcile`](KeyedMount::reconcile) call compares the desired key list
//! with what is mounted, unmounts keys that vanished, and mounts new ones
//! (appended in desired order; surviving nodes keep their place).
//!
//! Unmounting is a two-step affair, in a fixed order:
//!
//! 1. [`MountHooks::before_unmount`] runs while the node is still mounted.
//! 2. The engine removes the node from **the container it was mounted
//!    into** and releases the node's subtree.
//!
//! If something relocated the node and the hook did not bring it back,
//! step 2 fails with [`DomError::NotAChild`] and the commit aborts. Callers
//! that move mounted nodes elsewhere must undo the move in the hook.

use tracing::debug;

use crate::dom::{Document, DomError, NodeId};

/// Lifecycle callbacks for one keyed mount.
pub trait MountHooks<K> {
    /// Build the node for a newly desired key. The engine appends it.
    fn create(&mut self, doc: &mut Document, key: &K) -> Result<NodeId, DomError>;

    /// The node for `key` is attached to the container.
    fn mounted(&mut self, doc: &mut Document, key: &K, node: NodeId) -> Result<(), DomError> {
        let _ = (doc, key, node);
        Ok(())
    }

    /// The node for `key` is about to be removed from the container.
    fn before_unmount(&mut self, doc: &mut Document, key: &K, node: NodeId) {
        let _ = (doc, key, node);
    }
}

/// Keys mounted and unmounted by one reconcile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDelta<K> {
    pub mounted: Vec<K>,
    pub unmounted: Vec<K>,
}

impl<K> Default for MountDelta<K> {
    fn default() -> Self {
        Self {
            mounted: Vec::new(),
            unmounted: Vec::new(),
        }
    }
}

impl<K> MountDelta<K> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty() && self.unmounted.is_empty()
    }
}

/// One node per key under a fixed container.
#[derive(Debug, Clone)]
pub struct KeyedMount<K> {
    container: NodeId,
    entries: Vec<(K, NodeId)>,
}

impl<K: Clone + PartialEq + std::fmt::Debug> KeyedMount<K> {
    #[must_use]
    pub const fn new(container: NodeId) -> Self {
        Self {
            container,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub const fn container(&self) -> NodeId {
        self.container
    }

    /// Node mounted for `key`.
    #[must_use]
    pub fn node(&self, key: &K) -> Option<NodeId> {
        self.entries
            .iter()
            .find_map(|(k, node)| (k == key).then_some(*node))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bring mounted keys in line with `desired`.
    pub fn reconcile(
        &mut self,
        doc: &mut Document,
        desired: &[K],
        hooks: &mut dyn MountHooks<K>,
    ) -> Result<MountDelta<K>, DomError> {
        let mut delta = MountDelta::default();

        let mut index = 0;
        while index < self.entries.len() {
            if desired.contains(&self.entries[index].0) {
                index += 1;
                continue;
            }
            let (key, node) = self.entries[index].clone();
            hooks.before_unmount(doc, &key, node);
            doc.remove_child(self.container, node)?;
            self.entries.remove(index);
            doc.release_subtree(node);
            debug!(key = ?key, %node, "unmounted");
            delta.unmounted.push(key);
        }

        for key in desired {
            if self.node(key).is_some() {
                continue;
            }
            let node = hooks.create(doc, key)?;
            doc.append_child(self.container, node)?;
            self.entries.push((key.clone(), node));
            hooks.mounted(doc, key, node)?;
            debug!(key = ?key, %node, "mounted");
            delta.mounted.push(key.clone());
        }
        Ok(delta)
    }

    /// Unmount everything (e.g. when the owning view goes away).
    pub fn clear(
        &mut self,
        doc: &mut Document,
        hooks: &mut dyn MountHooks<K>,
    ) -> Result<MountDelta<K>, DomError> {
        self.reconcile(doc, &[], hooks)
    }
}
