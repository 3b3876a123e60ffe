#![forbid(unsafe_code)]

//! The hidden pool of persistent panel wrappers.
//!
//! Each open session owns one wrapper node, mounted under the pool
//! container by the keyed mount engine exactly once and unmounted exactly
//! once when the session closes. The panel's factory runs when the wrapper
//! first mounts; its content is never rebuilt afterwards, however often the
//! reconciler moves the wrapper around.

use std::hash::Hash;

use gridmux_runtime::FrameScheduler;
use tracing::{debug, warn};

use crate::dom::{Document, DomError, NodeId};
use crate::mount::{KeyedMount, MountDelta, MountHooks};
use crate::panel::{Panel, PanelContext};
use crate::reconcile::PanelReconciler;

/// Builds the panel for one session, once.
pub type PanelFactory<K> = Box<dyn FnOnce(&K) -> Box<dyn Panel>>;

struct Session<K> {
    key: K,
    factory: Option<PanelFactory<K>>,
    panel: Option<Box<dyn Panel>>,
}

impl<K: std::fmt::Debug> std::fmt::Debug for Session<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("mounted", &self.panel.is_some())
            .finish_non_exhaustive()
    }
}

/// Owner of the pool container and every live panel.
#[derive(Debug)]
pub struct PanelPool<K> {
    container: NodeId,
    wrappers: KeyedMount<K>,
    open: Vec<Session<K>>,
    retiring: Vec<Session<K>>,
}

impl<K> PanelPool<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    /// Create the hidden pool container under `parent`.
    pub fn new(doc: &mut Document, parent: NodeId) -> Result<Self, DomError> {
        let container = doc.create_element("div");
        doc.set_attr(container, "class", "gridmux-pool");
        doc.set_hidden(container, true);
        doc.append_child(parent, container)?;
        Ok(Self {
            container,
            wrappers: KeyedMount::new(container),
            open: Vec::new(),
            retiring: Vec::new(),
        })
    }

    #[must_use]
    pub const fn container(&self) -> NodeId {
        self.container
    }

    /// Register the panel factory for a newly opened session.
    ///
    /// Returns `false` if `key` is already open; its panel is kept.
    pub fn register(&mut self, key: K, factory: PanelFactory<K>) -> bool {
        if self.is_open(&key) {
            warn!(key = ?key, "session already registered");
            return false;
        }
        self.open.push(Session {
            key,
            factory: Some(factory),
            panel: None,
        });
        true
    }

    /// Mark `key` closed. Its panel is disposed on the next [`sync`](Self::sync).
    pub fn unregister(&mut self, key: &K) -> bool {
        let Some(position) = self.open.iter().position(|s| &s.key == key) else {
            return false;
        };
        let session = self.open.remove(position);
        self.retiring.push(session);
        true
    }

    #[must_use]
    pub fn is_open(&self, key: &K) -> bool {
        self.open.iter().any(|s| &s.key == key)
    }

    /// Open keys in the order they were registered.
    #[must_use]
    pub fn open_keys(&self) -> Vec<K> {
        self.open.iter().map(|s| s.key.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Wrapper node mounted for `key`.
    #[must_use]
    pub fn wrapper(&self, key: &K) -> Option<NodeId> {
        self.wrappers.node(key)
    }

    /// Mount wrappers for new sessions and unmount closed ones.
    pub fn sync(
        &mut self,
        doc: &mut Document,
        frames: &FrameScheduler<Document>,
        reconciler: &mut PanelReconciler<K>,
    ) -> Result<MountDelta<K>, DomError> {
        let desired = self.open_keys();
        let reopened: Vec<K> = self
            .retiring
            .iter()
            .filter(|s| desired.contains(&s.key))
            .map(|s| s.key.clone())
            .collect();
        let mut hooks = PoolHooks {
            open: &mut self.open,
            retiring: &mut self.retiring,
            frames,
            reconciler,
        };
        let mut delta = MountDelta::default();
        if !reopened.is_empty() {
            // Closed and reopened since the last sync: tear the old wrapper
            // down first so the new panel gets a fresh one.
            let surviving: Vec<K> = desired
                .iter()
                .filter(|key| !reopened.contains(key))
                .cloned()
                .collect();
            delta = self.wrappers.reconcile(doc, &surviving, &mut hooks)?;
        }
        let rest = self.wrappers.reconcile(doc, &desired, &mut hooks)?;
        delta.mounted.extend(rest.mounted);
        delta.unmounted.extend(rest.unmounted);
        if !self.retiring.is_empty() {
            // Closed before their wrapper ever mounted.
            for session in self.retiring.drain(..) {
                debug!(key = ?session.key, "session closed before mount");
            }
        }
        Ok(delta)
    }
}

struct PoolHooks<'a, K> {
    open: &'a mut Vec<Session<K>>,
    retiring: &'a mut Vec<Session<K>>,
    frames: &'a FrameScheduler<Document>,
    reconciler: &'a mut PanelReconciler<K>,
}

impl<K> MountHooks<K> for PoolHooks<'_, K>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    fn create(&mut self, doc: &mut Document, key: &K) -> Result<NodeId, DomError> {
        let wrapper = doc.create_element("div");
        doc.set_attr(wrapper, "class", "gridmux-panel");
        doc.set_attr(wrapper, "data-session", format!("{key:?}"));
        doc.set_hidden(wrapper, true);
        Ok(wrapper)
    }

    fn mounted(&mut self, doc: &mut Document, key: &K, node: NodeId) -> Result<(), DomError> {
        self.reconciler.pool_node_attached(key.clone(), node);
        let Some(session) = self.open.iter_mut().find(|s| &s.key == key) else {
            return Ok(());
        };
        let Some(factory) = session.factory.take() else {
            return Ok(());
        };
        let mut panel = factory(key);
        panel.mount(PanelContext {
            doc,
            wrapper: node,
            frames: self.frames,
        })?;
        session.panel = Some(panel);
        debug!(key = ?key, %node, "panel mounted");
        Ok(())
    }

    fn before_unmount(&mut self, doc: &mut Document, key: &K, node: NodeId) {
        self.reconciler.pool_node_detaching(doc, key, node);
        let Some(position) = self.retiring.iter().position(|s| &s.key == key) else {
            return;
        };
        let session = self.retiring.remove(position);
        if let Some(mut panel) = session.panel {
            panel.dispose(doc);
            debug!(key = ?key, %node, "panel disposed");
        }
    }
}
