#![forbid(unsafe_code)]

//! Retained node tree with identity-preserving moves.
//!
//! [`Document`] is an arena of element nodes addressed by generational
//! [`NodeId`] handles. Each node records its parent, so relocating a node
//! is a parent-pointer update: the node, its listeners, and everything the
//! embedding code associated with it survive the move untouched.
//!
//! Removal mirrors the browser. [`Document::remove_child`] insists that the
//! child really is a child of the given parent and fails with
//! [`DomError::NotAChild`] otherwise. [`Document::release`] frees one node
//! and orphans its children, which stay alive but disconnected. Handles of
//! released nodes never alias later nodes.

use std::collections::BTreeMap;
use std::rc::Rc;

use gridmux_layout::Size;
use tracing::trace;

use crate::event::{
    DispatchOutcome, Event, EventContext, EventKind, Handler, Listener, ListenerId, Phase,
};

/// Deepest ancestor chain walked before a node is treated as disconnected.
const MAX_DEPTH: usize = 4096;

/// Generational node handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Structural errors from tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// Handle does not name a live node.
    NodeNotFound(NodeId),
    /// `child` is not a child of `parent`.
    NotAChild { parent: NodeId, child: NodeId },
    /// The move would make a node its own ancestor.
    HierarchyRequest { parent: NodeId, child: NodeId },
}

impl std::fmt::Display for DomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node {id} does not exist"),
            Self::NotAChild { parent, child } => {
                write!(f, "node {child} to be removed is not a child of {parent}")
            }
            Self::HierarchyRequest { parent, child } => {
                write!(f, "cannot insert {child} under its own descendant {parent}")
            }
        }
    }
}

impl std::error::Error for DomError {}

#[derive(Debug)]
struct NodeData {
    tag: &'static str,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    hidden: bool,
    attrs: BTreeMap<&'static str, String>,
    text: Option<String>,
    size: Size,
    listeners: Vec<Listener>,
}

impl NodeData {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            parent: None,
            children: Vec::new(),
            hidden: false,
            attrs: BTreeMap::new(),
            text: None,
            size: Size::default(),
            listeners: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

/// Arena of retained nodes rooted at a single document root.
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
    next_listener: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only its root (`body`).
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            live: 0,
            next_listener: 1,
        };
        doc.root = doc.create_element("body");
        doc
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, including the root.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.live
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &'static str) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(NodeData::new(tag));
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(NodeData::new(tag)),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        let id = self.create_element("#text");
        if let Some(node) = self.node_mut(id) {
            node.text = Some(text.into());
        }
        id
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn require(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.node(id).ok_or(DomError::NodeNotFound(id))
    }

    /// Whether `id` names a live (not yet released) node.
    #[must_use]
    pub fn exists(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&'static str> {
        self.node(id).map(|node| node.tag)
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Children in document order. Empty for released nodes.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |node| node.children.as_slice())
    }

    /// Move `child` to the end of `parent`'s children.
    ///
    /// A child that already has a parent is detached from it first, so the
    /// node keeps its identity across the move.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.require(parent)?;
        self.require(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        trace!(%parent, %child, "node appended");
        Ok(())
    }

    /// Remove `child` from `parent`.
    ///
    /// Fails with [`DomError::NotAChild`] when `child` lives elsewhere; the
    /// tree is left unchanged in that case.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.require(parent)?;
        let actual = self.require(child)?.parent;
        if actual != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child);
        Ok(())
    }

    /// Detach `id` from its parent, if it has one.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
        true
    }

    /// Free one node. Its children become detached orphans.
    ///
    /// The root cannot be released.
    pub fn release(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.exists(id) {
            return false;
        }
        self.detach(id);
        let children = self
            .node_mut(id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in children {
            if let Some(node) = self.node_mut(child) {
                node.parent = None;
            }
        }
        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        true
    }

    /// Free a node and all of its descendants.
    pub fn release_subtree(&mut self, id: NodeId) -> usize {
        let mut doomed = self.descendants(id);
        doomed.push(id);
        doomed
            .into_iter()
            .rev()
            .filter(|node| self.release(*node))
            .count()
    }

    /// All descendants of `id` in pre-order, excluding `id`.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        for _ in 0..MAX_DEPTH {
            match cursor {
                Some(current) if current == ancestor => return true,
                Some(current) => cursor = self.parent(current),
                None => return false,
            }
        }
        false
    }

    /// Live and attached (transitively) to the document root.
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.exists(id) && self.is_inclusive_ancestor(self.root, id)
    }

    /// Root-to-node ancestor chain, inclusive. Empty if `id` is released.
    #[must_use]
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = self.node(id).map(|_| id);
        while let Some(current) = cursor {
            if path.len() >= MAX_DEPTH {
                break;
            }
            path.push(current);
            cursor = self.parent(current);
        }
        path.reverse();
        path
    }

    /// Set the `display: none` flag. Returns whether it changed.
    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) -> bool {
        match self.node_mut(id) {
            Some(node) if node.hidden != hidden => {
                node.hidden = hidden;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|node| node.hidden)
    }

    /// Connected, and neither the node nor any ancestor is hidden.
    #[must_use]
    pub fn is_rendered(&self, id: NodeId) -> bool {
        let path = self.path_to(id);
        path.first() == Some(&self.root) && path.iter().all(|node| !self.is_hidden(*node))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &'static str, value: impl Into<String>) {
        if let Some(node) = self.node_mut(id) {
            node.attrs.insert(name, value.into());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &'static str) {
        if let Some(node) = self.node_mut(id) {
            node.attrs.remove(name);
        }
    }

    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .and_then(|node| node.attrs.get(name))
            .map(String::as_str)
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(node) = self.node_mut(id) {
            node.text = Some(text.into());
        }
    }

    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|node| node.text.as_deref())
    }

    /// Concatenated text of `id` and its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        std::iter::once(id)
            .chain(self.descendants(id))
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Record the box size the host laid out for `id`.
    pub fn set_size(&mut self, id: NodeId, size: Size) {
        if let Some(node) = self.node_mut(id) {
            node.size = size;
        }
    }

    /// Host-reported size of `id` itself.
    #[must_use]
    pub fn size(&self, id: NodeId) -> Size {
        self.node(id).map(|node| node.size).unwrap_or_default()
    }

    /// Size content inside `id` would measure.
    ///
    /// Unrendered nodes measure zero. Nodes without their own size fill the
    /// nearest sized ancestor.
    #[must_use]
    pub fn client_size(&self, id: NodeId) -> Size {
        if !self.is_rendered(id) {
            return Size::default();
        }
        self.path_to(id)
            .into_iter()
            .rev()
            .map(|node| self.size(node))
            .find(|size| !size.is_empty())
            .unwrap_or_default()
    }

    /// Register a listener on `id`.
    pub fn add_listener(
        &mut self,
        id: NodeId,
        kind: EventKind,
        phase: Phase,
        handler: impl Fn(&mut EventContext<'_>) + 'static,
    ) -> Result<ListenerId, DomError> {
        let listener_id = ListenerId(self.next_listener);
        let node = self.node_mut(id).ok_or(DomError::NodeNotFound(id))?;
        node.listeners.push(Listener {
            id: listener_id,
            kind,
            phase,
            handler: Rc::new(handler),
        });
        self.next_listener += 1;
        Ok(listener_id)
    }

    pub fn remove_listener(&mut self, id: NodeId, listener: ListenerId) -> bool {
        self.node_mut(id).is_some_and(|node| {
            let before = node.listeners.len();
            node.listeners.retain(|l| l.id != listener);
            before != node.listeners.len()
        })
    }

    #[must_use]
    pub fn listener_count(&self, id: NodeId) -> usize {
        self.node(id).map_or(0, |node| node.listeners.len())
    }

    fn handlers(&self, id: NodeId, kind: EventKind, phase: Phase) -> Vec<Handler> {
        self.node(id)
            .map(|node| {
                node.listeners
                    .iter()
                    .filter(|l| l.kind == kind && l.phase == phase)
                    .map(|l| Rc::clone(&l.handler))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Dispatch `event` at `target`.
    ///
    /// Capture listeners run root → target, then bubble listeners run
    /// target → root. The target's own bubble listeners always run; its
    /// ancestors' only for bubbling events.
    pub fn dispatch(&self, target: NodeId, event: &Event) -> Result<DispatchOutcome, DomError> {
        self.require(target)?;
        let path = self.path_to(target);
        let mut ctx = EventContext::new(event, target, &path);
        let mut outcome = DispatchOutcome::default();

        let bubble_path: Vec<NodeId> = if event.bubbles() {
            path.iter().rev().copied().collect()
        } else {
            vec![target]
        };
        let passes = path
            .iter()
            .map(|node| (*node, Phase::Capture))
            .chain(bubble_path.into_iter().map(|node| (node, Phase::Bubble)));

        for (node, phase) in passes {
            let handlers = self.handlers(node, event.kind, phase);
            if handlers.is_empty() {
                continue;
            }
            ctx.enter(node, phase);
            for handler in handlers {
                handler(&mut ctx);
                outcome.handled += 1;
            }
            if ctx.is_stopped() {
                outcome.stopped_at = Some(node);
                break;
            }
        }
        Ok(outcome)
    }
}
