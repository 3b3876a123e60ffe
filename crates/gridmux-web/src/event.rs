#![forbid(unsafe_code)]

//! Events and listener plumbing for the retained node tree.
//!
//! Dispatch follows the browser model: a capture pass from the root down to
//! the target, then a bubble pass back up. Listeners registered for the
//! capture phase on an ancestor therefore run *before* anything inside the
//! target can stop propagation.

use std::rc::Rc;

use crate::dom::NodeId;

/// Kinds of events the tree dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerDown,
    Click,
    KeyDown,
    FocusIn,
    /// A node became visible, or its box changed; geometry-dependent
    /// content should re-measure. Does not bubble.
    BecameVisible,
}

impl EventKind {
    #[must_use]
    pub const fn bubbles(self) -> bool {
        !matches!(self, Self::BecameVisible)
    }
}

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Key name for [`EventKind::KeyDown`].
    pub key: Option<String>,
}

impl Event {
    #[must_use]
    pub const fn new(kind: EventKind) -> Self {
        Self { kind, key: None }
    }

    #[must_use]
    pub const fn pointer_down() -> Self {
        Self::new(EventKind::PointerDown)
    }

    #[must_use]
    pub const fn click() -> Self {
        Self::new(EventKind::Click)
    }

    #[must_use]
    pub const fn focus_in() -> Self {
        Self::new(EventKind::FocusIn)
    }

    #[must_use]
    pub const fn became_visible() -> Self {
        Self::new(EventKind::BecameVisible)
    }

    #[must_use]
    pub fn key_down(key: impl Into<String>) -> Self {
        Self {
            kind: EventKind::KeyDown,
            key: Some(key.into()),
        }
    }

    #[must_use]
    pub const fn bubbles(&self) -> bool {
        self.kind.bubbles()
    }
}

/// Dispatch phase a listener is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Capture,
    Bubble,
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

pub(crate) type Handler = Rc<dyn Fn(&mut EventContext<'_>)>;

#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) kind: EventKind,
    pub(crate) phase: Phase,
    pub(crate) handler: Handler,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// What a listener sees while handling an event.
#[derive(Debug)]
pub struct EventContext<'a> {
    event: &'a Event,
    target: NodeId,
    current: NodeId,
    phase: Phase,
    path: &'a [NodeId],
    stopped: bool,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(event: &'a Event, target: NodeId, path: &'a [NodeId]) -> Self {
        Self {
            event,
            target,
            current: target,
            phase: Phase::Capture,
            path,
            stopped: false,
        }
    }

    pub(crate) fn enter(&mut self, current: NodeId, phase: Phase) {
        self.current = current;
        self.phase = phase;
    }

    #[must_use]
    pub const fn event(&self) -> &Event {
        self.event
    }

    #[must_use]
    pub const fn target(&self) -> NodeId {
        self.target
    }

    /// Node whose listener is running.
    #[must_use]
    pub const fn current(&self) -> NodeId {
        self.current
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Root-to-target propagation path.
    #[must_use]
    pub const fn path(&self) -> &[NodeId] {
        self.path
    }

    /// Whether `node` lies on the propagation path (is the target or one of
    /// its ancestors).
    #[must_use]
    pub fn path_contains(&self, node: NodeId) -> bool {
        self.path.contains(&node)
    }

    /// Stop propagation once listeners on the current node have run.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Summary of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Listeners invoked.
    pub handled: usize,
    /// Node whose listener stopped propagation, if any.
    pub stopped_at: Option<NodeId>,
}
