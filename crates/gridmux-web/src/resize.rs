#![forbid(unsafe_code)]

//! Container resize observation for cell mount points.
//!
//! The host reports laid-out sizes through [`ResizeHub::record_size`]. A
//! change on an observed node schedules a [`BecameVisible`] dispatch to the
//! node's rendered children on the next frame, so panels measure after
//! layout has settled. With debouncing on, each node has at most one
//! pending notification; a newer observation cancels and reschedules it.
//!
//! [`BecameVisible`]: crate::event::EventKind::BecameVisible

use std::cell::Cell;
use std::rc::Rc;

use gridmux_layout::Size;
use gridmux_runtime::{FrameDebouncer, FrameScheduler};
use rustc_hash::FxHashMap;
use tracing::{trace, warn};
use web_time::Duration;

use crate::dom::{Document, NodeId};
use crate::event::Event;

#[derive(Debug)]
struct Observed {
    size: Size,
    debouncer: FrameDebouncer<Document>,
}

/// Per-node resize observers sharing one frame scheduler.
#[derive(Debug)]
pub struct ResizeHub {
    frames: FrameScheduler<Document>,
    debounce: bool,
    observed: FxHashMap<NodeId, Observed>,
    delivered: Rc<Cell<u64>>,
}

impl ResizeHub {
    #[must_use]
    pub fn new(frames: FrameScheduler<Document>, debounce: bool) -> Self {
        Self {
            frames,
            debounce,
            observed: FxHashMap::default(),
            delivered: Rc::new(Cell::new(0)),
        }
    }

    pub fn observe(&mut self, node: NodeId) -> bool {
        if self.observed.contains_key(&node) {
            return false;
        }
        self.observed.insert(
            node,
            Observed {
                size: Size::default(),
                debouncer: FrameDebouncer::new(self.frames.clone()),
            },
        );
        true
    }

    /// Stop observing `node`, dropping any pending notification.
    pub fn unobserve(&mut self, node: NodeId) -> bool {
        self.observed.remove(&node).is_some_and(|observed| {
            observed.debouncer.cancel();
            true
        })
    }

    /// Observe exactly `nodes`.
    pub fn sync(&mut self, nodes: &[NodeId]) {
        let stale: Vec<NodeId> = self
            .observed
            .keys()
            .filter(|node| !nodes.contains(node))
            .copied()
            .collect();
        for node in stale {
            self.unobserve(node);
        }
        for &node in nodes {
            self.observe(node);
        }
    }

    #[must_use]
    pub fn is_observed(&self, node: NodeId) -> bool {
        self.observed.contains_key(&node)
    }

    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Notifications delivered so far (one per node per frame callback).
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.get()
    }

    /// Record a host size report. Returns `true` if a notification was
    /// scheduled.
    pub fn record_size(&mut self, doc: &mut Document, node: NodeId, size: Size) -> bool {
        if !doc.exists(node) {
            warn!(%node, "size reported for unknown node");
            return false;
        }
        doc.set_size(node, size);
        let Some(observed) = self.observed.get_mut(&node) else {
            return false;
        };
        if observed.size == size {
            return false;
        }
        observed.size = size;
        trace!(%node, width = size.width, height = size.height, "observed resize");

        let delivered = Rc::clone(&self.delivered);
        let notify = move |doc: &mut Document, _: Duration| {
            if !doc.is_rendered(node) {
                return;
            }
            delivered.set(delivered.get() + 1);
            let children = doc.children(node).to_vec();
            for child in children {
                if doc.is_rendered(child)
                    && let Err(err) = doc.dispatch(child, &Event::became_visible())
                {
                    warn!(%child, %err, "resize signal failed");
                }
            }
        };
        if self.debounce {
            observed.debouncer.trigger(notify);
        } else {
            self.frames.request(notify);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Phase};

    struct Fixture {
        doc: Document,
        frames: FrameScheduler<Document>,
        hub: ResizeHub,
        mount_point: NodeId,
        signals: Rc<Cell<u32>>,
    }

    fn fixture(debounce: bool) -> Fixture {
        let mut doc = Document::new();
        let mount_point = doc.create_element("div");
        let root = doc.root();
        doc.append_child(root, mount_point).unwrap();
        let panel = doc.create_element("div");
        doc.append_child(mount_point, panel).unwrap();
        let signals = Rc::new(Cell::new(0));
        let s = Rc::clone(&signals);
        doc.add_listener(panel, EventKind::BecameVisible, Phase::Bubble, move |_| {
            s.set(s.get() + 1);
        })
        .unwrap();
        let frames = FrameScheduler::new();
        let mut hub = ResizeHub::new(frames.clone(), debounce);
        hub.observe(mount_point);
        Fixture {
            doc,
            frames,
            hub,
            mount_point,
            signals,
        }
    }

    impl Fixture {
        fn frame(&mut self) -> usize {
            self.frames.run_frame(&mut self.doc, Duration::ZERO)
        }
    }

    #[test]
    fn burst_of_reports_yields_one_signal_next_frame() {
        let mut f = fixture(true);
        for width in [100, 120, 140] {
            assert!(f.hub.record_size(&mut f.doc, f.mount_point, Size::new(width, 50)));
        }
        assert_eq!(f.frames.pending_count(), 1);
        assert_eq!(f.signals.get(), 0);
        f.frame();
        assert_eq!(f.signals.get(), 1);
        assert_eq!(f.hub.delivered(), 1);
    }

    #[test]
    fn without_debounce_every_report_is_delivered() {
        let mut f = fixture(false);
        f.hub.record_size(&mut f.doc, f.mount_point, Size::new(100, 50));
        f.hub.record_size(&mut f.doc, f.mount_point, Size::new(120, 50));
        assert_eq!(f.frame(), 2);
        assert_eq!(f.signals.get(), 2);
    }

    #[test]
    fn unchanged_size_is_ignored() {
        let mut f = fixture(true);
        assert!(f.hub.record_size(&mut f.doc, f.mount_point, Size::new(10, 10)));
        f.frame();
        assert!(!f.hub.record_size(&mut f.doc, f.mount_point, Size::new(10, 10)));
        assert_eq!(f.frames.pending_count(), 0);
    }

    #[test]
    fn hidden_children_are_not_signalled() {
        let mut f = fixture(true);
        let panel = f.doc.children(f.mount_point)[0];
        f.doc.set_hidden(panel, true);
        f.hub.record_size(&mut f.doc, f.mount_point, Size::new(10, 10));
        f.frame();
        assert_eq!(f.signals.get(), 0);
    }

    #[test]
    fn unobserve_cancels_pending() {
        let mut f = fixture(true);
        f.hub.record_size(&mut f.doc, f.mount_point, Size::new(10, 10));
        f.hub.sync(&[]);
        assert!(!f.hub.is_observed(f.mount_point));
        assert_eq!(f.frame(), 0);
        assert_eq!(f.signals.get(), 0);
    }

    #[test]
    fn unobserved_node_still_records_size() {
        let mut f = fixture(true);
        let other = f.doc.create_element("div");
        assert!(!f.hub.record_size(&mut f.doc, other, Size::new(5, 5)));
        assert_eq!(f.doc.size(other), Size::new(5, 5));
    }
}
