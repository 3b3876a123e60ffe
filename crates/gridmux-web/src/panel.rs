#![forbid(unsafe_code)]

//! Panel content contract.
//!
//! A [`Panel`] is whatever lives inside one session's wrapper node: a
//! terminal surface, a file browser. The pool calls [`Panel::mount`]
//! exactly once when the session opens and [`Panel::dispose`] exactly once
//! when it closes. Between the two, the wrapper may be moved between the
//! hidden pool and any number of grid cells; the panel is never told, apart
//! from the [`EventKind::BecameVisible`] signal dispatched on its wrapper.

use gridmux_layout::Size;
use gridmux_runtime::{FrameDebouncer, FrameScheduler};

use crate::dom::{Document, DomError, NodeId};
use crate::event::{EventKind, ListenerId, Phase};

/// Everything a panel gets when it is mounted.
pub struct PanelContext<'a> {
    pub doc: &'a mut Document,
    /// The persistent wrapper node owned by the pool.
    pub wrapper: NodeId,
    /// Frame scheduler for deferred measurement.
    pub frames: &'a FrameScheduler<Document>,
}

impl PanelContext<'_> {
    /// Re-measure the wrapper on the frame after each visibility signal.
    ///
    /// Signals arriving before that frame collapse into one measurement.
    /// `on_measure` receives the wrapper's client size; a wrapper that is
    /// hidden again by then measures zero and is skipped.
    pub fn measure_on_visible(
        &mut self,
        on_measure: impl Fn(Size) + 'static,
    ) -> Result<ListenerId, DomError> {
        let wrapper = self.wrapper;
        let debouncer = FrameDebouncer::new(self.frames.clone());
        let on_measure = std::rc::Rc::new(on_measure);
        self.doc
            .add_listener(wrapper, EventKind::BecameVisible, Phase::Bubble, move |_| {
                let on_measure = std::rc::Rc::clone(&on_measure);
                debouncer.trigger(move |doc: &mut Document, _| {
                    let size = doc.client_size(wrapper);
                    if !size.is_empty() {
                        on_measure(size);
                    }
                });
            })
    }
}

/// Content bound to one open session.
pub trait Panel {
    /// Render into `cx.wrapper`. Called once per session.
    fn mount(&mut self, cx: PanelContext<'_>) -> Result<(), DomError>;

    /// Tear down live resources. Called once, when the session closes,
    /// while the wrapper is still attached to the pool.
    fn dispose(&mut self, doc: &mut Document) {
        let _ = doc;
    }
}
