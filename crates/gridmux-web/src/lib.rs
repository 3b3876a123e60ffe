#![forbid(unsafe_code)]

//! `gridmux-web` is the retained-tree half of gridmux.
//!
//! Design goals:
//! - **Identity-preserving moves**: every open session owns one wrapper node
//!   that is created once, relocated any number of times, and destroyed once.
//! - **Declarative grid**: cells are a pure function of layout, assignments
//!   and sessions, mounted through a keyed mount engine.
//! - **Host-driven I/O**: the embedding environment dispatches input, reports
//!   element sizes, and advances frames.
//!
//! The node arena in [`dom`] stands in for the browser document. It does not
//! bind to `wasm-bindgen`; a JS shell mirrors it onto real elements.

pub mod cell;
pub mod dom;
pub mod event;
pub mod grid;
pub mod mount;
pub mod panel;
pub mod pool;
pub mod reconcile;
pub mod resize;

pub use cell::{CellContent, CellPlan, CellView, GridMsg, GridTexts, PickerOption, plan_cell};
pub use dom::{Document, DomError, NodeId};
pub use event::{DispatchOutcome, Event, EventContext, EventKind, ListenerId, Phase};
pub use grid::{EmptyStateView, GridPlan, GridProps, GridView, plan_grid};
pub use mount::{KeyedMount, MountDelta, MountHooks};
pub use panel::{Panel, PanelContext};
pub use pool::{PanelFactory, PanelPool};
pub use reconcile::{MountPointSink, PanelReconciler, ReconcileReport};
pub use resize::ResizeHub;
