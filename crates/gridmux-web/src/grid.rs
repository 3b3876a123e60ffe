#![forbid(unsafe_code)]

//! The grid: a fixed number of cells laid out in equal tracks.
//!
//! [`plan_grid`] is a pure function of the layout, the assignment map and
//! the session list. [`GridView`] mounts one [`CellView`] per cell index
//! through the keyed mount engine, reporting each cell's mount point to a
//! [`MountPointSink`] as it comes and goes.

use std::cell::Cell;
use std::rc::Rc;

use gridmux_layout::GridLayout;
use gridmux_runtime::Outbox;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::cell::{CellPlan, CellView, GridMsg, GridTexts, plan_cell};
use crate::dom::{Document, DomError, NodeId};
use crate::event::{EventKind, Phase};
use crate::mount::{KeyedMount, MountDelta, MountHooks};
use crate::reconcile::MountPointSink;

/// Inputs to one grid render.
pub struct GridProps<'a, K, S> {
    pub layout: GridLayout,
    pub assignments: &'a [Option<K>],
    pub sessions: &'a [S],
    pub key_of: &'a dyn Fn(&S) -> K,
    pub label_of: &'a dyn Fn(&S) -> String,
    pub focused_cell: usize,
    /// Cell whose session dropdown is open.
    pub open_picker: Option<usize>,
}

/// What the grid shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridPlan<K> {
    /// First run: a single cell and nothing to place in it.
    EmptyState,
    Cells {
        layout: GridLayout,
        cells: Vec<CellPlan<K>>,
    },
}

impl<K> GridPlan<K> {
    #[must_use]
    pub fn cell_count(&self) -> usize {
        match self {
            Self::EmptyState => 0,
            Self::Cells { cells, .. } => cells.len(),
        }
    }
}

/// Plan the grid.
pub fn plan_grid<K: Clone, S>(props: &GridProps<'_, K, S>) -> GridPlan<K> {
    let count = props.layout.cell_count();
    if count == 1 && props.sessions.is_empty() {
        return GridPlan::EmptyState;
    }
    let cells = (0..count)
        .map(|index| {
            plan_cell(
                index,
                index == props.focused_cell,
                props.assignments.get(index).and_then(Option::as_ref),
                props.sessions,
                props.key_of,
                props.label_of,
                props.open_picker == Some(index),
            )
        })
        .collect();
    GridPlan::Cells {
        layout: props.layout,
        cells,
    }
}

/// Builds the caller's first-run view. The grid attaches the returned node.
pub type EmptyStateView = Box<dyn Fn(&mut Document, &GridTexts) -> Result<NodeId, DomError>>;

fn default_empty_state(doc: &mut Document, texts: &GridTexts) -> Result<NodeId, DomError> {
    let node = doc.create_element("div");
    doc.set_attr(node, "class", "gridmux-empty-state");
    let text = doc.create_text(texts.empty_state.as_str());
    doc.append_child(node, text)?;
    Ok(node)
}

/// Retained grid.
pub struct GridView<K> {
    root: NodeId,
    cells: KeyedMount<usize>,
    views: FxHashMap<usize, CellView<K>>,
    empty_state: Option<NodeId>,
    empty_state_view: EmptyStateView,
    open_dropdown: Rc<Cell<Option<NodeId>>>,
    outbox: Outbox<GridMsg<K>>,
    texts: GridTexts,
    applied: Option<GridLayout>,
}

impl<K: std::fmt::Debug> std::fmt::Debug for GridView<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridView")
            .field("root", &self.root)
            .field("cells", &self.cells.len())
            .field("empty_state", &self.empty_state)
            .field("layout", &self.applied)
            .finish_non_exhaustive()
    }
}

impl<K> GridView<K>
where
    K: Clone + PartialEq + std::fmt::Debug + 'static,
{
    /// Create the grid root under `parent` and install the dropdown
    /// dismissal listener on the document root.
    pub fn new(
        doc: &mut Document,
        parent: NodeId,
        outbox: Outbox<GridMsg<K>>,
        texts: GridTexts,
    ) -> Result<Self, DomError> {
        let root = doc.create_element("div");
        doc.set_attr(root, "class", "gridmux-grid");
        doc.append_child(parent, root)?;

        let open_dropdown: Rc<Cell<Option<NodeId>>> = Rc::new(Cell::new(None));
        let dropdown = Rc::clone(&open_dropdown);
        let tx = outbox.clone();
        doc.add_listener(
            doc.root(),
            EventKind::PointerDown,
            Phase::Capture,
            move |cx| {
                if let Some(open) = dropdown.get()
                    && !cx.path_contains(open)
                {
                    tx.push(GridMsg::DismissPicker);
                }
            },
        )?;

        let dropdown = Rc::clone(&open_dropdown);
        let tx = outbox.clone();
        doc.add_listener(doc.root(), EventKind::KeyDown, Phase::Capture, move |cx| {
            if dropdown.get().is_some() && cx.event().key.as_deref() == Some("Escape") {
                tx.push(GridMsg::DismissPicker);
            }
        })?;

        Ok(Self {
            root,
            cells: KeyedMount::new(root),
            views: FxHashMap::default(),
            empty_state: None,
            empty_state_view: Box::new(default_empty_state),
            open_dropdown,
            outbox,
            texts,
            applied: None,
        })
    }

    /// Replace the first-run view builder.
    #[must_use]
    pub fn with_empty_state(mut self, view: EmptyStateView) -> Self {
        self.empty_state_view = view;
        self
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&CellView<K>> {
        self.views.get(&index)
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub const fn empty_state(&self) -> Option<NodeId> {
        self.empty_state
    }

    /// Dropdown currently open in any cell.
    #[must_use]
    pub fn open_dropdown(&self) -> Option<NodeId> {
        self.open_dropdown.get()
    }

    #[must_use]
    pub const fn texts(&self) -> &GridTexts {
        &self.texts
    }

    /// Apply `plan`, mounting and unmounting cells as needed.
    pub fn apply(
        &mut self,
        doc: &mut Document,
        plan: &GridPlan<K>,
        sink: &mut dyn MountPointSink,
    ) -> Result<MountDelta<usize>, DomError> {
        let desired: Vec<usize> = (0..plan.cell_count()).collect();
        let mut hooks = CellHooks {
            views: &mut self.views,
            outbox: &self.outbox,
            sink,
        };
        let delta = self.cells.reconcile(doc, &desired, &mut hooks)?;

        match plan {
            GridPlan::EmptyState => {
                if self.empty_state.is_none() {
                    let node = (self.empty_state_view)(doc, &self.texts)?;
                    doc.append_child(self.root, node)?;
                    self.empty_state = Some(node);
                }
                doc.remove_attr(self.root, "data-rows");
                doc.remove_attr(self.root, "data-cols");
                doc.remove_attr(self.root, "grid-template-rows");
                doc.remove_attr(self.root, "grid-template-columns");
                self.applied = None;
            }
            GridPlan::Cells { layout, cells } => {
                if let Some(node) = self.empty_state.take() {
                    doc.release_subtree(node);
                }
                if self.applied != Some(*layout) {
                    doc.set_attr(self.root, "data-rows", layout.rows().to_string());
                    doc.set_attr(self.root, "data-cols", layout.cols().to_string());
                    doc.set_attr(self.root, "grid-template-rows", layout.template_rows());
                    doc.set_attr(self.root, "grid-template-columns", layout.template_columns());
                    self.applied = Some(*layout);
                }
                for cell in cells {
                    if let Some(view) = self.views.get_mut(&cell.index) {
                        view.apply(doc, cell, &self.outbox, &self.texts)?;
                    }
                }
            }
        }

        let open = self.views.values().find_map(CellView::dropdown);
        self.open_dropdown.set(open);
        if !delta.is_empty() {
            debug!(
                mounted = delta.mounted.len(),
                unmounted = delta.unmounted.len(),
                "grid cells changed"
            );
        }
        Ok(delta)
    }
}

struct CellHooks<'a, 's, K> {
    views: &'a mut FxHashMap<usize, CellView<K>>,
    outbox: &'a Outbox<GridMsg<K>>,
    sink: &'a mut (dyn MountPointSink + 's),
}

impl<K> MountHooks<usize> for CellHooks<'_, '_, K>
where
    K: Clone + PartialEq + std::fmt::Debug + 'static,
{
    fn create(&mut self, doc: &mut Document, index: &usize) -> Result<NodeId, DomError> {
        let view = CellView::build(doc, *index, self.outbox)?;
        let root = view.root();
        self.views.insert(*index, view);
        Ok(root)
    }

    fn mounted(&mut self, _doc: &mut Document, index: &usize, _node: NodeId) -> Result<(), DomError> {
        if let Some(view) = self.views.get(index) {
            self.sink.mount_point_attached(*index, view.mount_point());
        }
        Ok(())
    }

    fn before_unmount(&mut self, doc: &mut Document, index: &usize, _node: NodeId) {
        if let Some(view) = self.views.remove(index) {
            self.sink.mount_point_detaching(doc, *index, view.mount_point());
        }
    }
}
