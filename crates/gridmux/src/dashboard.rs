#![forbid(unsafe_code)]

//! The dashboard: store, grid, pool and reconciler behind one handle.
//!
//! # Commit model
//!
//! Every mutation updates the assignment store and then requests a commit.
//! A commit first renders the declarative tree (grid cells and the panel
//! pool), then drains the post-commit effects, the main one being the
//! reconciliation pass that moves panel wrappers into their cells. The
//! reconciler therefore always sees the latest committed assignments and
//! mount points that exist for the current layout.
//!
//! Inside [`Dashboard::batch`], commits are held back until the outermost
//! batch closes, so a burst of mutations costs one render and one pass.
//!
//! # Closing sessions
//!
//! [`Dashboard::close_session`] evicts the key with the remaining open
//! sessions as fallback *before* the pool tears the panel down, so a cell
//! never shows the empty picker while other sessions are still open.

use std::hash::Hash;

use gridmux_layout::{
    FocusDirection, GridAssignmentStore, GridLayout, LayoutError, LayoutPreset, Rect, Size,
};
use gridmux_runtime::{CommitScheduler, FrameClock, FrameScheduler, Outbox};
use gridmux_web::{
    CellView, DispatchOutcome, Document, EmptyStateView, Event, GridMsg, GridProps, GridView,
    NodeId, PanelFactory, PanelPool, PanelReconciler, ReconcileReport, ResizeHub, plan_grid,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use web_time::Duration;

use crate::Error;
use crate::config::DashboardConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitEffect {
    Reconcile,
    ReportSizes,
}

#[derive(Debug, Clone)]
struct SessionEntry<K> {
    key: K,
    label: String,
}

/// One cell in a [`DashboardSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellSnapshot {
    pub index: usize,
    /// Label of the session shown in the cell.
    pub session: Option<String>,
    pub focused: bool,
}

/// Serializable view of the dashboard state, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub layout: GridLayout,
    pub preset: Option<LayoutPreset>,
    pub cells: Vec<CellSnapshot>,
    pub focused_cell: usize,
    /// Labels of open sessions, in open order.
    pub open_sessions: Vec<String>,
    /// Labels of open sessions not shown in any cell.
    pub unplaced_sessions: Vec<String>,
    pub version: u64,
    pub commits: u64,
}

impl DashboardSnapshot {
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Multiplexes open sessions onto an N×M grid.
pub struct Dashboard<K> {
    doc: Document,
    host: NodeId,
    store: GridAssignmentStore<K>,
    sessions: Vec<SessionEntry<K>>,
    grid: GridView<K>,
    pool: PanelPool<K>,
    reconciler: PanelReconciler<K>,
    resize: ResizeHub,
    frames: FrameScheduler<Document>,
    clock: FrameClock,
    effects: CommitScheduler<CommitEffect>,
    outbox: Outbox<GridMsg<K>>,
    open_picker: Option<usize>,
    viewport: Option<Rect>,
    last_report: ReconcileReport,
    config: DashboardConfig,
}

impl<K: Clone + Eq + std::fmt::Debug> std::fmt::Debug for Dashboard<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("layout", &self.store.layout())
            .field("assignments", &self.store.assignments())
            .field("focused_cell", &self.store.focused_cell())
            .field("sessions", &self.sessions.len())
            .field("open_picker", &self.open_picker)
            .field("last_report", &self.last_report)
            .finish_non_exhaustive()
    }
}

impl<K> Dashboard<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug + 'static,
{
    /// Build a dashboard and render its initial (empty) grid.
    pub fn new(config: DashboardConfig) -> Result<Self, Error> {
        Self::build(config, None)
    }

    /// Like [`new`](Self::new), with a custom first-run view.
    pub fn with_empty_state(config: DashboardConfig, view: EmptyStateView) -> Result<Self, Error> {
        Self::build(config, Some(view))
    }

    fn build(config: DashboardConfig, empty_state: Option<EmptyStateView>) -> Result<Self, Error> {
        let layout = config.layout()?;
        let mut doc = Document::new();
        let host = doc.create_element("div");
        doc.set_attr(host, "class", "gridmux-dashboard");
        let body = doc.root();
        doc.append_child(body, host)?;

        let outbox = Outbox::new();
        let mut grid = GridView::new(&mut doc, host, outbox.clone(), config.texts())?;
        if let Some(view) = empty_state {
            grid = grid.with_empty_state(view);
        }
        let pool = PanelPool::new(&mut doc, host)?;
        let reconciler = PanelReconciler::new(pool.container());
        let frames = FrameScheduler::new();
        let resize = ResizeHub::new(frames.clone(), config.resize_debounce);

        let mut dashboard = Self {
            doc,
            host,
            store: GridAssignmentStore::new(layout),
            sessions: Vec::new(),
            grid,
            pool,
            reconciler,
            resize,
            frames,
            clock: FrameClock::new(),
            effects: CommitScheduler::new(),
            outbox,
            open_picker: None,
            viewport: None,
            last_report: ReconcileReport::default(),
            config,
        };
        dashboard.request_commit()?;
        info!(%layout, "dashboard created");
        Ok(dashboard)
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    /// Register a newly opened session and make it visible.
    ///
    /// Returns `false` (and changes nothing) if `key` is already open.
    pub fn open_session(
        &mut self,
        key: K,
        label: impl Into<String>,
        factory: PanelFactory<K>,
    ) -> Result<bool, Error> {
        if !self.pool.register(key.clone(), factory) {
            return Ok(false);
        }
        let label = label.into();
        self.sessions.push(SessionEntry {
            key: key.clone(),
            label,
        });
        let cell = self.store.auto_place(key.clone());
        info!(key = ?key, cell, "session opened");
        self.request_commit()?;
        Ok(true)
    }

    /// Close `key`: refill its cell from the remaining sessions, then tear
    /// its panel down.
    pub fn close_session(&mut self, key: &K) -> Result<bool, Error> {
        if !self.pool.is_open(key) {
            warn!(key = ?key, "close of unknown session ignored");
            return Ok(false);
        }
        let fallback: Vec<K> = self
            .sessions
            .iter()
            .filter(|s| &s.key != key)
            .map(|s| s.key.clone())
            .collect();
        let vacated = self.store.evict_key_with_fallback(key, &fallback);
        self.pool.unregister(key);
        self.sessions.retain(|s| &s.key != key);
        info!(key = ?key, vacated = ?vacated, "session closed");
        self.request_commit()?;
        Ok(true)
    }

    #[must_use]
    pub fn is_open(&self, key: &K) -> bool {
        self.pool.is_open(key)
    }

    /// Open keys in open order.
    #[must_use]
    pub fn open_keys(&self) -> Vec<K> {
        self.sessions.iter().map(|s| s.key.clone()).collect()
    }

    #[must_use]
    pub fn label(&self, key: &K) -> Option<&str> {
        self.sessions
            .iter()
            .find(|s| &s.key == key)
            .map(|s| s.label.as_str())
    }

    // ---------------------------------------------------------------------
    // Layout and cells
    // ---------------------------------------------------------------------

    /// Switch layouts. Cells that survive keep their sessions; the rest
    /// become unplaced, never closed.
    pub fn set_layout(&mut self, layout: GridLayout) -> Result<(), Error> {
        let max = self.config.max_tracks;
        if layout.rows() > max || layout.cols() > max {
            return Err(LayoutError::TooManyTracks {
                rows: layout.rows(),
                cols: layout.cols(),
                max,
            }
            .into());
        }
        self.store.set_layout(layout);
        if self.open_picker.is_some_and(|index| !layout.contains(index)) {
            self.open_picker = None;
        }
        self.effects.schedule(CommitEffect::ReportSizes);
        self.request_commit()
    }

    /// Switch to one of the configured presets.
    ///
    /// Presets missing from [`DashboardConfig::presets`] are rejected with
    /// [`LayoutError::UnknownPreset`]; use [`set_layout`](Self::set_layout)
    /// for arbitrary layouts.
    pub fn apply_preset(&mut self, preset: LayoutPreset) -> Result<(), Error> {
        if !self.config.presets.contains(&preset) {
            warn!(preset = preset.name(), "preset not offered by this dashboard");
            return Err(LayoutError::UnknownPreset(preset.name().to_owned()).into());
        }
        self.set_layout(preset.layout())
    }

    /// Presets offered to the layout picker, in display order.
    #[must_use]
    pub fn presets(&self) -> &[LayoutPreset] {
        &self.config.presets
    }

    /// Switch to a custom `rows × cols` layout.
    pub fn resize_grid(&mut self, rows: u16, cols: u16) -> Result<(), Error> {
        let layout = GridLayout::with_max_tracks(rows, cols, self.config.max_tracks)?;
        self.set_layout(layout)
    }

    /// Show `key` in `index`, or clear the cell with `None`.
    ///
    /// Out-of-range cells and unknown keys are ignored.
    pub fn assign_cell(&mut self, index: usize, key: Option<K>) -> Result<bool, Error> {
        if !self.store.layout().contains(index) {
            warn!(index, layout = %self.store.layout(), "assign to nonexistent cell ignored");
            return Ok(false);
        }
        if let Some(key) = &key
            && !self.pool.is_open(key)
        {
            warn!(index, key = ?key, "assign of unknown session ignored");
            return Ok(false);
        }
        let changed = self.store.assign_cell(index, key);
        if changed {
            self.request_commit()?;
        }
        Ok(changed)
    }

    pub fn clear_cell(&mut self, index: usize) -> Result<bool, Error> {
        self.assign_cell(index, None)
    }

    pub fn focus_cell(&mut self, index: usize) -> Result<bool, Error> {
        if !self.store.layout().contains(index) {
            warn!(index, "focus of nonexistent cell ignored");
            return Ok(false);
        }
        if self.store.focused_cell() == index {
            return Ok(false);
        }
        self.store.set_focused_cell(index);
        self.request_commit()?;
        Ok(true)
    }

    pub fn move_focus(&mut self, direction: FocusDirection) -> Result<usize, Error> {
        let before = self.store.focused_cell();
        let after = self.store.move_focus(direction);
        if after != before {
            self.request_commit()?;
        }
        Ok(after)
    }

    pub fn swap_cells(&mut self, a: usize, b: usize) -> Result<bool, Error> {
        let changed = self.store.swap_cells(a, b);
        if changed {
            self.request_commit()?;
        }
        Ok(changed)
    }

    // ---------------------------------------------------------------------
    // Host input
    // ---------------------------------------------------------------------

    /// Dispatch host input at `target` and apply what the grid reported.
    pub fn dispatch_event(&mut self, target: NodeId, event: &Event) -> Result<DispatchOutcome, Error> {
        let outcome = self.doc.dispatch(target, event)?;
        let messages = self.outbox.drain();
        if !messages.is_empty() {
            self.batch(|dash| {
                let mut first_err = None;
                for message in messages {
                    if let Err(err) = dash.apply_message(message) {
                        warn!(%err, "grid message failed");
                        first_err.get_or_insert(err);
                    }
                }
                first_err.map_or(Ok(()), Err)
            })??;
        }
        Ok(outcome)
    }

    fn apply_message(&mut self, message: GridMsg<K>) -> Result<(), Error> {
        debug!(message = ?message, "grid message");
        match message {
            GridMsg::Focus(index) => {
                self.focus_cell(index)?;
            }
            GridMsg::OpenPicker(index) => {
                let layout = self.store.layout();
                if layout.contains(index) && self.store.assignment(index).is_none() {
                    self.open_picker = Some(index);
                    self.request_commit()?;
                }
            }
            GridMsg::DismissPicker => {
                if self.open_picker.take().is_some() {
                    self.request_commit()?;
                }
            }
            GridMsg::Assign(index, key) => {
                self.open_picker = None;
                self.assign_cell(index, Some(key))?;
                self.focus_cell(index)?;
                self.request_commit()?;
            }
            GridMsg::Clear(index) => {
                self.clear_cell(index)?;
            }
        }
        Ok(())
    }

    /// Lay the grid out in `viewport` and report cell sizes to the resize
    /// observers.
    pub fn set_viewport(&mut self, viewport: Rect) -> Result<(), Error> {
        self.viewport = Some(viewport);
        self.doc.set_size(self.host, viewport.size());
        self.effects.schedule(CommitEffect::ReportSizes);
        self.request_commit()
    }

    /// Report a laid-out element size measured by the host.
    pub fn record_size(&mut self, node: NodeId, size: Size) -> bool {
        self.resize.record_size(&mut self.doc, node, size)
    }

    /// Advance the frame clock to `now` and run due frame callbacks.
    pub fn run_frame(&mut self, now: Duration) -> usize {
        self.clock.set(now);
        self.frames.run_frame(&mut self.doc, self.clock.now())
    }

    // ---------------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------------

    /// Run `f` with commits held back; commit once when the outermost batch
    /// closes.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, Error> {
        self.effects.begin_batch();
        let out = f(self);
        if self.effects.end_batch() && self.effects.pending_count() > 0 {
            self.commit()?;
        }
        Ok(out)
    }

    fn request_commit(&mut self) -> Result<(), Error> {
        self.effects.schedule(CommitEffect::Reconcile);
        if self.effects.is_batching() {
            return Ok(());
        }
        self.commit()
    }

    /// Render the grid and the pool, then run post-commit effects.
    pub fn commit(&mut self) -> Result<(), Error> {
        self.render()?;

        let doc = &mut self.doc;
        let reconciler = &mut self.reconciler;
        let resize = &mut self.resize;
        let store = &self.store;
        let grid = &self.grid;
        let viewport = self.viewport;
        let last_report = &mut self.last_report;
        self.effects.run_effects(|effect| match effect {
            CommitEffect::Reconcile => {
                *last_report = reconciler.reconcile(doc, store.assignments());
            }
            CommitEffect::ReportSizes => {
                report_sizes(doc, grid, resize, store.layout(), viewport);
            }
        });
        Ok(())
    }

    fn render(&mut self) -> Result<(), Error> {
        // A dropdown only stays open over a cell that is still empty.
        if self
            .open_picker
            .is_some_and(|index| self.store.assignment(index).is_some())
        {
            self.open_picker = None;
        }
        let props = GridProps {
            layout: self.store.layout(),
            assignments: self.store.assignments(),
            sessions: &self.sessions,
            key_of: &|s: &SessionEntry<K>| s.key.clone(),
            label_of: &|s: &SessionEntry<K>| s.label.clone(),
            focused_cell: self.store.focused_cell(),
            open_picker: self.open_picker,
        };
        let plan = plan_grid(&props);
        let cells = self.grid.apply(&mut self.doc, &plan, &mut self.reconciler)?;
        self.pool
            .sync(&mut self.doc, &self.frames, &mut self.reconciler)?;

        let mount_points: Vec<NodeId> = (0..self.grid.cell_count())
            .filter_map(|index| self.grid.cell(index).map(CellView::mount_point))
            .collect();
        self.resize.sync(&mount_points);
        if !cells.mounted.is_empty() && self.viewport.is_some() {
            self.effects.schedule(CommitEffect::ReportSizes);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.doc
    }

    /// The dashboard's top-level node.
    #[must_use]
    pub const fn host(&self) -> NodeId {
        self.host
    }

    #[must_use]
    pub const fn store(&self) -> &GridAssignmentStore<K> {
        &self.store
    }

    #[must_use]
    pub const fn layout(&self) -> GridLayout {
        self.store.layout()
    }

    #[must_use]
    pub fn assignments(&self) -> &[Option<K>] {
        self.store.assignments()
    }

    #[must_use]
    pub const fn focused_cell(&self) -> usize {
        self.store.focused_cell()
    }

    /// Cell whose session dropdown is open.
    #[must_use]
    pub const fn open_picker(&self) -> Option<usize> {
        self.open_picker
    }

    #[must_use]
    pub const fn grid(&self) -> &GridView<K> {
        &self.grid
    }

    #[must_use]
    pub const fn pool(&self) -> &PanelPool<K> {
        &self.pool
    }

    #[must_use]
    pub const fn reconciler(&self) -> &PanelReconciler<K> {
        &self.reconciler
    }

    /// Persistent wrapper node of an open session.
    #[must_use]
    pub fn wrapper(&self, key: &K) -> Option<NodeId> {
        self.pool.wrapper(key)
    }

    /// Mount point of cell `index`.
    #[must_use]
    pub fn mount_point(&self, index: usize) -> Option<NodeId> {
        self.grid.cell(index).map(CellView::mount_point)
    }

    /// Report from the most recent reconciliation pass.
    #[must_use]
    pub const fn last_report(&self) -> ReconcileReport {
        self.last_report
    }

    #[must_use]
    pub const fn commit_count(&self) -> u64 {
        self.effects.commit_count()
    }

    #[must_use]
    pub const fn frames(&self) -> &FrameScheduler<Document> {
        &self.frames
    }

    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        let label = |key: &K| {
            self.label(key)
                .map_or_else(|| format!("{key:?}"), str::to_owned)
        };
        let layout = self.store.layout();
        let focused_cell = self.store.focused_cell();
        DashboardSnapshot {
            layout,
            preset: LayoutPreset::for_layout(layout),
            cells: self
                .store
                .assignments()
                .iter()
                .enumerate()
                .map(|(index, slot)| CellSnapshot {
                    index,
                    session: slot.as_ref().map(label),
                    focused: index == focused_cell,
                })
                .collect(),
            focused_cell,
            open_sessions: self.sessions.iter().map(|s| s.label.clone()).collect(),
            unplaced_sessions: self
                .sessions
                .iter()
                .filter(|s| !self.store.is_placed(&s.key))
                .map(|s| s.label.clone())
                .collect(),
            version: self.store.version(),
            commits: self.effects.commit_count(),
        }
    }
}

fn report_sizes<K>(
    doc: &mut Document,
    grid: &GridView<K>,
    resize: &mut ResizeHub,
    layout: GridLayout,
    viewport: Option<Rect>,
) where
    K: Clone + PartialEq + std::fmt::Debug + 'static,
{
    let Some(viewport) = viewport else {
        return;
    };
    doc.set_size(grid.root(), viewport.size());
    let area = Rect::from_size(viewport.width, viewport.height);
    for (index, rect) in layout.cell_rects(area).into_iter().enumerate() {
        if let Some(cell) = grid.cell(index) {
            resize.record_size(doc, cell.mount_point(), rect.size());
        }
    }
}
