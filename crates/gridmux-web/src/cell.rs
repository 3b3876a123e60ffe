#![forbid(unsafe_code)]

//! One grid cell: planning and retained application.
//!
//! [`plan_cell`] decides what a cell shows as plain data. [`CellView`]
//! applies a plan to the document. The view always carries a mount point,
//! hidden while the cell is empty, so the reconciler has a stable target for
//! the lifetime of the cell.
//!
//! Focus is wired on the cell root in the *capture* phase: panel content
//! inside the mount point is free to stop propagation of its own pointer
//! events and the cell still learns it was touched.

use gridmux_runtime::Outbox;

use crate::dom::{Document, DomError, NodeId};
use crate::event::{EventKind, Phase};

/// Interaction reported by grid cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridMsg<K> {
    /// Something inside the cell was pressed or focused.
    Focus(usize),
    /// The assign affordance of an empty cell was clicked.
    OpenPicker(usize),
    /// A press landed outside the open dropdown.
    DismissPicker,
    /// A session was picked for the cell. Also focuses it.
    Assign(usize, K),
    /// The remove-from-pane control was clicked.
    Clear(usize),
}

/// User-facing strings rendered by cells and the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridTexts {
    pub assign: String,
    pub hint: String,
    pub remove: String,
    pub empty_state: String,
}

impl Default for GridTexts {
    fn default() -> Self {
        Self {
            assign: "Assign session".into(),
            hint: "Open a session to place it here".into(),
            remove: "Remove from pane".into(),
            empty_state: "No sessions open".into(),
        }
    }
}

/// Entry in an empty cell's session dropdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOption<K> {
    pub key: K,
    pub label: String,
}

/// What a cell shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellContent<K> {
    /// Empty, sessions exist: assign affordance, dropdown when `open`.
    Picker {
        options: Vec<PickerOption<K>>,
        open: bool,
    },
    /// Empty, nothing to place.
    Hint,
    /// Occupied by `key`; the panel itself is placed by the reconciler.
    Mounted { key: K },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPlan<K> {
    pub index: usize,
    pub focused: bool,
    pub content: CellContent<K>,
}

/// Plan one cell.
pub fn plan_cell<K: Clone, S>(
    index: usize,
    focused: bool,
    assigned: Option<&K>,
    sessions: &[S],
    key_of: &dyn Fn(&S) -> K,
    label_of: &dyn Fn(&S) -> String,
    picker_open: bool,
) -> CellPlan<K> {
    let content = match assigned {
        Some(key) => CellContent::Mounted { key: key.clone() },
        None if sessions.is_empty() => CellContent::Hint,
        None => CellContent::Picker {
            options: sessions
                .iter()
                .map(|session| PickerOption {
                    key: key_of(session),
                    label: label_of(session),
                })
                .collect(),
            open: picker_open,
        },
    };
    CellPlan {
        index,
        focused,
        content,
    }
}

/// Retained nodes of one cell.
#[derive(Debug)]
pub struct CellView<K> {
    index: usize,
    root: NodeId,
    mount_point: NodeId,
    chrome: Option<NodeId>,
    assign_button: Option<NodeId>,
    dropdown: Option<NodeId>,
    options: Vec<(K, NodeId)>,
    remove_button: Option<NodeId>,
    plan: Option<CellPlan<K>>,
}

impl<K> CellView<K>
where
    K: Clone + PartialEq + std::fmt::Debug + 'static,
{
    /// Build the cell root and its mount point. The caller attaches the root.
    pub fn build(
        doc: &mut Document,
        index: usize,
        outbox: &Outbox<GridMsg<K>>,
    ) -> Result<Self, DomError> {
        let root = doc.create_element("div");
        doc.set_attr(root, "class", "gridmux-cell");
        doc.set_attr(root, "data-cell", index.to_string());
        for kind in [EventKind::PointerDown, EventKind::FocusIn, EventKind::KeyDown] {
            let outbox = outbox.clone();
            doc.add_listener(root, kind, Phase::Capture, move |_| {
                outbox.push(GridMsg::Focus(index));
            })?;
        }

        let mount_point = doc.create_element("div");
        doc.set_attr(mount_point, "class", "gridmux-mount-point");
        doc.set_hidden(mount_point, true);
        doc.append_child(root, mount_point)?;

        Ok(Self {
            index,
            root,
            mount_point,
            chrome: None,
            assign_button: None,
            dropdown: None,
            options: Vec::new(),
            remove_button: None,
            plan: None,
        })
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub const fn mount_point(&self) -> NodeId {
        self.mount_point
    }

    #[must_use]
    pub const fn assign_button(&self) -> Option<NodeId> {
        self.assign_button
    }

    /// The open dropdown, if any.
    #[must_use]
    pub const fn dropdown(&self) -> Option<NodeId> {
        self.dropdown
    }

    /// Dropdown option node for `key`.
    #[must_use]
    pub fn option(&self, key: &K) -> Option<NodeId> {
        self.options
            .iter()
            .find_map(|(k, node)| (k == key).then_some(*node))
    }

    #[must_use]
    pub const fn remove_button(&self) -> Option<NodeId> {
        self.remove_button
    }

    #[must_use]
    pub fn plan(&self) -> Option<&CellPlan<K>> {
        self.plan.as_ref()
    }

    /// Apply `plan`. Returns `false` when it matches the applied plan.
    pub fn apply(
        &mut self,
        doc: &mut Document,
        plan: &CellPlan<K>,
        outbox: &Outbox<GridMsg<K>>,
        texts: &GridTexts,
    ) -> Result<bool, DomError> {
        if self.plan.as_ref() == Some(plan) {
            return Ok(false);
        }

        if plan.focused {
            doc.set_attr(self.root, "data-focused", "true");
        } else {
            doc.remove_attr(self.root, "data-focused");
        }

        let content_changed = self
            .plan
            .as_ref()
            .is_none_or(|applied| applied.content != plan.content);
        if content_changed {
            self.rebuild_chrome(doc, &plan.content, outbox, texts)?;
        }
        self.plan = Some(plan.clone());
        Ok(true)
    }

    fn rebuild_chrome(
        &mut self,
        doc: &mut Document,
        content: &CellContent<K>,
        outbox: &Outbox<GridMsg<K>>,
        texts: &GridTexts,
    ) -> Result<(), DomError> {
        if let Some(chrome) = self.chrome.take() {
            doc.release_subtree(chrome);
        }
        self.assign_button = None;
        self.dropdown = None;
        self.options.clear();
        self.remove_button = None;

        let index = self.index;
        let chrome = doc.create_element("div");
        match content {
            CellContent::Picker { options, open } => {
                doc.set_attr(chrome, "class", "gridmux-picker");
                let assign = button(doc, chrome, &texts.assign)?;
                let tx = outbox.clone();
                doc.add_listener(assign, EventKind::Click, Phase::Bubble, move |_| {
                    tx.push(GridMsg::OpenPicker(index));
                })?;
                self.assign_button = Some(assign);

                if *open {
                    let dropdown = doc.create_element("ul");
                    doc.set_attr(dropdown, "class", "gridmux-dropdown");
                    doc.append_child(chrome, dropdown)?;
                    for option in options {
                        let item = button(doc, dropdown, &option.label)?;
                        let tx = outbox.clone();
                        let key = option.key.clone();
                        doc.add_listener(item, EventKind::Click, Phase::Bubble, move |_| {
                            tx.push(GridMsg::Assign(index, key.clone()));
                        })?;
                        self.options.push((option.key.clone(), item));
                    }
                    self.dropdown = Some(dropdown);
                }
            }
            CellContent::Hint => {
                doc.set_attr(chrome, "class", "gridmux-hint");
                let text = doc.create_text(texts.hint.as_str());
                doc.append_child(chrome, text)?;
            }
            CellContent::Mounted { .. } => {
                doc.set_attr(chrome, "class", "gridmux-cell-toolbar");
                let remove = button(doc, chrome, &texts.remove)?;
                let tx = outbox.clone();
                doc.add_listener(remove, EventKind::Click, Phase::Bubble, move |_| {
                    tx.push(GridMsg::Clear(index));
                })?;
                self.remove_button = Some(remove);
            }
        }
        doc.append_child(self.root, chrome)?;
        self.chrome = Some(chrome);

        let occupied = matches!(content, CellContent::Mounted { .. });
        doc.set_hidden(self.mount_point, !occupied);
        Ok(())
    }
}

fn button(doc: &mut Document, parent: NodeId, label: &str) -> Result<NodeId, DomError> {
    let node = doc.create_element("button");
    let text = doc.create_text(label);
    doc.append_child(node, text)?;
    doc.append_child(parent, node)?;
    Ok(node)
}
