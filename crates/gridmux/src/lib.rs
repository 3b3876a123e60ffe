#![forbid(unsafe_code)]

//! gridmux: many live sessions, one N×M grid.
//!
//! A [`Dashboard`] tracks which open session is shown in which grid cell and
//! keeps every session's panel alive across any rearrangement. Sessions are
//! opened and closed by the embedding application; gridmux only decides
//! *where* they are displayed.
//!
//! # Crates
//!
//! - [`layout`]: layout descriptors, presets, and the assignment store.
//! - [`runtime`]: commit, frame, and message scheduling.
//! - [`web`]: the retained node tree, grid renderers, and the panel pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use gridmux::{Dashboard, DashboardConfig, LayoutPreset};
//!
//! let mut dash = Dashboard::new(DashboardConfig::default())?;
//! dash.open_session("ssh:prod-1", "prod-1", terminal_factory())?;
//! dash.open_session("ssh:prod-2", "prod-2", terminal_factory())?;
//! dash.apply_preset(LayoutPreset::Columns2)?;
//! dash.close_session(&"ssh:prod-2")?;
//! ```

pub mod config;
pub mod dashboard;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use config::{ConfigError, DashboardConfig, LayoutSpec};
pub use dashboard::{CellSnapshot, Dashboard, DashboardSnapshot};

pub use gridmux_layout as layout;
pub use gridmux_runtime as runtime;
pub use gridmux_web as web;

pub use gridmux_layout::{
    FocusDirection, GridAssignmentStore, GridLayout, LayoutError, LayoutPreset, Rect, Size,
};
pub use gridmux_web::{
    Document, DomError, Event, EventKind, NodeId, Panel, PanelContext, PanelFactory, Phase,
    ReconcileReport,
};

/// Errors surfaced by the facade.
#[derive(Debug)]
pub enum Error {
    /// The node tree refused a structural operation.
    Dom(DomError),
    /// A layout could not be built.
    Layout(LayoutError),
    /// Configuration failed to load or validate.
    Config(ConfigError),
    /// A snapshot could not be serialized.
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dom(e) => write!(f, "document error: {e}"),
            Self::Layout(e) => write!(f, "layout error: {e}"),
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dom(e) => Some(e),
            Self::Layout(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

impl From<DomError> for Error {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

impl From<LayoutError> for Error {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
