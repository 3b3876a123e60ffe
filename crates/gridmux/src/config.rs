#![forbid(unsafe_code)]

//! Dashboard configuration as data.
//!
//! Everything tunable about a [`Dashboard`](crate::Dashboard) lives in one
//! [`DashboardConfig`] that can be loaded from TOML or JSON at startup.
//!
//! ```toml
//! # gridmux.toml
//! initial_layout = "grid2x2"
//! presets = ["single", "columns2", "grid2x2"]
//! max_tracks = 4
//! resize_debounce = true
//! empty_state_text = "Connect to a device to get started"
//! ```
//!
//! `initial_layout` also accepts explicit dimensions:
//! `initial_layout = { rows = 2, cols = 3 }`.
//!
//! Every field has a default, so an empty document is a valid config.

use std::path::Path;

use gridmux_layout::{GridLayout, LayoutError, LayoutPreset, MAX_TRACKS};
use gridmux_web::GridTexts;
use serde::{Deserialize, Serialize};

/// Starting layout: a preset name or explicit dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutSpec {
    Preset(LayoutPreset),
    Custom { rows: u16, cols: u16 },
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self::Preset(LayoutPreset::Single)
    }
}

impl LayoutSpec {
    /// Resolve to a layout no larger than `max_tracks` in either direction.
    pub fn resolve(self, max_tracks: u16) -> Result<GridLayout, LayoutError> {
        let (rows, cols) = match self {
            Self::Preset(preset) => {
                let layout = preset.layout();
                (layout.rows(), layout.cols())
            }
            Self::Custom { rows, cols } => (rows, cols),
        };
        GridLayout::with_max_tracks(rows, cols, max_tracks)
    }
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Layout the grid starts in.
    pub initial_layout: LayoutSpec,

    /// Presets offered by the layout picker, in display order.
    ///
    /// `Dashboard::apply_preset` rejects presets missing from this list.
    pub presets: Vec<LayoutPreset>,

    /// Largest row or column count accepted for custom layouts.
    pub max_tracks: u16,

    /// Coalesce bursts of container resizes into one notification per frame.
    pub resize_debounce: bool,

    /// Text of the first-run view shown while nothing is open.
    pub empty_state_text: String,

    /// Text of empty cells when there is nothing to place.
    pub unassigned_hint_text: String,

    /// Label of the assign affordance in empty cells.
    pub assign_label: String,

    /// Label of the remove-from-pane control in occupied cells.
    pub remove_label: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let texts = GridTexts::default();
        Self {
            initial_layout: LayoutSpec::default(),
            presets: LayoutPreset::ALL.to_vec(),
            max_tracks: MAX_TRACKS,
            resize_debounce: true,
            empty_state_text: texts.empty_state,
            unassigned_hint_text: texts.hint,
            assign_label: texts.assign,
            remove_label: texts.remove,
        }
    }
}

impl DashboardConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSer)
    }

    /// Check every field, returning all violations (empty when valid).
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_tracks == 0 || self.max_tracks > MAX_TRACKS {
            errors.push(format!(
                "max_tracks must be in 1..={MAX_TRACKS}, got {}",
                self.max_tracks
            ));
        }

        if let Err(err) = self.initial_layout.resolve(self.max_tracks) {
            errors.push(format!("initial_layout: {err}"));
        }

        if self.presets.is_empty() {
            errors.push("presets must not be empty".into());
        }
        for preset in &self.presets {
            let layout = preset.layout();
            if layout.rows() > self.max_tracks || layout.cols() > self.max_tracks {
                errors.push(format!(
                    "preset {} ({layout}) exceeds max_tracks {}",
                    preset.name(),
                    self.max_tracks
                ));
            }
        }

        for (field, text) in [
            ("empty_state_text", &self.empty_state_text),
            ("unassigned_hint_text", &self.unassigned_hint_text),
            ("assign_label", &self.assign_label),
            ("remove_label", &self.remove_label),
        ] {
            if text.trim().is_empty() {
                errors.push(format!("{field} must not be blank"));
            }
        }

        errors
    }

    /// The validated starting layout.
    pub fn layout(&self) -> Result<GridLayout, ConfigError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        self.initial_layout
            .resolve(self.max_tracks)
            .map_err(|err| ConfigError::Validation(vec![err.to_string()]))
    }

    /// Strings handed to the grid renderer.
    #[must_use]
    pub fn texts(&self) -> GridTexts {
        GridTexts {
            assign: self.assign_label.clone(),
            hint: self.unassigned_hint_text.clone(),
            remove: self.remove_label.clone(),
            empty_state: self.empty_state_text.clone(),
        }
    }
}

/// Errors from loading or validating a [`DashboardConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// TOML serialization error.
    TomlSer(toml::ser::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::TomlSer(e) => write!(f, "TOML serialization error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::TomlSer(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_is_valid() {
        let config = DashboardConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.layout().unwrap(), GridLayout::SINGLE);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(
            DashboardConfig::from_toml_str("").unwrap(),
            DashboardConfig::default()
        );
    }

    #[test]
    fn preset_name_parses() {
        let config = DashboardConfig::from_toml_str("initial_layout = \"grid2x3\"").unwrap();
        assert_eq!(config.initial_layout, LayoutSpec::Preset(LayoutPreset::Grid2x3));
        assert_eq!(config.layout().unwrap(), GridLayout::new(2, 3).unwrap());
    }

    #[test]
    fn custom_dimensions_parse() {
        let config =
            DashboardConfig::from_toml_str("initial_layout = { rows = 3, cols = 1 }").unwrap();
        assert_eq!(config.initial_layout, LayoutSpec::Custom { rows: 3, cols: 1 });
    }

    #[test]
    fn json_partial_overrides() {
        let config = DashboardConfig::from_json_str(
            r#"{"resize_debounce": false, "presets": ["single", "columns2"]}"#,
        )
        .unwrap();
        assert!(!config.resize_debounce);
        assert_eq!(config.presets, vec![LayoutPreset::Single, LayoutPreset::Columns2]);
        assert_eq!(config.max_tracks, MAX_TRACKS);
    }

    #[test]
    fn unknown_preset_is_a_parse_error() {
        let err = DashboardConfig::from_toml_str("initial_layout = \"grid9x9\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn validate_collects_every_violation() {
        let config = DashboardConfig {
            initial_layout: LayoutSpec::Custom { rows: 0, cols: 2 },
            presets: vec![LayoutPreset::Grid3x3],
            max_tracks: 2,
            empty_state_text: "  ".into(),
            ..DashboardConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors[0].starts_with("initial_layout"));
        assert!(errors[1].contains("grid3x3"));
        assert!(errors[2].contains("empty_state_text"));
        assert!(matches!(config.layout(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn toml_roundtrip_preserves_custom_layout() {
        let config = DashboardConfig {
            initial_layout: LayoutSpec::Custom { rows: 2, cols: 4 },
            ..DashboardConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(DashboardConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn file_loaders_read_disk() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("gridmux.toml");
        std::fs::write(&toml_path, "max_tracks = 4\n").unwrap();
        assert_eq!(DashboardConfig::from_toml_file(&toml_path).unwrap().max_tracks, 4);

        let json_path = dir.path().join("gridmux.json");
        std::fs::write(&json_path, r#"{"max_tracks": 3}"#).unwrap();
        assert_eq!(DashboardConfig::from_json_file(&json_path).unwrap().max_tracks, 3);

        let missing = DashboardConfig::from_toml_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
