#![forbid(unsafe_code)]

//! Grid layout descriptors and the cell assignment store.
//!
//! A [`GridLayout`] is a plain `rows × cols` value. Cells are identified by
//! their flat index `row * cols + col`; nothing else about a cell is named.
//! The [`assignment`] module holds the state machine that maps those cells to
//! caller-owned session keys.

pub mod assignment;
pub mod geometry;

pub use assignment::GridAssignmentStore;
pub use geometry::{Rect, Size};

use serde::{Deserialize, Serialize};

/// Upper bound on rows or columns accepted by [`GridLayout::new`].
pub const MAX_TRACKS: u16 = 8;

/// Errors from layout construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A layout needs at least one row and one column.
    ZeroTracks { rows: u16, cols: u16 },
    /// Rows or columns exceed the configured maximum.
    TooManyTracks { rows: u16, cols: u16, max: u16 },
    /// Preset name did not match any known preset.
    UnknownPreset(String),
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroTracks { rows, cols } => {
                write!(f, "layout {rows}x{cols} must have at least one row and column")
            }
            Self::TooManyTracks { rows, cols, max } => {
                write!(f, "layout {rows}x{cols} exceeds the {max}-track limit")
            }
            Self::UnknownPreset(name) => write!(f, "unknown layout preset: {name:?}"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Grid dimensions. Immutable; replaced wholesale on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLayout", into = "RawLayout")]
pub struct GridLayout {
    rows: u16,
    cols: u16,
}

#[derive(Serialize, Deserialize)]
struct RawLayout {
    rows: u16,
    cols: u16,
}

impl TryFrom<RawLayout> for GridLayout {
    type Error = LayoutError;

    fn try_from(raw: RawLayout) -> Result<Self, Self::Error> {
        Self::new(raw.rows, raw.cols)
    }
}

impl From<GridLayout> for RawLayout {
    fn from(layout: GridLayout) -> Self {
        Self {
            rows: layout.rows,
            cols: layout.cols,
        }
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::SINGLE
    }
}

impl GridLayout {
    /// The degenerate one-cell layout.
    pub const SINGLE: Self = Self { rows: 1, cols: 1 };

    /// Create a layout, validating against [`MAX_TRACKS`].
    pub fn new(rows: u16, cols: u16) -> Result<Self, LayoutError> {
        Self::with_max_tracks(rows, cols, MAX_TRACKS)
    }

    /// Create a layout with a caller-chosen track limit.
    pub fn with_max_tracks(rows: u16, cols: u16, max: u16) -> Result<Self, LayoutError> {
        if rows == 0 || cols == 0 {
            return Err(LayoutError::ZeroTracks { rows, cols });
        }
        if rows > max || cols > max {
            return Err(LayoutError::TooManyTracks { rows, cols, max });
        }
        Ok(Self { rows, cols })
    }

    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    /// Number of cells, `rows * cols`.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Whether `index` names a cell of this layout.
    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        index < self.cell_count()
    }

    /// Flat index for `(row, col)`, if in range.
    #[must_use]
    pub fn index_of(&self, row: u16, col: u16) -> Option<usize> {
        (row < self.rows && col < self.cols)
            .then(|| row as usize * self.cols as usize + col as usize)
    }

    /// `(row, col)` for a flat index, if in range.
    #[must_use]
    pub fn position_of(&self, index: usize) -> Option<(u16, u16)> {
        if !self.contains(index) {
            return None;
        }
        let cols = self.cols as usize;
        Some(((index / cols) as u16, (index % cols) as u16))
    }

    /// Neighbouring cell in `direction`, clamped at the grid edge.
    #[must_use]
    pub fn neighbor(&self, index: usize, direction: FocusDirection) -> Option<usize> {
        let (row, col) = self.position_of(index)?;
        let (row, col) = match direction {
            FocusDirection::Left => (row, col.saturating_sub(1)),
            FocusDirection::Right => (row, (col + 1).min(self.cols - 1)),
            FocusDirection::Up => (row.saturating_sub(1), col),
            FocusDirection::Down => ((row + 1).min(self.rows - 1), col),
        };
        self.index_of(row, col)
    }

    /// Split `area` into equally sized cells, in flat index order.
    ///
    /// Leftover pixels go to the leading tracks, one each, so the cells
    /// tile `area` exactly.
    #[must_use]
    pub fn cell_rects(&self, area: Rect) -> Vec<Rect> {
        let columns = split_tracks(area.x, area.width, self.cols);
        let rows = split_tracks(area.y, area.height, self.rows);
        let mut rects = Vec::with_capacity(self.cell_count());
        for &(y, height) in &rows {
            for &(x, width) in &columns {
                rects.push(Rect::new(x, y, width, height));
            }
        }
        rects
    }

    /// CSS `grid-template-rows` value.
    #[must_use]
    pub fn template_rows(&self) -> String {
        format!("repeat({}, minmax(0, 1fr))", self.rows)
    }

    /// CSS `grid-template-columns` value.
    #[must_use]
    pub fn template_columns(&self) -> String {
        format!("repeat({}, minmax(0, 1fr))", self.cols)
    }
}

impl std::fmt::Display for GridLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

fn split_tracks(origin: u32, extent: u32, tracks: u16) -> Vec<(u32, u32)> {
    let tracks = u32::from(tracks.max(1));
    let base = extent / tracks;
    let extra = extent % tracks;
    let mut offset = origin;
    (0..tracks)
        .map(|i| {
            let len = base + u32::from(i < extra);
            let track = (offset, len);
            offset += len;
            track
        })
        .collect()
}

/// Direction for spatial focus movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Named layouts offered by the layout picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPreset {
    Single,
    Columns2,
    Rows2,
    Grid2x2,
    Columns3,
    Grid2x3,
    Grid3x3,
}

impl LayoutPreset {
    /// All presets, smallest first.
    pub const ALL: [Self; 7] = [
        Self::Single,
        Self::Columns2,
        Self::Rows2,
        Self::Grid2x2,
        Self::Columns3,
        Self::Grid2x3,
        Self::Grid3x3,
    ];

    #[must_use]
    pub const fn layout(self) -> GridLayout {
        let (rows, cols) = match self {
            Self::Single => (1, 1),
            Self::Columns2 => (1, 2),
            Self::Rows2 => (2, 1),
            Self::Grid2x2 => (2, 2),
            Self::Columns3 => (1, 3),
            Self::Grid2x3 => (2, 3),
            Self::Grid3x3 => (3, 3),
        };
        GridLayout { rows, cols }
    }

    /// Stable identifier used in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Columns2 => "columns2",
            Self::Rows2 => "rows2",
            Self::Grid2x2 => "grid2x2",
            Self::Columns3 => "columns3",
            Self::Grid2x3 => "grid2x3",
            Self::Grid3x3 => "grid3x3",
        }
    }

    /// Preset whose layout equals `layout`, if any.
    #[must_use]
    pub fn for_layout(layout: GridLayout) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.layout() == layout)
    }
}

impl std::str::FromStr for LayoutPreset {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LayoutError::UnknownPreset(s.to_owned()))
    }
}

impl From<LayoutPreset> for GridLayout {
    fn from(preset: LayoutPreset) -> Self {
        preset.layout()
    }
}
