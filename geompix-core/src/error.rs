//! Error types for geompix-core.

use thiserror::Error;

/// Result type alias for geompix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for geometry validation, pixel map construction and
/// frame assembly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A geometry must contain at least one panel.
    #[error("geometry contains no panels")]
    EmptyGeometry,

    /// Two panels were declared with the same name.
    #[error("duplicate panel name: {0}")]
    DuplicatePanel(String),

    /// A panel's raw-array extent is inverted.
    #[error("panel {panel}: invalid extent fs {min_fs}..={max_fs}, ss {min_ss}..={max_ss}")]
    InvalidExtent {
        panel: String,
        min_fs: usize,
        max_fs: usize,
        min_ss: usize,
        max_ss: usize,
    },

    /// Pixel pitch must be finite and strictly positive.
    #[error("panel {panel}: invalid pixel pitch {pitch}")]
    InvalidPitch { panel: String, pitch: f64 },

    /// The raw data array described by the panels is too large to allocate.
    #[error("raw data shape {rows}x{cols} exceeds {max_cells} cells")]
    RawShapeTooLarge {
        rows: usize,
        cols: usize,
        max_cells: usize,
    },

    /// Two panels claim the same raw-array address.
    #[error("panels {first} and {second} overlap in the raw data array")]
    OverlappingPanels { first: String, second: String },

    /// Fast-scan and slow-scan vectors do not span the detector plane, or the
    /// panel parameters produce non-finite coordinates.
    #[error("panel {panel} is degenerate: {reason}")]
    DegeneratePanel { panel: String, reason: String },

    /// A bad region or rigid group refers to a panel that does not exist.
    #[error("{context} refers to unknown panel {panel}")]
    UnknownPanel { context: String, panel: String },

    /// A rigid group collection refers to a group that does not exist.
    #[error("rigid group collection {collection} refers to unknown rigid group {group}")]
    UnknownRigidGroup { collection: String, group: String },

    /// Every address of the pixel map was excluded.
    #[error("pixel map has no valid pixels")]
    NoValidPixels,

    /// Raw data shape does not match the pixel map.
    #[error("raw data shape {actual:?} does not match pixel map shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
