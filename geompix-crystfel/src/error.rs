//! Geometry file parsing errors.

use thiserror::Error;

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Parsing error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Line is not of the form `key = value`.
    #[error("line {line}: expected `key = value`, got {text:?}")]
    Syntax { line: usize, text: String },

    /// Value cannot be interpreted for its key.
    #[error("line {line}: invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
        reason: String,
    },

    /// Key not recognized while parsing in strict mode.
    #[error("line {line}: unknown key {key}")]
    UnknownKey { line: usize, key: String },

    /// A panel lacks a required attribute.
    #[error("panel {panel}: missing required attribute {attribute}")]
    MissingAttribute {
        panel: String,
        attribute: &'static str,
    },

    /// A panel's data-source layout is incomplete or ambiguous.
    #[error("panel {panel}: invalid dimension structure: {reason}")]
    DimStructure { panel: String, reason: String },

    /// Panels disagree on the event placeholders of their data or mask
    /// locations.
    #[error("inconsistent placeholders: {0}")]
    Placeholders(String),

    /// A bad region is incompletely or inconsistently specified.
    #[error("bad region {region}: {reason}")]
    BadRegion { region: String, reason: String },

    /// Only one of `beam_center_x` and `beam_center_y` was given.
    #[error("beam center requires both beam_center_x and beam_center_y")]
    IncompleteBeamCenter,

    /// Structural validation of the parsed geometry failed.
    #[error("geometry error: {0}")]
    Core(#[from] geompix_core::Error),
}
