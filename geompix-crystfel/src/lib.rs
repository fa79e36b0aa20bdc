//! geompix-crystfel: CrystFEL geometry file parsing.
//!
//! Parses the line-oriented `key = value` geometry format into a validated
//! [`geompix_core::Geometry`]. Parsing is pure; reading files is left to
//! the caller.
//!

mod draft;
pub mod direction;
pub mod error;
pub mod parser;

pub use direction::parse_direction;
pub use error::{Error, Result};
pub use parser::{GeometryParser, ParserConfig};

use geompix_core::Geometry;

/// Parses geometry text with the default parser configuration.
///
/// # Errors
/// See [`GeometryParser::parse`].
pub fn parse(source: &str) -> Result<Geometry> {
    GeometryParser::new().parse(source)
}
