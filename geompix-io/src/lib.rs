//! geompix-io: File I/O for geompix.
//!
//! Loads geometry files, reads headerless raw frame files through
//! memory maps (memmap2) and writes assembled frames as CSV or binary.
//!

mod error;
mod geometry;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use geometry::{load_geometry, load_geometry_with};
pub use reader::{ElementType, RawElement, RawFrameReader};
pub use writer::{FrameWriter, OutputFormat};
