//! geompix-algorithms: Pixel map construction and frame assembly.
//!
//! - [`build_pixel_map`] evaluates every panel of a geometry into per-pixel
//!   lab coordinates and derives the visualization canvas.
//! - [`assemble`] and [`FrameAssembler`] scatter raw readouts onto that
//!   canvas.
//!
#![warn(missing_docs)]

mod assemble;
mod pixel_map;

pub use assemble::{assemble, FrameAssembler};
pub use pixel_map::{build_pixel_map, check_panel};

// Re-export the configuration types callers pass in
pub use geompix_core::{AssemblyConfig, CollisionPolicy, PixelMapConfig, MAX_CANVAS_CELLS};
