//! geompix-core: Core types for detector geometry processing.
//!
//! This crate provides the typed data model shared by the parser, the pixel
//! map builder and the frame assembler: panels, geometries, pixel maps,
//! canvases and assembled frames, plus their configuration and errors.
//!

pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod panel;
pub mod pixel_map;
pub mod vector;

pub use config::{AssemblyConfig, CollisionPolicy, PixelMapConfig};
pub use error::{Error, Result};
pub use frame::AssembledFrame;
pub use geometry::{
    BadExtent, BadRegion, Beam, ExtremePixel, ExtremePixels, Geometry, MaskBits, PhotonEnergy,
    MAX_RAW_CELLS,
};
pub use panel::{AduScale, BadRowDirection, CameraLength, DimEntry, Panel};
pub use pixel_map::{Canvas, CanvasLayout, PixelMap, PixelMapParts, MAX_CANVAS_CELLS};
pub use vector::Vec3;
