//! Pixel maps and the visualization canvas derived from them.

use ndarray::Array2;

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How physical coordinates are laid out on the visualization canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CanvasLayout {
    /// Smallest canvas containing every pixel; the minimum coordinate maps to
    /// cell 0.
    #[default]
    BoundingBox,
    /// Canvas centered on the reference center, large enough to hold the
    /// farthest pixel on either side.
    Centered,
}

/// Integer grid onto which physical pixel positions are projected.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Canvas {
    layout: CanvasLayout,
    pixel_size: f64,
    origin: [f64; 2],
    width: usize,
    height: usize,
}

/// Upper bound on canvas cells.
pub const MAX_CANVAS_CELLS: usize = 1 << 28;

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
impl Canvas {
    /// Canvas covering `min..=max` on both axes.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the pixel size is not positive and
    /// finite, the extent is empty or non-finite, or the canvas would exceed
    /// [`MAX_CANVAS_CELLS`].
    pub fn bounding_box(min: [f64; 2], max: [f64; 2], pixel_size: f64) -> Result<Self> {
        let cells = |lo: f64, hi: f64| ((hi - lo) / pixel_size).floor() + 1.0;
        Self::checked(
            CanvasLayout::BoundingBox,
            pixel_size,
            min,
            [cells(min[0], max[0]), cells(min[1], max[1])],
        )
    }

    /// Canvas centered on `center` whose half-extent covers `max_distance`
    /// on each axis.
    ///
    /// # Errors
    /// See [`Canvas::bounding_box`].
    pub fn centered(center: [f64; 2], max_distance: [f64; 2], pixel_size: f64) -> Result<Self> {
        let cells = |d: f64| 2.0 * (d / pixel_size).trunc() + 2.0;
        Self::checked(
            CanvasLayout::Centered,
            pixel_size,
            center,
            [cells(max_distance[0]), cells(max_distance[1])],
        )
    }

    /// Validates dimensions computed in floating point before converting them.
    fn checked(
        layout: CanvasLayout,
        pixel_size: f64,
        origin: [f64; 2],
        [width, height]: [f64; 2],
    ) -> Result<Self> {
        if !(pixel_size.is_finite() && pixel_size > 0.0) {
            return Err(Error::ConfigError(format!(
                "canvas pixel size must be positive and finite, got {pixel_size}"
            )));
        }
        if !(origin[0].is_finite() && origin[1].is_finite()) {
            return Err(Error::ConfigError(format!(
                "canvas origin must be finite, got ({}, {})",
                origin[0], origin[1]
            )));
        }
        let fits = |dim: f64| dim.is_finite() && dim >= 1.0;
        if !(fits(width) && fits(height)) {
            return Err(Error::ConfigError(format!(
                "canvas of {height} x {width} cells at pixel size {pixel_size} is not representable"
            )));
        }
        if width * height > MAX_CANVAS_CELLS as f64 {
            return Err(Error::ConfigError(format!(
                "canvas of {height} x {width} cells at pixel size {pixel_size} exceeds {MAX_CANVAS_CELLS} cells"
            )));
        }
        Ok(Self {
            layout,
            pixel_size,
            origin,
            width: width as usize,
            height: height as usize,
        })
    }

    /// Layout used to derive the canvas.
    #[must_use]
    pub fn layout(&self) -> CanvasLayout {
        self.layout
    }

    /// Size of one canvas cell in physical units.
    #[must_use]
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Physical reference point: the lower corner for bounding boxes, the
    /// center for centered canvases.
    #[must_use]
    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Shape `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Canvas cell `(row, col)` of a physical position, clamped into the canvas.
    #[must_use]
    pub fn cell(&self, x: f64, y: f64) -> (usize, usize) {
        let col = self.axis_cell(x, self.origin[0], self.width);
        let row = self.axis_cell(y, self.origin[1], self.height);
        (row, col)
    }

    fn axis_cell(&self, value: f64, origin: f64, dim: usize) -> usize {
        let scaled = (value - origin) / self.pixel_size;
        let index = match self.layout {
            CanvasLayout::BoundingBox => scaled.floor() as i64,
            CanvasLayout::Centered => scaled.trunc() as i64 + (dim / 2) as i64 - 1,
        };
        index.clamp(0, (dim as i64 - 1).max(0)) as usize
    }
}

/// Per-pixel physical coordinates for every address of the raw data array.
///
/// All arrays share the raw data shape. Addresses not covered by a panel, or
/// excluded by a bad region, have `valid == false`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelMap {
    x: Array2<f64>,
    y: Array2<f64>,
    z: Array2<f64>,
    r: Array2<f64>,
    phi: Array2<f64>,
    valid: Array2<bool>,
    center: [f64; 2],
    canvas: Canvas,
}

/// Coordinate arrays making up a [`PixelMap`].
#[derive(Debug, Clone)]
pub struct PixelMapParts {
    /// X coordinates.
    pub x: Array2<f64>,
    /// Y coordinates.
    pub y: Array2<f64>,
    /// Z coordinates.
    pub z: Array2<f64>,
    /// Radius from the reference center.
    pub r: Array2<f64>,
    /// Azimuth around the reference center.
    pub phi: Array2<f64>,
    /// Coverage flags.
    pub valid: Array2<bool>,
}

impl PixelMap {
    /// Assembles a pixel map from its parts.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the arrays differ in shape.
    pub fn from_parts(parts: PixelMapParts, center: [f64; 2], canvas: Canvas) -> Result<Self> {
        let expected = parts.x.dim();
        for actual in [
            parts.y.dim(),
            parts.z.dim(),
            parts.r.dim(),
            parts.phi.dim(),
            parts.valid.dim(),
        ] {
            if actual != expected {
                return Err(Error::ShapeMismatch { expected, actual });
            }
        }
        Ok(Self {
            x: parts.x,
            y: parts.y,
            z: parts.z,
            r: parts.r,
            phi: parts.phi,
            valid: parts.valid,
            center,
            canvas,
        })
    }

    /// Shape `(rows, cols)` of the raw data array.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.x.dim()
    }

    /// X coordinates in metres.
    #[must_use]
    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    /// Y coordinates in metres.
    #[must_use]
    pub fn y(&self) -> &Array2<f64> {
        &self.y
    }

    /// Z coordinates in metres.
    #[must_use]
    pub fn z(&self) -> &Array2<f64> {
        &self.z
    }

    /// Radial distance from the reference center.
    #[must_use]
    pub fn r(&self) -> &Array2<f64> {
        &self.r
    }

    /// Azimuth in radians around the reference center.
    #[must_use]
    pub fn phi(&self) -> &Array2<f64> {
        &self.phi
    }

    /// Coverage flags.
    #[must_use]
    pub fn valid(&self) -> &Array2<bool> {
        &self.valid
    }

    /// Reference center used for `r` and `phi`.
    #[must_use]
    pub fn center(&self) -> [f64; 2] {
        self.center
    }

    /// Visualization canvas.
    #[must_use]
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Number of valid addresses.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Canvas cell of the raw address `(row, col)`, or `None` if the address
    /// is invalid or out of range.
    #[must_use]
    pub fn canvas_cell(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        if !*self.valid.get((row, col))? {
            return None;
        }
        Some(self.canvas.cell(self.x[(row, col)], self.y[(row, col)]))
    }
}
