//! Configuration for pixel map construction and frame assembly.

use crate::pixel_map::CanvasLayout;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the pixel map builder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelMapConfig {
    /// Size of one canvas cell in metres. `None` uses the smallest panel pitch.
    pub pixel_size: Option<f64>,
    /// Reference center overriding the geometry's beam center.
    pub beam_center: Option<[f64; 2]>,
    /// Canvas layout.
    pub layout: CanvasLayout,
    /// Exclude pixels inside the geometry's bad regions.
    pub apply_bad_regions: bool,
}

impl Default for PixelMapConfig {
    fn default() -> Self {
        Self {
            pixel_size: None,
            beam_center: None,
            layout: CanvasLayout::BoundingBox,
            apply_bad_regions: true,
        }
    }
}

impl PixelMapConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the visualization pixel size.
    #[must_use]
    pub fn with_pixel_size(mut self, size: f64) -> Self {
        self.pixel_size = Some(size);
        self
    }

    /// Overrides the reference beam center.
    #[must_use]
    pub fn with_beam_center(mut self, center: [f64; 2]) -> Self {
        self.beam_center = Some(center);
        self
    }

    /// Sets the canvas layout.
    #[must_use]
    pub fn with_layout(mut self, layout: CanvasLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Enables or disables bad-region exclusion.
    #[must_use]
    pub fn with_bad_regions(mut self, apply: bool) -> Self {
        self.apply_bad_regions = apply;
        self
    }

    /// Checks that numeric settings are usable.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for a non-positive or non-finite pixel
    /// size or a non-finite beam center.
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.pixel_size {
            if !(size.is_finite() && size > 0.0) {
                return Err(Error::ConfigError(format!(
                    "visualization pixel size must be positive and finite, got {size}"
                )));
            }
        }
        if let Some([x, y]) = self.beam_center {
            if !(x.is_finite() && y.is_finite()) {
                return Err(Error::ConfigError(format!(
                    "beam center must be finite, got ({x}, {y})"
                )));
            }
        }
        Ok(())
    }
}

/// Resolution of several raw pixels landing in the same canvas cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionPolicy {
    /// The last pixel in row-major raw order is kept.
    #[default]
    LastWriteWins,
    /// The first pixel in row-major raw order is kept.
    FirstWriteWins,
}

/// Configuration for the frame assembler.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssemblyConfig<T> {
    /// Value of canvas cells that receive no pixel.
    pub fill_value: T,
    /// Collision policy.
    pub collision: CollisionPolicy,
}

impl<T: Default> Default for AssemblyConfig<T> {
    fn default() -> Self {
        Self {
            fill_value: T::default(),
            collision: CollisionPolicy::default(),
        }
    }
}

impl<T> AssemblyConfig<T> {
    /// Creates a configuration with the given fill value.
    pub fn with_fill(fill_value: T) -> Self {
        Self {
            fill_value,
            collision: CollisionPolicy::default(),
        }
    }

    /// Sets the collision policy.
    #[must_use]
    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }
}
