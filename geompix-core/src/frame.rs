//! Assembled visualization frames.

use ndarray::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A raw frame projected onto the visualization canvas.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssembledFrame<T> {
    /// Canvas values.
    pub frame: Array2<T>,
    /// True where a detector pixel was written.
    pub mask: Array2<bool>,
}

impl<T> AssembledFrame<T> {
    /// Shape `(rows, cols)` of the canvas.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.frame.dim()
    }

    /// Number of canvas cells that received detector data.
    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}
