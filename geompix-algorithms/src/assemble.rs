//! Frame assembly: scattering raw readouts onto the visualization canvas.

use geompix_core::{AssembledFrame, AssemblyConfig, CollisionPolicy, Error, PixelMap, Result};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// One valid raw address and the canvas cell it lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    raw: (usize, usize),
    cell: (usize, usize),
}

/// Precomputed raw-address to canvas-cell lookup.
///
/// Built once from a [`PixelMap`] and reused for every frame, so assembling
/// a frame is a single scatter pass. Placements are kept in row-major raw
/// order, which fixes the outcome of collisions.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    raw_shape: (usize, usize),
    canvas_shape: (usize, usize),
    placements: Vec<Placement>,
}

impl FrameAssembler {
    /// Creates an assembler for the given pixel map.
    #[must_use]
    pub fn new(pixel_map: &PixelMap) -> Self {
        let (rows, cols) = pixel_map.shape();
        let placements = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .filter_map(|raw| {
                pixel_map
                    .canvas_cell(raw.0, raw.1)
                    .map(|cell| Placement { raw, cell })
            })
            .collect();

        Self {
            raw_shape: (rows, cols),
            canvas_shape: pixel_map.canvas().shape(),
            placements,
        }
    }

    /// Shape of the raw frames this assembler accepts.
    #[must_use]
    pub fn raw_shape(&self) -> (usize, usize) {
        self.raw_shape
    }

    /// Shape of the assembled frames.
    #[must_use]
    pub fn canvas_shape(&self) -> (usize, usize) {
        self.canvas_shape
    }

    /// Number of raw addresses that contribute to a frame.
    #[must_use]
    pub fn placement_count(&self) -> usize {
        self.placements.len()
    }

    /// Assembles one raw frame.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `raw` does not have the raw shape
    /// of the pixel map.
    pub fn assemble<T: Copy>(
        &self,
        raw: ArrayView2<'_, T>,
        config: &AssemblyConfig<T>,
    ) -> Result<AssembledFrame<T>> {
        if raw.dim() != self.raw_shape {
            return Err(Error::ShapeMismatch {
                expected: self.raw_shape,
                actual: raw.dim(),
            });
        }

        let mut frame = Array2::from_elem(self.canvas_shape, config.fill_value);
        let mut mask = Array2::from_elem(self.canvas_shape, false);
        for placement in &self.placements {
            let taken = &mut mask[placement.cell];
            if *taken && config.collision == CollisionPolicy::FirstWriteWins {
                continue;
            }
            *taken = true;
            frame[placement.cell] = raw[placement.raw];
        }

        Ok(AssembledFrame { frame, mask })
    }

    /// Assembles many frames in parallel. Results keep the input order.
    ///
    /// # Errors
    /// Returns the first [`Error::ShapeMismatch`] among the frames.
    pub fn assemble_batch<T: Copy + Send + Sync>(
        &self,
        frames: &[ArrayView2<'_, T>],
        config: &AssemblyConfig<T>,
    ) -> Result<Vec<AssembledFrame<T>>> {
        frames
            .par_iter()
            .map(|raw| self.assemble(raw.view(), config))
            .collect()
    }
}

/// Assembles one raw frame using a pixel map.
///
/// Convenience wrapper building a [`FrameAssembler`] for a single call;
/// reuse an assembler when assembling many frames.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] if `raw` does not match the pixel map.
pub fn assemble<T: Copy>(
    pixel_map: &PixelMap,
    raw: ArrayView2<'_, T>,
    config: &AssemblyConfig<T>,
) -> Result<AssembledFrame<T>> {
    if raw.dim() != pixel_map.shape() {
        return Err(Error::ShapeMismatch {
            expected: pixel_map.shape(),
            actual: raw.dim(),
        });
    }
    FrameAssembler::new(pixel_map).assemble(raw, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geompix_core::{Geometry, Panel, PixelMapConfig, Vec3};
    use ndarray::array;

    use crate::build_pixel_map;

    /// Two stacked 1x2 panels sharing the same physical position.
    fn colliding_map() -> PixelMap {
        let geometry = Geometry::new(vec![
            Panel::new("top", (0, 1), (0, 0)),
            Panel::new("bottom", (0, 1), (1, 1)),
        ])
        .unwrap();
        build_pixel_map(&geometry, &PixelMapConfig::default()).unwrap()
    }

    #[test]
    fn test_collision_policies() {
        let map = colliding_map();
        assert_eq!(map.canvas().shape(), (1, 2));
        let raw = array![[1u16, 2], [3, 4]];

        let last = assemble(&map, raw.view(), &AssemblyConfig::default()).unwrap();
        assert_eq!(last.frame, array![[3u16, 4]]);

        let first = assemble(
            &map,
            raw.view(),
            &AssemblyConfig::default().with_collision(CollisionPolicy::FirstWriteWins),
        )
        .unwrap();
        assert_eq!(first.frame, array![[1u16, 2]]);
        assert!(first.mask.iter().all(|&m| m));
    }

    #[test]
    fn test_fill_value_for_empty_cells() {
        // Pixels at x = 0 and x = 2 leave the middle cell empty.
        let geometry = Geometry::new(vec![Panel::new("p", (0, 1), (0, 0))
            .with_scan_vectors(Vec3::X * 2.0, Vec3::Y)])
        .unwrap();
        let map = build_pixel_map(&geometry, &PixelMapConfig::default()).unwrap();
        let raw = array![[5.0f32, 7.0]];

        let out = assemble(&map, raw.view(), &AssemblyConfig::with_fill(f32::NAN)).unwrap();
        assert_eq!(out.shape(), (1, 3));
        assert_eq!(out.mask, array![[true, false, true]]);
        assert!(out.frame[(0, 1)].is_nan());
        assert_eq!(out.filled_count(), 2);
    }

    #[test]
    fn test_shape_mismatch() {
        let map = colliding_map();
        let raw = Array2::<u8>::zeros((3, 2));
        assert_eq!(
            assemble(&map, raw.view(), &AssemblyConfig::default()),
            Err(Error::ShapeMismatch {
                expected: (2, 2),
                actual: (3, 2)
            })
        );
    }

    #[test]
    fn test_assembler_reports_shapes() {
        let assembler = FrameAssembler::new(&colliding_map());
        assert_eq!(assembler.raw_shape(), (2, 2));
        assert_eq!(assembler.canvas_shape(), (1, 2));
        assert_eq!(assembler.placement_count(), 4);
    }
}
