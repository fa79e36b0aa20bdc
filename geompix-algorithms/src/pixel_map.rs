//! Pixel map construction.

use geompix_core::{
    BadRegion, Canvas, CanvasLayout, Error, Geometry, Panel, PixelMap, PixelMapConfig,
    PixelMapParts, Result, Vec3,
};
use ndarray::{s, Array2, Zip};
use rayon::prelude::*;

/// Relative tolerance of the in-plane determinant below which fs and ss
/// are treated as parallel.
const DEGENERACY_TOLERANCE: f64 = 1e-9;

/// Checks a panel for parameters that cannot produce a usable map.
///
/// # Errors
/// Returns the panel's own validation error, or [`Error::DegeneratePanel`]
/// for non-finite parameters, parallel or zero-length in-plane scan
/// vectors, or corners that overflow.
pub fn check_panel(panel: &Panel) -> Result<()> {
    panel.validate()?;
    let degenerate = |reason: &str| Error::DegeneratePanel {
        panel: panel.name.clone(),
        reason: reason.to_string(),
    };

    if !(panel.corner_x.is_finite()
        && panel.corner_y.is_finite()
        && panel.z_offset().is_finite()
        && panel.fs.is_finite()
        && panel.ss.is_finite())
    {
        return Err(degenerate("non-finite corner, offset or scan vector"));
    }

    let fs_norm = panel.fs.planar_norm();
    let ss_norm = panel.ss.planar_norm();
    if fs_norm == 0.0 || ss_norm == 0.0 {
        return Err(degenerate("scan vector has no in-plane component"));
    }
    let det = panel.fs.planar_cross(&panel.ss);
    if det.abs() <= DEGENERACY_TOLERANCE * fs_norm * ss_norm {
        return Err(degenerate("fs and ss are parallel"));
    }

    #[allow(clippy::cast_precision_loss)]
    let (last_fs, last_ss) = ((panel.width() - 1) as f64, (panel.height() - 1) as f64);
    let pitch = panel.pixel_pitch();
    for (fs, ss) in [(0.0, 0.0), (last_fs, 0.0), (0.0, last_ss), (last_fs, last_ss)] {
        let corner = panel.position_px(fs, ss) * pitch;
        if !(corner.is_finite() && (corner.z + panel.z_offset()).is_finite()) {
            return Err(degenerate("corner coordinates overflow"));
        }
    }
    Ok(())
}

/// Coordinates of one panel's raw block.
struct PanelBlock {
    x: Array2<f64>,
    y: Array2<f64>,
    z: Array2<f64>,
    valid: Array2<bool>,
}

#[allow(clippy::cast_precision_loss)]
fn compute_block(panel: &Panel, bad_regions: &[BadRegion]) -> PanelBlock {
    let shape = (panel.height(), panel.width());
    let pitch = panel.pixel_pitch();
    let z_offset = panel.z_offset();
    let position = |(r, c): (usize, usize)| -> Vec3 { panel.position_px(c as f64, r as f64) };

    let x = Array2::from_shape_fn(shape, |idx| position(idx).x * pitch);
    let y = Array2::from_shape_fn(shape, |idx| position(idx).y * pitch);
    let z = Array2::from_shape_fn(shape, |idx| z_offset + position(idx).z * pitch);
    let valid = Array2::from_shape_fn(shape, |(r, c)| {
        let p = position((r, c));
        let (ss, fs) = (panel.min_ss + r, panel.min_fs + c);
        !bad_regions
            .iter()
            .any(|region| region.contains(&panel.name, ss, fs, p.x, p.y))
    });

    PanelBlock { x, y, z, valid }
}

/// Builds the pixel map of a geometry.
///
/// Every panel is checked before any coordinate is computed. Panels are
/// then evaluated in parallel and written into arrays shaped like the raw
/// data. Addresses not covered by a panel keep zero coordinates and are
/// marked invalid.
///
/// # Errors
/// Returns [`Error::ConfigError`] for an invalid configuration or an
/// oversized canvas, [`Error::DegeneratePanel`] (see [`check_panel`]) and
/// [`Error::NoValidPixels`] when bad regions exclude every pixel.
pub fn build_pixel_map(geometry: &Geometry, config: &PixelMapConfig) -> Result<PixelMap> {
    config.validate()?;
    let panels = geometry.panels();
    if panels.is_empty() {
        return Err(Error::EmptyGeometry);
    }
    for panel in panels {
        check_panel(panel)?;
    }

    let bad_regions = if config.apply_bad_regions {
        geometry.bad_regions()
    } else {
        &[]
    };
    let blocks: Vec<PanelBlock> = panels
        .par_iter()
        .map(|panel| compute_block(panel, bad_regions))
        .collect();

    let shape = geometry.raw_shape();
    let mut x = Array2::zeros(shape);
    let mut y = Array2::zeros(shape);
    let mut z = Array2::zeros(shape);
    let mut valid = Array2::from_elem(shape, false);
    let mut covered = Array2::from_elem(shape, false);
    for (panel, block) in panels.iter().zip(&blocks) {
        let region = s![panel.min_ss..=panel.max_ss, panel.min_fs..=panel.max_fs];
        x.slice_mut(region).assign(&block.x);
        y.slice_mut(region).assign(&block.y);
        z.slice_mut(region).assign(&block.z);
        valid.slice_mut(region).assign(&block.valid);
        covered.slice_mut(region).fill(true);
    }

    let center = config
        .beam_center
        .or(geometry.beam_center())
        .unwrap_or([0.0, 0.0]);
    let [cx, cy] = center;
    let mut r = Array2::zeros(shape);
    let mut phi = Array2::zeros(shape);
    Zip::from(&mut r)
        .and(&mut phi)
        .and(&x)
        .and(&y)
        .and(&covered)
        .for_each(|r, phi, &x, &y, &covered| {
            if covered {
                *r = (x - cx).hypot(y - cy);
                *phi = (y - cy).atan2(x - cx);
            }
        });

    let valid_count = valid.iter().filter(|&&v| v).count();
    if valid_count == 0 {
        return Err(Error::NoValidPixels);
    }

    let pixel_size = config.pixel_size.unwrap_or_else(|| {
        panels
            .iter()
            .map(Panel::pixel_pitch)
            .fold(f64::INFINITY, f64::min)
    });
    let canvas = build_canvas(&x, &y, &valid, center, pixel_size, config.layout)?;

    log::debug!(
        "pixel map {}x{}: {valid_count} of {} addresses valid, canvas {}x{} at {pixel_size} m",
        shape.0,
        shape.1,
        shape.0 * shape.1,
        canvas.height(),
        canvas.width()
    );

    PixelMap::from_parts(
        PixelMapParts {
            x,
            y,
            z,
            r,
            phi,
            valid,
        },
        center,
        canvas,
    )
}

fn build_canvas(
    x: &Array2<f64>,
    y: &Array2<f64>,
    valid: &Array2<bool>,
    center: [f64; 2],
    pixel_size: f64,
    layout: CanvasLayout,
) -> Result<Canvas> {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    Zip::from(x).and(y).and(valid).for_each(|&x, &y, &valid| {
        if valid {
            min = [min[0].min(x), min[1].min(y)];
            max = [max[0].max(x), max[1].max(y)];
        }
    });

    match layout {
        CanvasLayout::BoundingBox => Canvas::bounding_box(min, max, pixel_size),
        CanvasLayout::Centered => {
            let reach = |axis: usize| {
                (min[axis] - center[axis])
                    .abs()
                    .max((max[axis] - center[axis]).abs())
            };
            Canvas::centered(center, [reach(0), reach(1)], pixel_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geompix_core::BadExtent;

    fn unit_panel(name: &str, fs: (usize, usize), ss: (usize, usize)) -> Panel {
        Panel::new(name, fs, ss)
    }

    #[test]
    fn test_check_panel_parallel_vectors() {
        let panel = unit_panel("p", (0, 3), (0, 3))
            .with_scan_vectors(Vec3::X, Vec3::new(2.0, 1e-12, 0.0));
        assert!(matches!(
            check_panel(&panel),
            Err(Error::DegeneratePanel { .. })
        ));
    }

    #[test]
    fn test_check_panel_out_of_plane() {
        let panel = unit_panel("p", (0, 3), (0, 3))
            .with_scan_vectors(Vec3::new(0.0, 0.0, 1.0), Vec3::Y);
        assert!(matches!(
            check_panel(&panel),
            Err(Error::DegeneratePanel { .. })
        ));
    }

    #[test]
    fn test_check_panel_overflow() {
        let panel = unit_panel("p", (0, 3), (0, 3))
            .with_corner(f64::MAX, 0.0)
            .with_res(1e-300);
        assert!(matches!(
            check_panel(&panel),
            Err(Error::DegeneratePanel { .. })
        ));
        assert!(check_panel(&unit_panel("ok", (0, 3), (0, 3))).is_ok());
    }

    #[test]
    fn test_uncovered_addresses() {
        // Raw shape 4x4, panel covers rows 0..=1 only.
        let geometry = Geometry::new(vec![
            unit_panel("a", (0, 3), (0, 1)),
            unit_panel("b", (2, 3), (2, 3)).with_corner(10.0, 10.0),
        ])
        .unwrap();
        let map = build_pixel_map(&geometry, &PixelMapConfig::default()).unwrap();
        assert_eq!(map.shape(), (4, 4));
        assert_eq!(map.valid_count(), 12);
        assert!(!map.valid()[(2, 0)]);
        assert_relative_eq!(map.x()[(2, 0)], 0.0);
        assert_relative_eq!(map.r()[(2, 0)], 0.0);
        assert_relative_eq!(map.x()[(3, 3)], 11.0);
        assert_relative_eq!(map.y()[(3, 3)], 11.0);
    }

    #[test]
    fn test_bad_regions_clear_valid() {
        let geometry = Geometry::new(vec![unit_panel("a", (0, 3), (0, 3))])
            .unwrap()
            .with_bad_regions(vec![BadRegion {
                name: "badcolumn".into(),
                panel: None,
                extent: BadExtent::Raw {
                    min_fs: 1,
                    max_fs: 1,
                    min_ss: 0,
                    max_ss: 3,
                },
            }])
            .unwrap();

        let map = build_pixel_map(&geometry, &PixelMapConfig::default()).unwrap();
        assert_eq!(map.valid_count(), 12);
        assert!(!map.valid()[(2, 1)]);
        // Coordinates of excluded pixels are still computed.
        assert_relative_eq!(map.x()[(2, 1)], 1.0);

        let map = build_pixel_map(&geometry, &PixelMapConfig::new().with_bad_regions(false))
            .unwrap();
        assert_eq!(map.valid_count(), 16);
    }

    #[test]
    fn test_all_pixels_excluded() {
        let geometry = Geometry::new(vec![unit_panel("a", (0, 1), (0, 1))])
            .unwrap()
            .with_bad_regions(vec![BadRegion {
                name: "badall".into(),
                panel: Some("a".into()),
                extent: BadExtent::Lab {
                    min_x: None,
                    max_x: None,
                    min_y: None,
                    max_y: None,
                },
            }])
            .unwrap();
        assert_eq!(
            build_pixel_map(&geometry, &PixelMapConfig::default()),
            Err(Error::NoValidPixels)
        );
    }

    #[test]
    fn test_canvas_size_limit() {
        let geometry = Geometry::new(vec![unit_panel("a", (0, 1), (0, 1))
            .with_scan_vectors(Vec3::X * 1e6, Vec3::Y * 1e6)])
        .unwrap();
        let config = PixelMapConfig::new().with_pixel_size(0.01);
        assert!(matches!(
            build_pixel_map(&geometry, &config),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_tiny_pixel_size_rejected() {
        let geometry = Geometry::new(vec![unit_panel("a", (0, 1), (0, 1))]).unwrap();
        for layout in [CanvasLayout::BoundingBox, CanvasLayout::Centered] {
            let config = PixelMapConfig::new()
                .with_pixel_size(1e-300)
                .with_layout(layout);
            assert!(matches!(
                build_pixel_map(&geometry, &config),
                Err(Error::ConfigError(_))
            ));
        }
    }
}
