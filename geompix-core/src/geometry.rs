//! Detector geometry: panels plus global beam and detector parameters.

use std::collections::{BTreeMap, HashSet};

use crate::panel::Panel;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on the number of cells of the raw data array.
pub const MAX_RAW_CELLS: usize = 1 << 28;

/// Planck constant times speed of light, in eV·m.
const HC_EV_M: f64 = 1.239_841_984e-6;

/// Photon energy source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PhotonEnergy {
    /// Fixed energy in electron-volts.
    Fixed(f64),
    /// Location of a per-event value in the data source.
    FromData(String),
}

/// Beam parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Beam {
    /// Nominal photon energy.
    pub photon_energy: Option<PhotonEnergy>,
    /// Multiplier applied to the photon energy.
    pub photon_energy_scale: f64,
    /// Explicit wavelength in metres.
    pub wavelength: Option<f64>,
}

impl Default for Beam {
    fn default() -> Self {
        Self {
            photon_energy: None,
            photon_energy_scale: 1.0,
            wavelength: None,
        }
    }
}

impl Beam {
    /// Fixed photon energy in eV after scaling, if known.
    #[must_use]
    pub fn photon_energy_ev(&self) -> Option<f64> {
        match self.photon_energy {
            Some(PhotonEnergy::Fixed(energy)) => Some(energy * self.photon_energy_scale),
            _ => self.wavelength.map(|lambda| HC_EV_M / lambda),
        }
    }

    /// Wavelength in metres, taken directly or derived from the photon energy.
    #[must_use]
    pub fn wavelength_m(&self) -> Option<f64> {
        if self.wavelength.is_some() {
            return self.wavelength;
        }
        match self.photon_energy {
            Some(PhotonEnergy::Fixed(energy)) if energy > 0.0 => {
                Some(HC_EV_M / (energy * self.photon_energy_scale))
            }
            _ => None,
        }
    }
}

/// Bit masks applied to external mask data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskBits {
    /// Bits that must be set for a pixel to be good.
    pub good: u64,
    /// Bits that mark a pixel as bad.
    pub bad: u64,
}

/// Coordinate ranges of a bad region. All bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BadExtent {
    /// Absolute raw-array indices.
    Raw {
        min_fs: usize,
        max_fs: usize,
        min_ss: usize,
        max_ss: usize,
    },
    /// Lab-frame coordinates in pixel units. Missing bounds are unbounded.
    Lab {
        min_x: Option<f64>,
        max_x: Option<f64>,
        min_y: Option<f64>,
        max_y: Option<f64>,
    },
}

/// A region of the detector excluded from use.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BadRegion {
    /// Region name.
    pub name: String,
    /// Restrict the region to a single panel.
    pub panel: Option<String>,
    /// Coordinate ranges.
    pub extent: BadExtent,
}

impl BadRegion {
    /// Returns true if a pixel of `panel` at raw address `(ss, fs)` and
    /// lab position `(x_px, y_px)` (pixel units) falls in this region.
    #[must_use]
    pub fn contains(&self, panel: &str, ss: usize, fs: usize, x_px: f64, y_px: f64) -> bool {
        if self.panel.as_deref().is_some_and(|name| name != panel) {
            return false;
        }
        match self.extent {
            BadExtent::Raw {
                min_fs,
                max_fs,
                min_ss,
                max_ss,
            } => (min_fs..=max_fs).contains(&fs) && (min_ss..=max_ss).contains(&ss),
            BadExtent::Lab {
                min_x,
                max_x,
                min_y,
                max_y,
            } => {
                min_x.is_none_or(|v| x_px >= v)
                    && max_x.is_none_or(|v| x_px <= v)
                    && min_y.is_none_or(|v| y_px >= v)
                    && max_y.is_none_or(|v| y_px <= v)
            }
        }
    }
}

/// A panel corner at an extreme distance from the optical axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtremePixel {
    /// Panel holding the corner.
    pub panel: String,
    /// Panel-relative fast-scan index of the corner, `0` or the panel width.
    pub fs: usize,
    /// Panel-relative slow-scan index of the corner, `0` or the panel height.
    pub ss: usize,
    /// In-plane distance from the optical axis in metres.
    pub distance: f64,
}

/// Nearest and furthest panel corners of a geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtremePixels {
    /// Corner closest to the optical axis.
    pub nearest: ExtremePixel,
    /// Corner furthest from the optical axis.
    pub furthest: ExtremePixel,
}

/// Full detector description.
///
/// Constructed once, immutable afterwards. Construction validates every
/// panel, rejects duplicate names and overlapping raw extents.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    panels: Vec<Panel>,
    beam: Beam,
    beam_center: Option<[f64; 2]>,
    mask_bits: MaskBits,
    bad_regions: Vec<BadRegion>,
    rigid_groups: BTreeMap<String, Vec<String>>,
    rigid_group_collections: BTreeMap<String, Vec<String>>,
    peak_info_location: Option<String>,
}

impl Geometry {
    /// Creates a geometry from panels in declaration order.
    ///
    /// # Errors
    /// Returns [`Error::EmptyGeometry`] without panels, the panel's own
    /// validation error, [`Error::DuplicatePanel`],
    /// [`Error::RawShapeTooLarge`] or [`Error::OverlappingPanels`].
    pub fn new(panels: Vec<Panel>) -> Result<Self> {
        if panels.is_empty() {
            return Err(Error::EmptyGeometry);
        }

        let mut names = HashSet::with_capacity(panels.len());
        for panel in &panels {
            panel.validate()?;
            if !names.insert(panel.name.as_str()) {
                return Err(Error::DuplicatePanel(panel.name.clone()));
            }
        }

        // Extents were validated, so the `+ 1` cannot overflow.
        let rows = panels.iter().map(|p| p.max_ss).max().unwrap_or(0) + 1;
        let cols = panels.iter().map(|p| p.max_fs).max().unwrap_or(0) + 1;
        if rows.checked_mul(cols).is_none_or(|cells| cells > MAX_RAW_CELLS) {
            return Err(Error::RawShapeTooLarge {
                rows,
                cols,
                max_cells: MAX_RAW_CELLS,
            });
        }

        for (i, first) in panels.iter().enumerate() {
            if let Some(second) = panels[i + 1..].iter().find(|other| first.overlaps(other)) {
                return Err(Error::OverlappingPanels {
                    first: first.name.clone(),
                    second: second.name.clone(),
                });
            }
        }

        Ok(Self {
            panels,
            beam: Beam::default(),
            beam_center: None,
            mask_bits: MaskBits::default(),
            bad_regions: Vec::new(),
            rigid_groups: BTreeMap::new(),
            rigid_group_collections: BTreeMap::new(),
            peak_info_location: None,
        })
    }

    /// Sets the beam parameters.
    #[must_use]
    pub fn with_beam(mut self, beam: Beam) -> Self {
        self.beam = beam;
        self
    }

    /// Sets the reference beam center in metres.
    #[must_use]
    pub fn with_beam_center(mut self, center: [f64; 2]) -> Self {
        self.beam_center = Some(center);
        self
    }

    /// Sets the mask bits.
    #[must_use]
    pub fn with_mask_bits(mut self, mask_bits: MaskBits) -> Self {
        self.mask_bits = mask_bits;
        self
    }

    /// Sets the location of per-event peak lists in the data source.
    #[must_use]
    pub fn with_peak_info_location(mut self, location: impl Into<String>) -> Self {
        self.peak_info_location = Some(location.into());
        self
    }

    /// Attaches bad regions.
    ///
    /// # Errors
    /// Returns [`Error::UnknownPanel`] if a region is restricted to a panel
    /// that does not exist.
    pub fn with_bad_regions(mut self, regions: Vec<BadRegion>) -> Result<Self> {
        for region in &regions {
            if let Some(panel) = &region.panel {
                self.require_panel(panel, || format!("bad region {}", region.name))?;
            }
        }
        self.bad_regions = regions;
        Ok(self)
    }

    /// Attaches rigid groups and rigid group collections.
    ///
    /// # Errors
    /// Returns [`Error::UnknownPanel`] for a group member that is not a panel
    /// and [`Error::UnknownRigidGroup`] for a collection member that is not a
    /// group.
    pub fn with_rigid_groups(
        mut self,
        groups: BTreeMap<String, Vec<String>>,
        collections: BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        for (group, members) in &groups {
            for member in members {
                self.require_panel(member, || format!("rigid group {group}"))?;
            }
        }
        for (collection, members) in &collections {
            if let Some(group) = members.iter().find(|m| !groups.contains_key(*m)) {
                return Err(Error::UnknownRigidGroup {
                    collection: collection.clone(),
                    group: group.clone(),
                });
            }
        }
        self.rigid_groups = groups;
        self.rigid_group_collections = collections;
        Ok(self)
    }

    fn require_panel(&self, name: &str, context: impl FnOnce() -> String) -> Result<()> {
        if self.panel(name).is_some() {
            Ok(())
        } else {
            Err(Error::UnknownPanel {
                context: context(),
                panel: name.to_string(),
            })
        }
    }

    /// Panels in declaration order.
    #[must_use]
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    /// Looks up a panel by name.
    #[must_use]
    pub fn panel(&self, name: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.name == name)
    }

    /// Beam parameters.
    #[must_use]
    pub fn beam(&self) -> &Beam {
        &self.beam
    }

    /// Reference beam center in metres, if declared.
    #[must_use]
    pub fn beam_center(&self) -> Option<[f64; 2]> {
        self.beam_center
    }

    /// Mask bits.
    #[must_use]
    pub fn mask_bits(&self) -> MaskBits {
        self.mask_bits
    }

    /// Bad regions.
    #[must_use]
    pub fn bad_regions(&self) -> &[BadRegion] {
        &self.bad_regions
    }

    /// Rigid groups by name.
    #[must_use]
    pub fn rigid_groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.rigid_groups
    }

    /// Rigid group collections by name.
    #[must_use]
    pub fn rigid_group_collections(&self) -> &BTreeMap<String, Vec<String>> {
        &self.rigid_group_collections
    }

    /// Location of per-event peak lists in the data source, if declared.
    #[must_use]
    pub fn peak_info_location(&self) -> Option<&str> {
        self.peak_info_location.as_deref()
    }

    /// Panel corners nearest to and furthest from the optical axis.
    ///
    /// Each panel is evaluated at its four outer corners, indices `0` and
    /// the panel width or height along each axis. Distances ignore the
    /// beam center.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn extreme_pixels(&self) -> ExtremePixels {
        let mut nearest: Option<ExtremePixel> = None;
        let mut furthest: Option<ExtremePixel> = None;
        for panel in &self.panels {
            let (w, h) = (panel.width(), panel.height());
            for (fs, ss) in [(0, 0), (w, 0), (0, h), (w, h)] {
                let p = panel.position_px(fs as f64, ss as f64);
                let distance = p.x.hypot(p.y) * panel.pixel_pitch();
                let corner = || ExtremePixel {
                    panel: panel.name.clone(),
                    fs,
                    ss,
                    distance,
                };
                if furthest.as_ref().is_none_or(|f| distance > f.distance) {
                    furthest = Some(corner());
                }
                if nearest.as_ref().is_none_or(|n| distance < n.distance) {
                    nearest = Some(corner());
                }
            }
        }
        let fallback = || ExtremePixel {
            panel: String::new(),
            fs: 0,
            ss: 0,
            distance: 0.0,
        };
        ExtremePixels {
            nearest: nearest.unwrap_or_else(fallback),
            furthest: furthest.unwrap_or_else(fallback),
        }
    }

    /// Shape `(rows, cols)` of the raw data array described by the panels.
    #[must_use]
    pub fn raw_shape(&self) -> (usize, usize) {
        let rows = self.panels.iter().map(|p| p.max_ss).max().unwrap_or(0) + 1;
        let cols = self.panels.iter().map(|p| p.max_fs).max().unwrap_or(0) + 1;
        (rows, cols)
    }

    /// Number of raw addresses covered by panels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.panels.iter().map(|p| p.width() * p.height()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_panels() -> Vec<Panel> {
        vec![
            Panel::new("q0", (0, 9), (0, 4)),
            Panel::new("q1", (0, 9), (5, 9)),
        ]
    }

    #[test]
    fn test_geometry_raw_shape() {
        let geometry = Geometry::new(two_panels()).unwrap();
        assert_eq!(geometry.raw_shape(), (10, 10));
        assert_eq!(geometry.pixel_count(), 100);
        assert!(geometry.panel("q1").is_some());
        assert!(geometry.panel("q2").is_none());
    }

    #[test]
    fn test_empty_geometry() {
        assert_eq!(Geometry::new(Vec::new()), Err(Error::EmptyGeometry));
    }

    #[test]
    fn test_overlap_rejected() {
        let panels = vec![
            Panel::new("a", (0, 9), (0, 4)),
            Panel::new("b", (5, 14), (4, 8)),
        ];
        assert_eq!(
            Geometry::new(panels),
            Err(Error::OverlappingPanels {
                first: "a".into(),
                second: "b".into()
            })
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let panels = vec![
            Panel::new("a", (0, 9), (0, 4)),
            Panel::new("a", (0, 9), (5, 9)),
        ];
        assert_eq!(
            Geometry::new(panels),
            Err(Error::DuplicatePanel("a".into()))
        );
    }

    #[test]
    fn test_raw_shape_too_large() {
        let panels = vec![Panel::new("huge", (0, 1 << 20), (0, 1 << 20))];
        assert!(matches!(
            Geometry::new(panels),
            Err(Error::RawShapeTooLarge { .. })
        ));

        let unbounded = vec![Panel::new("edge", (0, usize::MAX - 1), (0, 1))];
        assert!(matches!(
            Geometry::new(unbounded),
            Err(Error::RawShapeTooLarge { .. })
        ));

        let panels = vec![Panel::new("max", (0, usize::MAX), (0, 0))];
        assert!(matches!(
            Geometry::new(panels),
            Err(Error::InvalidExtent { .. })
        ));
    }

    #[test]
    fn test_extreme_pixels() {
        let panels = vec![
            Panel::new("inner", (0, 1), (0, 1)).with_corner(1.0, 0.0),
            Panel::new("outer", (0, 1), (2, 3)).with_corner(10.0, 0.0),
        ];
        let extremes = Geometry::new(panels).unwrap().extreme_pixels();

        assert_eq!(extremes.nearest.panel, "inner");
        assert_eq!((extremes.nearest.fs, extremes.nearest.ss), (0, 0));
        assert_relative_eq!(extremes.nearest.distance, 1.0);

        assert_eq!(extremes.furthest.panel, "outer");
        assert_eq!((extremes.furthest.fs, extremes.furthest.ss), (2, 2));
        assert_relative_eq!(extremes.furthest.distance, 12.0_f64.hypot(2.0));
    }

    #[test]
    fn test_peak_info_location() {
        let geometry = Geometry::new(two_panels()).unwrap();
        assert!(geometry.peak_info_location().is_none());
        let geometry = geometry.with_peak_info_location("/data/peakinfo");
        assert_eq!(geometry.peak_info_location(), Some("/data/peakinfo"));
    }

    #[test]
    fn test_rigid_group_validation() {
        let geometry = Geometry::new(two_panels()).unwrap();
        let mut groups = BTreeMap::new();
        groups.insert("quad".to_string(), vec!["q0".to_string(), "q1".to_string()]);
        let mut collections = BTreeMap::new();
        collections.insert("all".to_string(), vec!["quad".to_string()]);
        assert!(geometry
            .clone()
            .with_rigid_groups(groups.clone(), collections)
            .is_ok());

        let mut bad_collections = BTreeMap::new();
        bad_collections.insert("all".to_string(), vec!["asics".to_string()]);
        assert!(matches!(
            geometry.clone().with_rigid_groups(groups, bad_collections),
            Err(Error::UnknownRigidGroup { .. })
        ));

        let mut bad_groups = BTreeMap::new();
        bad_groups.insert("quad".to_string(), vec!["q7".to_string()]);
        assert!(matches!(
            geometry.with_rigid_groups(bad_groups, BTreeMap::new()),
            Err(Error::UnknownPanel { .. })
        ));
    }

    #[test]
    fn test_bad_region_contains() {
        let raw = BadRegion {
            name: "bad_row".into(),
            panel: Some("q0".into()),
            extent: BadExtent::Raw {
                min_fs: 0,
                max_fs: 9,
                min_ss: 2,
                max_ss: 2,
            },
        };
        assert!(raw.contains("q0", 2, 5, 0.0, 0.0));
        assert!(!raw.contains("q1", 2, 5, 0.0, 0.0));
        assert!(!raw.contains("q0", 3, 5, 0.0, 0.0));

        let lab = BadRegion {
            name: "bad_beamstop".into(),
            panel: None,
            extent: BadExtent::Lab {
                min_x: Some(-5.0),
                max_x: Some(5.0),
                min_y: None,
                max_y: Some(0.0),
            },
        };
        assert!(lab.contains("q1", 0, 0, 0.0, -100.0));
        assert!(!lab.contains("q1", 0, 0, 0.0, 1.0));
        assert!(!lab.contains("q1", 0, 0, 6.0, -1.0));
    }

    #[test]
    fn test_beam_wavelength() {
        let beam = Beam {
            photon_energy: Some(PhotonEnergy::Fixed(9_500.0)),
            ..Beam::default()
        };
        assert_relative_eq!(beam.wavelength_m().unwrap(), 1.305_096_8e-10, max_relative = 1e-6);

        let from_data = Beam {
            photon_energy: Some(PhotonEnergy::FromData("/LCLS/photon_energy_eV".into())),
            ..Beam::default()
        };
        assert!(from_data.wavelength_m().is_none());
        assert!(from_data.photon_energy_ev().is_none());
    }
}
