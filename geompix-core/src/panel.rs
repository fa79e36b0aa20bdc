//! Detector panels.

use crate::vector::Vec3;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Distance from the interaction point to the detector plane.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CameraLength {
    /// Fixed distance in metres.
    Fixed(f64),
    /// Location of a per-event value in the data source.
    FromData(String),
}

/// Detector gain expressed per panel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AduScale {
    /// Detector units per electron-volt of deposited energy.
    PerEv(f64),
    /// Detector units per detected photon.
    PerPhoton(f64),
}

/// Raw-array direction along which bad rows are flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BadRowDirection {
    /// Along the fast-scan axis.
    Fast,
    /// Along the slow-scan axis.
    Slow,
    /// No bad-row handling.
    #[default]
    None,
}

/// One axis of the data-source layout of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DimEntry {
    /// Slow-scan axis of the panel.
    Slow,
    /// Fast-scan axis of the panel.
    Fast,
    /// Axis indexed by the event.
    Placeholder,
    /// Axis fixed at this index.
    Index(usize),
}

/// A rectangular sub-region of the detector read out as a contiguous block of
/// the raw data array.
///
/// Raw extents are inclusive. The physical position of the pixel at raw
/// address `(ss, fs)` is
///
/// ```text
/// p = corner + (fs - min_fs) * fs_vector + (ss - min_ss) * ss_vector   (pixel units)
/// x = p.x * pitch,  y = p.y * pitch,  z = clen + coffset + p.z * pitch
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Panel {
    /// Unique panel name.
    pub name: String,
    /// First raw column (fast-scan index).
    pub min_fs: usize,
    /// Last raw column, inclusive.
    pub max_fs: usize,
    /// First raw row (slow-scan index).
    pub min_ss: usize,
    /// Last raw row, inclusive.
    pub max_ss: usize,
    /// Resolution in pixels per metre.
    pub res: f64,
    /// In-plane position of the first pixel, in pixel units.
    pub corner_x: f64,
    /// In-plane position of the first pixel, in pixel units.
    pub corner_y: f64,
    /// Camera length, if known.
    pub clen: Option<CameraLength>,
    /// Additional offset added to the camera length, in metres.
    pub coffset: f64,
    /// Displacement per raw column step.
    pub fs: Vec3,
    /// Displacement per raw row step.
    pub ss: Vec3,
    /// Detector gain.
    pub adu_scale: Option<AduScale>,
    /// Saturation value in detector units.
    pub max_adu: f64,
    /// Location of the panel data in the data source.
    pub data: Option<String>,
    /// Location of the panel mask in the data source.
    pub mask: Option<String>,
    /// File holding the panel mask.
    pub mask_file: Option<String>,
    /// Rigid group label.
    pub rigid_group: Option<String>,
    /// Exclude the panel from indexing.
    pub no_index: bool,
    /// Bad-row direction.
    pub badrow: BadRowDirection,
    /// Layout of the panel data in the data source, outermost axis first.
    pub dim_structure: Vec<DimEntry>,
    /// Direction along which the detector moves when the camera length
    /// changes.
    pub rail_direction: Vec3,
    /// Camera length at which the beam was centered, in metres.
    pub clen_for_centering: f64,
    /// Location of the per-pixel saturation map in the data source.
    pub saturation_map: Option<String>,
    /// File holding the saturation map.
    pub saturation_map_file: Option<String>,
}

impl Panel {
    /// Creates a panel with an identity orientation and no metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, fs_range: (usize, usize), ss_range: (usize, usize)) -> Self {
        Self {
            name: name.into(),
            min_fs: fs_range.0,
            max_fs: fs_range.1,
            min_ss: ss_range.0,
            max_ss: ss_range.1,
            res: 1.0,
            corner_x: 0.0,
            corner_y: 0.0,
            clen: None,
            coffset: 0.0,
            fs: Vec3::X,
            ss: Vec3::Y,
            adu_scale: None,
            max_adu: f64::INFINITY,
            data: None,
            mask: None,
            mask_file: None,
            rigid_group: None,
            no_index: false,
            badrow: BadRowDirection::None,
            dim_structure: vec![DimEntry::Slow, DimEntry::Fast],
            rail_direction: Vec3::Z,
            clen_for_centering: 0.0,
            saturation_map: None,
            saturation_map_file: None,
        }
    }

    /// Sets the corner offset in pixel units.
    #[must_use]
    pub fn with_corner(mut self, x: f64, y: f64) -> Self {
        self.corner_x = x;
        self.corner_y = y;
        self
    }

    /// Sets the fast-scan and slow-scan vectors.
    #[must_use]
    pub fn with_scan_vectors(mut self, fs: Vec3, ss: Vec3) -> Self {
        self.fs = fs;
        self.ss = ss;
        self
    }

    /// Sets the resolution in pixels per metre.
    #[must_use]
    pub fn with_res(mut self, res: f64) -> Self {
        self.res = res;
        self
    }

    /// Sets the camera length.
    #[must_use]
    pub fn with_clen(mut self, clen: f64) -> Self {
        self.clen = Some(CameraLength::Fixed(clen));
        self
    }

    /// Physical size of one pixel in metres.
    #[inline]
    #[must_use]
    pub fn pixel_pitch(&self) -> f64 {
        1.0 / self.res
    }

    /// Number of raw columns.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.max_fs - self.min_fs + 1
    }

    /// Number of raw rows.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.max_ss - self.min_ss + 1
    }

    /// Returns true if the raw address `(ss, fs)` belongs to this panel.
    #[inline]
    #[must_use]
    pub fn contains(&self, ss: usize, fs: usize) -> bool {
        (self.min_ss..=self.max_ss).contains(&ss) && (self.min_fs..=self.max_fs).contains(&fs)
    }

    /// Returns true if the raw extents of the two panels intersect.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_fs <= other.max_fs
            && other.min_fs <= self.max_fs
            && self.min_ss <= other.max_ss
            && other.min_ss <= self.max_ss
    }

    /// Fixed camera length plus offset, in metres. Unknown lengths count as zero.
    #[must_use]
    pub fn z_offset(&self) -> f64 {
        match self.clen {
            Some(CameraLength::Fixed(clen)) => clen + self.coffset,
            _ => self.coffset,
        }
    }

    /// Position of a panel-relative index in pixel units.
    #[inline]
    #[must_use]
    pub fn position_px(&self, fs: f64, ss: f64) -> Vec3 {
        Vec3::new(self.corner_x, self.corner_y, 0.0) + self.fs * fs + self.ss * ss
    }

    /// Number of event placeholders in the data-source layout.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.dim_structure
            .iter()
            .filter(|dim| **dim == DimEntry::Placeholder)
            .count()
    }

    /// Validates extents and pitch.
    ///
    /// # Errors
    /// Returns [`Error::InvalidExtent`] for inverted ranges or a last index
    /// with no successor, and [`Error::InvalidPitch`] for a non-finite or
    /// non-positive pitch.
    pub fn validate(&self) -> Result<()> {
        if self.min_fs > self.max_fs
            || self.min_ss > self.max_ss
            || self.max_fs == usize::MAX
            || self.max_ss == usize::MAX
        {
            return Err(Error::InvalidExtent {
                panel: self.name.clone(),
                min_fs: self.min_fs,
                max_fs: self.max_fs,
                min_ss: self.min_ss,
                max_ss: self.max_ss,
            });
        }
        let pitch = self.pixel_pitch();
        if !(pitch.is_finite() && pitch > 0.0) {
            return Err(Error::InvalidPitch {
                panel: self.name.clone(),
                pitch,
            });
        }
        Ok(())
    }
}
