//! Partially specified panels and bad regions accumulated while parsing.

use geompix_core::{
    AduScale, BadExtent, BadRegion, BadRowDirection, CameraLength, DimEntry, Panel, Vec3,
};

use crate::direction::parse_direction;
use crate::{Error, Result};

/// Number of `dimN` keys a panel may declare.
const MAX_DIMS: usize = 10;

/// Outcome of applying one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Applied,
    Unknown,
}

/// Source location of a value, used for error reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Location<'a> {
    pub line: usize,
    pub key: &'a str,
    pub value: &'a str,
}

impl Location<'_> {
    pub(crate) fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidValue {
            line: self.line,
            key: self.key.to_string(),
            value: self.value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn float(&self) -> Result<f64> {
        self.value
            .parse::<f64>()
            .map_err(|e| self.invalid(e.to_string()))
    }

    pub(crate) fn index(&self) -> Result<usize> {
        self.value
            .parse::<usize>()
            .map_err(|e| self.invalid(format!("expected a non-negative integer ({e})")))
    }

    fn data_location(&self) -> Result<String> {
        if self.value.starts_with('/') {
            Ok(self.value.to_string())
        } else {
            Err(self.invalid("data location must start with '/'"))
        }
    }

    fn flag(&self) -> Result<bool> {
        match self.value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(self.invalid("expected a boolean")),
        }
    }

    fn direction(&self) -> Result<Vec3> {
        parse_direction(self.value).map_err(|reason| self.invalid(reason))
    }

    fn dim_entry(&self) -> Result<DimEntry> {
        match self.value {
            "ss" => Ok(DimEntry::Slow),
            "fs" => Ok(DimEntry::Fast),
            "%" => Ok(DimEntry::Placeholder),
            value if value.bytes().all(|b| b.is_ascii_digit()) => {
                self.index().map(DimEntry::Index)
            }
            _ => Err(self.invalid("expected ss, fs, % or an index")),
        }
    }
}

/// A panel whose required attributes may not all be known yet.
#[derive(Debug, Clone)]
pub(crate) struct PanelDraft {
    pub name: String,
    min_fs: Option<usize>,
    max_fs: Option<usize>,
    min_ss: Option<usize>,
    max_ss: Option<usize>,
    corner_x: Option<f64>,
    corner_y: Option<f64>,
    res: Option<f64>,
    fs: Option<Vec3>,
    ss: Option<Vec3>,
    clen: Option<CameraLength>,
    coffset: f64,
    adu_scale: Option<AduScale>,
    max_adu: f64,
    data: Option<String>,
    mask: Option<String>,
    mask_file: Option<String>,
    rigid_group: Option<String>,
    no_index: bool,
    badrow: BadRowDirection,
    dims: Vec<Option<DimEntry>>,
    rail_direction: Option<Vec3>,
    clen_for_centering: Option<f64>,
    saturation_map: Option<String>,
    saturation_map_file: Option<String>,
}

impl Default for PanelDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            min_fs: None,
            max_fs: None,
            min_ss: None,
            max_ss: None,
            corner_x: None,
            corner_y: None,
            res: None,
            fs: None,
            ss: None,
            clen: None,
            coffset: 0.0,
            adu_scale: None,
            max_adu: f64::INFINITY,
            data: None,
            mask: None,
            mask_file: None,
            rigid_group: None,
            no_index: false,
            badrow: BadRowDirection::None,
            dims: Vec::new(),
            rail_direction: None,
            clen_for_centering: None,
            saturation_map: None,
            saturation_map_file: None,
        }
    }
}

impl PanelDraft {
    /// Copies the template under a new name.
    pub(crate) fn from_template(template: &Self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..template.clone()
        }
    }

    /// Applies a panel attribute.
    pub(crate) fn set(&mut self, attr: &str, at: &Location<'_>) -> Result<Field> {
        match attr {
            "min_fs" => self.min_fs = Some(at.index()?),
            "max_fs" => self.max_fs = Some(at.index()?),
            "min_ss" => self.min_ss = Some(at.index()?),
            "max_ss" => self.max_ss = Some(at.index()?),
            "corner_x" => self.corner_x = Some(at.float()?),
            "corner_y" => self.corner_y = Some(at.float()?),
            "res" => self.res = Some(at.float()?),
            "pixel_pitch" => {
                let pitch = at.float()?;
                if pitch <= 0.0 {
                    return Err(at.invalid("pixel pitch must be positive"));
                }
                self.res = Some(1.0 / pitch);
            }
            "fs" => self.fs = Some(at.direction()?),
            "ss" => self.ss = Some(at.direction()?),
            "clen" => {
                self.clen = Some(match at.value.parse::<f64>() {
                    Ok(clen) => CameraLength::Fixed(clen),
                    Err(_) => CameraLength::FromData(at.value.to_string()),
                });
            }
            "coffset" => self.coffset = at.float()?,
            "adu_per_eV" => self.adu_scale = Some(AduScale::PerEv(at.float()?)),
            "adu_per_photon" => self.adu_scale = Some(AduScale::PerPhoton(at.float()?)),
            "max_adu" => self.max_adu = at.float()?,
            "data" => self.data = Some(at.data_location()?),
            "mask" => self.mask = Some(at.data_location()?),
            "mask_file" => self.mask_file = Some(at.value.to_string()),
            "rigid_group" => self.rigid_group = Some(at.value.to_string()),
            "no_index" => self.no_index = at.flag()?,
            "badrow_direction" => {
                self.badrow = match at.value {
                    "f" | "x" => BadRowDirection::Fast,
                    "s" | "y" => BadRowDirection::Slow,
                    "-" => BadRowDirection::None,
                    other => {
                        log::warn!(
                            "line {}: badrow_direction must be x, y, f, s or '-', got {other:?}; assuming '-'",
                            at.line
                        );
                        BadRowDirection::None
                    }
                };
            }
            "rail_direction" => self.rail_direction = Some(at.direction()?),
            "clen_for_centering" => self.clen_for_centering = Some(at.float()?),
            "saturation_map" => self.saturation_map = Some(at.value.to_string()),
            "saturation_map_file" => self.saturation_map_file = Some(at.value.to_string()),
            _ => match attr.strip_prefix("dim") {
                Some(index) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
                    let index = index
                        .parse::<usize>()
                        .ok()
                        .filter(|&i| i < MAX_DIMS)
                        .ok_or_else(|| {
                            at.invalid(format!("dimension index must be below {MAX_DIMS}"))
                        })?;
                    if self.dims.len() <= index {
                        self.dims.resize(index + 1, None);
                    }
                    self.dims[index] = Some(at.dim_entry()?);
                }
                _ => return Ok(Field::Unknown),
            },
        }
        Ok(Field::Applied)
    }

    /// Resolves the declared `dimN` entries, defaulting to `[ss, fs]`.
    fn dim_structure(&self) -> Result<Vec<DimEntry>> {
        if self.dims.is_empty() {
            return Ok(vec![DimEntry::Slow, DimEntry::Fast]);
        }
        let invalid = |reason: String| Error::DimStructure {
            panel: self.name.clone(),
            reason,
        };
        let dims = self
            .dims
            .iter()
            .enumerate()
            .map(|(i, dim)| dim.ok_or_else(|| invalid(format!("dimension {i} is undefined"))))
            .collect::<Result<Vec<_>>>()?;

        let count = |entry: DimEntry| dims.iter().filter(|&&d| d == entry).count();
        match (count(DimEntry::Slow), count(DimEntry::Fast), count(DimEntry::Placeholder)) {
            (1, 1, 0 | 1) => Ok(dims),
            (1, 1, found) => Err(invalid(format!(
                "at most one placeholder dimension is allowed, found {found}"
            ))),
            (1, found, _) => Err(invalid(format!(
                "exactly one fast-scan dimension is needed, found {found}"
            ))),
            (found, _, _) => Err(invalid(format!(
                "exactly one slow-scan dimension is needed, found {found}"
            ))),
        }
    }

    /// Converts into a panel, failing on the first missing required attribute.
    pub(crate) fn finish(self) -> Result<Panel> {
        let missing = |attribute| Error::MissingAttribute {
            panel: self.name.clone(),
            attribute,
        };
        let min_fs = self.min_fs.ok_or_else(|| missing("min_fs"))?;
        let max_fs = self.max_fs.ok_or_else(|| missing("max_fs"))?;
        let min_ss = self.min_ss.ok_or_else(|| missing("min_ss"))?;
        let max_ss = self.max_ss.ok_or_else(|| missing("max_ss"))?;
        let corner_x = self.corner_x.ok_or_else(|| missing("corner_x"))?;
        let corner_y = self.corner_y.ok_or_else(|| missing("corner_y"))?;
        let res = self.res.ok_or_else(|| missing("res"))?;
        let fs = self.fs.ok_or_else(|| missing("fs"))?;
        let ss = self.ss.ok_or_else(|| missing("ss"))?;
        if self.rail_direction.is_some() && self.clen_for_centering.is_none() {
            return Err(missing("clen_for_centering"));
        }
        let dim_structure = self.dim_structure()?;

        Ok(Panel {
            name: self.name,
            min_fs,
            max_fs,
            min_ss,
            max_ss,
            res,
            corner_x,
            corner_y,
            clen: self.clen,
            coffset: self.coffset,
            fs,
            ss,
            adu_scale: self.adu_scale,
            max_adu: self.max_adu,
            data: self.data,
            mask: self.mask,
            mask_file: self.mask_file,
            rigid_group: self.rigid_group,
            no_index: self.no_index,
            badrow: self.badrow,
            dim_structure,
            rail_direction: self.rail_direction.unwrap_or(Vec3::Z),
            clen_for_centering: self.clen_for_centering.unwrap_or(0.0),
            saturation_map: self.saturation_map,
            saturation_map_file: self.saturation_map_file,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BadKind {
    Raw,
    Lab,
}

/// A bad region under construction.
#[derive(Debug, Clone, Default)]
pub(crate) struct BadRegionDraft {
    pub name: String,
    panel: Option<String>,
    kind: Option<BadKind>,
    lab: [Option<f64>; 4],
    raw: [Option<usize>; 4],
}

impl BadRegionDraft {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn set_kind(&mut self, kind: BadKind) -> Result<()> {
        match self.kind {
            Some(existing) if existing != kind => Err(Error::BadRegion {
                region: self.name.clone(),
                reason: "cannot mix x/y and fs/ss ranges".to_string(),
            }),
            _ => {
                self.kind = Some(kind);
                Ok(())
            }
        }
    }

    /// Applies a bad-region attribute.
    pub(crate) fn set(&mut self, attr: &str, at: &Location<'_>) -> Result<Field> {
        let lab_slot = match attr {
            "min_x" => Some(0),
            "max_x" => Some(1),
            "min_y" => Some(2),
            "max_y" => Some(3),
            _ => None,
        };
        if let Some(slot) = lab_slot {
            self.lab[slot] = Some(at.float()?);
            self.set_kind(BadKind::Lab)?;
            return Ok(Field::Applied);
        }

        let raw_slot = match attr {
            "min_fs" => Some(0),
            "max_fs" => Some(1),
            "min_ss" => Some(2),
            "max_ss" => Some(3),
            _ => None,
        };
        if let Some(slot) = raw_slot {
            self.raw[slot] = Some(at.index()?);
            self.set_kind(BadKind::Raw)?;
            return Ok(Field::Applied);
        }

        if attr == "panel" {
            self.panel = Some(at.value.to_string());
            return Ok(Field::Applied);
        }
        Ok(Field::Unknown)
    }

    /// Converts into a bad region.
    pub(crate) fn finish(self) -> Result<BadRegion> {
        let extent = match self.kind {
            Some(BadKind::Lab) => BadExtent::Lab {
                min_x: self.lab[0],
                max_x: self.lab[1],
                min_y: self.lab[2],
                max_y: self.lab[3],
            },
            Some(BadKind::Raw) => BadExtent::Raw {
                min_fs: self.raw[0].unwrap_or(0),
                max_fs: self.raw[1].unwrap_or(0),
                min_ss: self.raw[2].unwrap_or(0),
                max_ss: self.raw[3].unwrap_or(0),
            },
            None => {
                return Err(Error::BadRegion {
                    region: self.name,
                    reason: "no coordinate ranges given".to_string(),
                })
            }
        };
        Ok(BadRegion {
            name: self.name,
            panel: self.panel,
            extent,
        })
    }
}
