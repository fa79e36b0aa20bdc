//! CrystFEL geometry file parser.

use std::collections::{BTreeMap, HashMap};

use geompix_core::{Beam, Geometry, MaskBits, Panel, PhotonEnergy};

use crate::draft::{BadRegionDraft, Field, Location, PanelDraft};
use crate::{Error, Result};

/// Configuration for the geometry parser.
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    /// Reject keys the parser does not recognize instead of ignoring them.
    pub strict: bool,
}

impl ParserConfig {
    /// Creates a new parser configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether unknown keys are errors.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Parser for the line-oriented `key = value` geometry format.
#[derive(Debug, Clone, Default)]
pub struct GeometryParser {
    config: ParserConfig,
}

impl GeometryParser {
    /// Creates a new parser with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new parser with the given configuration.
    #[must_use]
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Returns the parser configuration.
    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses geometry text.
    ///
    /// # Errors
    /// Returns syntax, value and missing-attribute errors with their line
    /// or panel, and structural errors raised while building the geometry.
    pub fn parse(&self, source: &str) -> Result<Geometry> {
        let mut state = ParseState::default();

        for (index, raw_line) in source.lines().enumerate() {
            let line = index + 1;
            let Some((key, value)) = split_line(raw_line, line)? else {
                continue;
            };
            let at = Location {
                line,
                key: &key,
                value: &value,
            };
            let field = match key.split_once('/') {
                Some((owner, attr)) => {
                    if owner.is_empty() || attr.is_empty() || attr.contains('/') {
                        return Err(Error::Syntax {
                            line,
                            text: raw_line.trim().to_string(),
                        });
                    }
                    if owner.starts_with("bad") {
                        state.bad_region(owner).set(attr, &at)?
                    } else {
                        state.panel(owner).set(attr, &at)?
                    }
                }
                None => state.toplevel(&key, &at)?,
            };

            if field == Field::Unknown {
                if self.config.strict {
                    return Err(Error::UnknownKey { line, key });
                }
                log::debug!("line {line}: ignoring unknown key {key}");
            }
        }

        state.finish()
    }
}

/// Strips comments and splits a line into key and value.
///
/// Returns `None` for blank and comment lines. Whitespace is removed from
/// the value.
fn split_line(raw_line: &str, line: usize) -> Result<Option<(String, String)>> {
    let content = raw_line.split(';').next().unwrap_or_default().trim();
    if content.is_empty() || content.starts_with('#') {
        return Ok(None);
    }

    let syntax = || Error::Syntax {
        line,
        text: content.to_string(),
    };
    let (key, value) = content.split_once('=').ok_or_else(syntax)?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(syntax());
    }
    let value: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(Some((key.to_string(), value)))
}

/// Parses a mask bit pattern: `0x`-prefixed hex, decimal, or bare hex.
fn parse_mask_bits(at: &Location<'_>) -> Result<u64> {
    let value = at.value;
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value
            .parse::<u64>()
            .or_else(|_| u64::from_str_radix(value, 16)),
    };
    parsed.map_err(|e| at.invalid(e.to_string()))
}

/// Checks that every panel uses the same number of event placeholders in
/// its data layout, and in its mask location, and that masks need no
/// more placeholders than data.
fn check_placeholders(panels: &[Panel]) -> Result<()> {
    let mask_placeholders =
        |panel: &Panel| panel.mask.as_deref().map_or(0, |mask| mask.matches('%').count());
    let uniform = |count: &dyn Fn(&Panel) -> usize, what: &str| -> Result<usize> {
        let expected = panels.first().map_or(0, count);
        match panels.iter().find(|&panel| count(panel) != expected) {
            Some(panel) => Err(Error::Placeholders(format!(
                "panel {} has {} {what} placeholders, expected {expected}",
                panel.name,
                count(panel)
            ))),
            None => Ok(expected),
        }
    };

    let data = uniform(&Panel::placeholder_count, "data")?;
    let mask = uniform(&mask_placeholders, "mask")?;
    if mask > data {
        return Err(Error::Placeholders(format!(
            "masks use {mask} placeholders but data only {data}"
        )));
    }
    Ok(())
}

/// Checks that every panel's data layout has the same number of axes.
fn check_dim_lengths(panels: &[Panel]) -> Result<()> {
    let expected = panels.first().map_or(0, |p| p.dim_structure.len());
    match panels.iter().find(|p| p.dim_structure.len() != expected) {
        Some(panel) => Err(Error::DimStructure {
            panel: panel.name.clone(),
            reason: format!(
                "{} dimensions where other panels have {expected}",
                panel.dim_structure.len()
            ),
        }),
        None => Ok(()),
    }
}

fn split_members(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|member| !member.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default)]
struct ParseState {
    template: PanelDraft,
    panels: Vec<PanelDraft>,
    panel_index: HashMap<String, usize>,
    bad_regions: Vec<BadRegionDraft>,
    bad_region_index: HashMap<String, usize>,
    beam: Beam,
    beam_center_x: Option<f64>,
    beam_center_y: Option<f64>,
    mask_bits: MaskBits,
    rigid_groups: BTreeMap<String, Vec<String>>,
    rigid_group_collections: BTreeMap<String, Vec<String>>,
    peak_info_location: Option<String>,
}

impl ParseState {
    fn panel(&mut self, name: &str) -> &mut PanelDraft {
        let index = match self.panel_index.get(name) {
            Some(&index) => index,
            None => {
                self.panels
                    .push(PanelDraft::from_template(&self.template, name));
                self.panel_index
                    .insert(name.to_string(), self.panels.len() - 1);
                self.panels.len() - 1
            }
        };
        &mut self.panels[index]
    }

    fn bad_region(&mut self, name: &str) -> &mut BadRegionDraft {
        let index = match self.bad_region_index.get(name) {
            Some(&index) => index,
            None => {
                self.bad_regions.push(BadRegionDraft::new(name));
                self.bad_region_index
                    .insert(name.to_string(), self.bad_regions.len() - 1);
                self.bad_regions.len() - 1
            }
        };
        &mut self.bad_regions[index]
    }

    fn toplevel(&mut self, key: &str, at: &Location<'_>) -> Result<Field> {
        if let Some(name) = key.strip_prefix("rigid_group_collection_") {
            self.rigid_group_collections
                .insert(name.to_string(), split_members(at.value));
            return Ok(Field::Applied);
        }
        if let Some(name) = key.strip_prefix("rigid_group_") {
            self.rigid_groups
                .insert(name.to_string(), split_members(at.value));
            return Ok(Field::Applied);
        }

        match key {
            "photon_energy" => {
                self.beam.photon_energy = Some(if at.value.starts_with('/') {
                    PhotonEnergy::FromData(at.value.to_string())
                } else {
                    PhotonEnergy::Fixed(at.float()?)
                });
            }
            "photon_energy_scale" => self.beam.photon_energy_scale = at.float()?,
            "wavelength" => self.beam.wavelength = Some(at.float()?),
            "beam_center_x" => self.beam_center_x = Some(at.float()?),
            "beam_center_y" => self.beam_center_y = Some(at.float()?),
            "mask_good" => self.mask_bits.good = parse_mask_bits(at)?,
            "mask_bad" => self.mask_bits.bad = parse_mask_bits(at)?,
            "peak_info_location" => self.peak_info_location = Some(at.value.to_string()),
            _ => return self.template.set(key, at),
        }
        Ok(Field::Applied)
    }

    fn finish(self) -> Result<Geometry> {
        let beam_center = match (self.beam_center_x, self.beam_center_y) {
            (Some(x), Some(y)) => Some([x, y]),
            (None, None) => None,
            _ => return Err(Error::IncompleteBeamCenter),
        };

        let panels = self
            .panels
            .into_iter()
            .map(PanelDraft::finish)
            .collect::<Result<Vec<_>>>()?;
        check_dim_lengths(&panels)?;
        check_placeholders(&panels)?;
        let bad_regions = self
            .bad_regions
            .into_iter()
            .map(BadRegionDraft::finish)
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "parsed {} panels, {} bad regions, {} rigid groups",
            panels.len(),
            bad_regions.len(),
            self.rigid_groups.len()
        );

        let mut geometry = Geometry::new(panels)?
            .with_beam(self.beam)
            .with_mask_bits(self.mask_bits)
            .with_bad_regions(bad_regions)?
            .with_rigid_groups(self.rigid_groups, self.rigid_group_collections)?;
        if let Some(center) = beam_center {
            geometry = geometry.with_beam_center(center);
        }
        if let Some(location) = self.peak_info_location {
            geometry = geometry.with_peak_info_location(location);
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geompix_core::DimEntry;

    #[test]
    fn test_split_line() {
        assert_eq!(split_line("", 1).unwrap(), None);
        assert_eq!(split_line("   ; comment", 1).unwrap(), None);
        assert_eq!(split_line("# header", 1).unwrap(), None);
        assert_eq!(
            split_line("q0/fs = +1.0x -0.5y ; tilted", 1).unwrap(),
            Some(("q0/fs".to_string(), "+1.0x-0.5y".to_string()))
        );
        assert_eq!(
            split_line("no equals sign", 7),
            Err(Error::Syntax {
                line: 7,
                text: "no equals sign".into()
            })
        );
        assert!(split_line(" = 3", 2).is_err());
    }

    #[test]
    fn test_mask_bits() {
        let hex = Location {
            line: 1,
            key: "mask_good",
            value: "0x0001",
        };
        assert_eq!(parse_mask_bits(&hex).unwrap(), 1);
        let dec = Location {
            line: 1,
            key: "mask_bad",
            value: "24",
        };
        assert_eq!(parse_mask_bits(&dec).unwrap(), 24);
        let bare_hex = Location {
            line: 1,
            key: "mask_bad",
            value: "ffff",
        };
        assert_eq!(parse_mask_bits(&bare_hex).unwrap(), 0xffff);
        let bad = Location {
            line: 3,
            key: "mask_bad",
            value: "0xZZ",
        };
        assert!(matches!(
            parse_mask_bits(&bad),
            Err(Error::InvalidValue { line: 3, .. })
        ));
        let not_hex = Location {
            line: 4,
            key: "mask_good",
            value: "zz",
        };
        assert!(matches!(
            parse_mask_bits(&not_hex),
            Err(Error::InvalidValue { line: 4, .. })
        ));
    }

    fn panel_with(name: &str, fs: (usize, usize), dims: &[DimEntry], mask: Option<&str>) -> Panel {
        let mut panel = Panel::new(name, fs, (0, 1));
        panel.dim_structure = dims.to_vec();
        panel.mask = mask.map(str::to_string);
        panel
    }

    #[test]
    fn test_placeholder_consistency() {
        use DimEntry::{Fast, Placeholder, Slow};
        let event = [Placeholder, Slow, Fast];
        let plain = [Slow, Fast];

        let uniform = [
            panel_with("a", (0, 1), &event, Some("/mask/%")),
            panel_with("b", (2, 3), &event, Some("/mask/%")),
        ];
        assert!(check_placeholders(&uniform).is_ok());
        assert!(check_dim_lengths(&uniform).is_ok());

        let mixed_data = [
            panel_with("a", (0, 1), &event, None),
            panel_with("b", (2, 3), &[Slow, Fast, DimEntry::Index(0)], None),
        ];
        assert!(matches!(
            check_placeholders(&mixed_data),
            Err(Error::Placeholders(_))
        ));

        let mixed_masks = [
            panel_with("a", (0, 1), &event, Some("/mask/%")),
            panel_with("b", (2, 3), &event, Some("/mask/static")),
        ];
        assert!(matches!(
            check_placeholders(&mixed_masks),
            Err(Error::Placeholders(_))
        ));

        let mask_exceeds_data = [panel_with("a", (0, 1), &plain, Some("/mask/%"))];
        assert!(matches!(
            check_placeholders(&mask_exceeds_data),
            Err(Error::Placeholders(_))
        ));

        let ragged = [
            panel_with("a", (0, 1), &event, None),
            panel_with("b", (2, 3), &plain, None),
        ];
        assert!(matches!(
            check_dim_lengths(&ragged),
            Err(Error::DimStructure { .. })
        ));
    }

    #[test]
    fn test_split_members() {
        assert_eq!(split_members("q0,q1,"), vec!["q0", "q1"]);
        assert!(split_members("").is_empty());
    }

    #[test]
    fn test_strict_mode() {
        let source = "\
p0/min_fs = 0
p0/max_fs = 1
p0/min_ss = 0
p0/max_ss = 1
p0/corner_x = 0
p0/corner_y = 0
p0/res = 1
p0/fs = x
p0/ss = y
p0/made_up_key = 3
";
        assert!(GeometryParser::new().parse(source).is_ok());
        let strict = GeometryParser::with_config(ParserConfig::new().with_strict(true));
        assert!(strict.config().strict);
        assert_eq!(
            strict.parse(source).unwrap_err(),
            Error::UnknownKey {
                line: 10,
                key: "p0/made_up_key".into()
            }
        );
    }
}
