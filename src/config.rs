//! Mechanism for loading the producer configuration and the cut layouts
//!
//! Both use a simple line-oriented text format. Blank lines and everything
//! after a `#` are ignored.

use crate::{
    criterion::{Comparator, Criterion},
    gate::{Multiplicity, SecondarySelection},
    layout::CutLayout,
    numeric::{CutContainer, Float},
    selector::{
        BitSelection, CascadeSelection, ChargeMasks, ChildCut, DaughterCuts, FitVarSelection,
        PidSelection, PtCurve, TrackSelection, V0Selection, Window,
    },
    Result,
};

use eyre::{bail, ensure, eyre, Error, WrapErr};

use std::{collections::BTreeMap, fs, path::Path, str::FromStr};

/// Producer configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkimConfig {
    /// Multiplicity required for an event to be kept
    pub min: Multiplicity,

    /// Selection of tracks
    pub tracks: TrackSelection,

    /// Selection of the secondary species
    pub secondaries: SecondarySelection,
}
//
impl Default for SkimConfig {
    fn default() -> Self {
        let mut items = ConfigItems::default();
        Self::from_items(&mut items).expect("Defaults should be valid")
    }
}
//
impl SkimConfig {
    /// Load the configuration from a file and print it out
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read configuration file {}", path.display()))?;
        let config = Self::parse(&text)?;
        config.log();
        Ok(config)
    }

    /// Decode the configuration from its textual form
    pub fn parse(text: &str) -> Result<Self> {
        let mut items = ConfigItems::parse(text)?;
        let config = Self::from_items(&mut items)?;
        items.finish()?;
        Ok(config)
    }

    /// Fetch every configuration item, falling back to defaults
    fn from_items(items: &mut ConfigItems) -> Result<Self> {
        let cascade_mode = match items.take_raw("mode").unwrap_or("v0") {
            "v0" => false,
            "cascade" => true,
            other => bail!("Unknown mode {}, expected v0 or cascade", other),
        };

        // Event-level requirements
        let min = Multiplicity {
            tracks: items.take("min_tracks", 3)?,
            secondaries: items.take("min_secondaries", 0)?,
        };

        // Track selection
        let fit_var = if items.take_bool("track.dca_pt_dependent", false)? {
            FitVarSelection::PtDependent(PtCurve::default())
        } else {
            FitVarSelection::Window(Window::new(
                items.take("track.fit_var_min", -10.)?,
                items.take("track.fit_var_max", 10.)?,
            ))
        };
        // V0 mode only looks at the charge sign bit of tracks by default
        let (track_bit, track_bit_anti) = if cascade_mode {
            (5542474, 5542473)
        } else {
            (0, 1)
        };
        let tracks = TrackSelection {
            charge: ChargeMasks {
                particle: items.take_bits("track.cut_bit", track_bit)?,
                antiparticle: items.take_bits("track.cut_bit_anti", track_bit_anti)?,
            },
            pid: PidSelection {
                momentum_threshold: items.take("track.pid_threshold", 0.75)?,
                low_momentum: BitSelection::require(items.take_bits("track.tpc_bit", 4)?)
                    .rejecting(items.take_bits("track.tpc_bit_reject", 0)?),
                high_momentum: BitSelection::require(items.take_bits("track.tpctof_bit", 2)?),
            },
            pt: Window::new(
                items.take("track.pt_min", 0.)?,
                items.take("track.pt_max", 999.)?,
            ),
            eta: Window::new(
                items.take("track.eta_min", -10.)?,
                items.take("track.eta_max", 10.)?,
            ),
            fit_var,
        };

        // V0 selection, only used in V0 mode
        let v0 = V0Selection {
            mass: Window::new(
                items.take("v0.mass_min", 1.08)?,
                items.take("v0.mass_max", 1.15)?,
            ),
            anti_mass: Window::new(
                items.take("v0.anti_mass_min", 1.08)?,
                items.take("v0.anti_mass_max", 1.15)?,
            ),
        };

        // Cascade selection, only used in cascade mode
        let mut daughter_cuts = |suffix: &str| -> Result<DaughterCuts> {
            let mut child = |name: &str, cut: CutContainer, pid: CutContainer| -> Result<ChildCut> {
                Ok(ChildCut {
                    cut: items.take_bits(&format!("cascade.{}_cut_bit{}", name, suffix), cut)?,
                    pid: items.take_bits(&format!("cascade.{}_tpc_bit{}", name, suffix), pid)?,
                })
            };
            Ok(DaughterCuts {
                positive: child("child_pos", 278, 1024)?,
                negative: child("child_neg", 277, 4096)?,
                bachelor: child("child_bach", 277, 64)?,
            })
        };
        let particle_daughters = daughter_cuts("")?;
        let antiparticle_daughters = daughter_cuts("_anti")?;
        let cascade = CascadeSelection {
            charge: ChargeMasks {
                particle: items.take_bits("cascade.cut_bit", 32221874)?,
                antiparticle: items.take_bits("cascade.cut_bit_anti", 32221874)?,
            },
            pt: Window::new(
                items.take("cascade.pt_min", 0.)?,
                items.take("cascade.pt_max", 999.)?,
            ),
            eta: Window::new(
                items.take("cascade.eta_min", -10.)?,
                items.take("cascade.eta_max", 10.)?,
            ),
            mass: Window::new(
                items.take("cascade.mass_min", 1.2)?,
                items.take("cascade.mass_max", 1.4)?,
            ),
            v0_daughter_mass: Window::new(
                items.take("cascade.v0_daughter_mass_min", 0.)?,
                items.take("cascade.v0_daughter_mass_max", 999.)?,
            ),
            particle_daughters,
            antiparticle_daughters,
            use_child_cuts: items.take_bool("cascade.use_child_cuts", true)?,
            use_child_pid_cuts: items.take_bool("cascade.use_child_pid_cuts", true)?,
        };

        let secondaries = if cascade_mode {
            SecondarySelection::Cascade(cascade)
        } else {
            SecondarySelection::V0(v0)
        };

        Ok(Self {
            min,
            tracks,
            secondaries,
        })
    }

    /// Display the configuration in the log
    pub fn log(&self) {
        let mode = match self.secondaries {
            SecondarySelection::V0(_) => "v0",
            SecondarySelection::Cascade(_) => "cascade",
        };
        tracing::info!(
            mode,
            min_tracks = self.min.tracks,
            min_secondaries = self.min.secondaries,
            "producer configuration"
        );
        tracing::info!(tracks = ?self.tracks, "track selection");
        match &self.secondaries {
            SecondarySelection::V0(v0) => tracing::info!(?v0, "V0 selection"),
            SecondarySelection::Cascade(cascade) => tracing::info!(?cascade, "cascade selection"),
        }
    }
}

/// Raw configuration items, indexed by name
#[derive(Default)]
struct ConfigItems<'data> {
    items: BTreeMap<&'data str, ConfigItem<'data>>,
}
//
impl<'data> ConfigItems<'data> {
    /// Split a configuration file into items
    fn parse(text: &'data str) -> Result<Self> {
        let mut items = BTreeMap::new();
        for (line_no, line) in significant_lines(text) {
            let mut words = line.split_whitespace();
            let (Some(name), Some(data), None) = (words.next(), words.next(), words.next()) else {
                bail!("Line {}: expected `name value`, got `{}`", line_no, line);
            };
            let previous = items.insert(name, ConfigItem::new(name, data));
            ensure!(
                previous.is_none(),
                "Line {}: {} is configured twice",
                line_no,
                name
            );
        }
        Ok(Self { items })
    }

    /// Fetch the raw text of an item, if it was configured
    fn take_raw(&mut self, name: &str) -> Option<&'data str> {
        self.items.remove(name).map(|item| item.data)
    }

    /// Fetch and parse an item, or use a default value
    fn take<T: FromStr>(&mut self, name: &str, default: T) -> Result<T>
    where
        <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
    {
        self.items
            .remove(name)
            .map_or(Ok(default), ConfigItem::parse)
    }

    /// Fetch and parse a boolean item, or use a default value
    fn take_bool(&mut self, name: &str, default: bool) -> Result<bool> {
        self.items
            .remove(name)
            .map_or(Ok(default), ConfigItem::parse_bool)
    }

    /// Fetch and parse a bitmask item, or use a default value
    fn take_bits(&mut self, name: &str, default: CutContainer) -> Result<CutContainer> {
        self.items
            .remove(name)
            .map_or(Ok(default), ConfigItem::parse_bits)
    }

    /// Check that every item has been used
    fn finish(self) -> Result<()> {
        if let Some(name) = self.items.keys().next() {
            bail!("Unknown configuration item {}", name);
        }
        Ok(())
    }
}

/// A value from the configuration file, tagged with the name of the setting
/// which it is supposed to configure for error reporting purposes.
struct ConfigItem<'data> {
    name: &'data str,
    data: &'data str,
}
//
impl<'data> ConfigItem<'data> {
    /// Build a config item from a setting name and raw data
    fn new(name: &'data str, data: &'data str) -> Self {
        Self { name, data }
    }

    /// Parse this data using Rust's standard parsing logic
    fn parse<T: FromStr>(self) -> Result<T>
    where
        <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
    {
        self.data
            .parse::<T>()
            .map_err(Error::new)
            .wrap_err_with(|| format!("Could not parse configuration of {}", self.name))
    }

    /// Parse a boolean, also accepting yes/no and on/off
    fn parse_bool(self) -> Result<bool> {
        match self.data.to_lowercase().as_str() {
            "yes" | "on" => Ok(true),
            "no" | "off" => Ok(false),
            _ => self.parse::<bool>(),
        }
    }

    /// Parse a bitmask, in decimal or with a 0x/0b prefix
    fn parse_bits(self) -> Result<CutContainer> {
        let parsed = if let Some(hex) = self.data.strip_prefix("0x") {
            CutContainer::from_str_radix(hex, 16)
        } else if let Some(bin) = self.data.strip_prefix("0b") {
            CutContainer::from_str_radix(bin, 2)
        } else {
            self.data.parse::<CutContainer>()
        };
        parsed
            .map_err(Error::new)
            .wrap_err_with(|| format!("Could not parse bitmask configuration of {}", self.name))
    }
}

/// Iterate over non-blank lines with comments stripped, with line numbers
fn significant_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().filter_map(|(idx, line)| {
        let line = line.split('#').next().unwrap_or("").trim();
        (!line.is_empty()).then_some((idx + 1, line))
    })
}

/// Load cut layouts from a file
pub fn load_layouts(path: impl AsRef<Path>) -> Result<Vec<CutLayout>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read cut layout file {}", path.display()))?;
    parse_layouts(&text).wrap_err_with(|| format!("Invalid cut layout file {}", path.display()))
}

/// Decode cut layouts from their textual form
///
/// ```text
/// species track
/// criterion sign  equal    -1 1
/// criterion pt    greater  0.4 0.5 0.6
/// criterion eta   abs-less level 0.7 0.8 0.9
/// criterion dca   pt-curve curve=0.0105,0.035,1.1 1 2 3
/// ```
///
/// Options (`level`, `unordered`, `curve=...`) go between the comparator and
/// the thresholds.
///
pub fn parse_layouts(text: &str) -> Result<Vec<CutLayout>> {
    let mut layouts = Vec::new();
    let mut current: Option<(String, Vec<Criterion>)> = None;
    for (line_no, line) in significant_lines(text) {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("species") => {
                let name = words
                    .next()
                    .ok_or_else(|| eyre!("Line {}: species needs a name", line_no))?;
                if let Some((species, criteria)) = current.take() {
                    layouts.push(CutLayout::new(species, criteria)?);
                }
                current = Some((name.to_owned(), Vec::new()));
            }
            Some("criterion") => {
                let (_, criteria) = current
                    .as_mut()
                    .ok_or_else(|| eyre!("Line {}: criterion outside of a species", line_no))?;
                let criterion = parse_criterion(words)
                    .wrap_err_with(|| format!("Line {}: invalid criterion", line_no))?;
                criteria.push(criterion);
            }
            Some(other) => bail!("Line {}: unexpected keyword {}", line_no, other),
            None => unreachable!("Blank lines are filtered out"),
        }
    }
    if let Some((species, criteria)) = current {
        layouts.push(CutLayout::new(species, criteria)?);
    }
    Ok(layouts)
}

/// Decode the part of a criterion line after the `criterion` keyword
fn parse_criterion<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<Criterion> {
    let name = words.next().ok_or_else(|| eyre!("Missing criterion name"))?;
    let comparator = words
        .next()
        .ok_or_else(|| eyre!("Missing comparator of criterion {}", name))?;
    let mut level = false;
    let mut unordered = false;
    let mut curve = None;
    let mut thresholds = Vec::new();
    for word in words {
        match word {
            "level" => level = true,
            "unordered" => unordered = true,
            _ if word.starts_with("curve=") => {
                let params = word["curve=".len()..]
                    .split(',')
                    .map(|p| p.parse::<Float>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .wrap_err_with(|| format!("Invalid curve of criterion {}", name))?;
                let &[offset, scale, exponent] = params.as_slice() else {
                    bail!("Curve of criterion {} needs 3 parameters", name);
                };
                curve = Some(PtCurve {
                    offset,
                    scale,
                    exponent,
                });
            }
            _ => thresholds.push(
                word.parse::<Float>()
                    .wrap_err_with(|| format!("Invalid threshold {} of criterion {}", word, name))?,
            ),
        }
    }
    let comparator = match comparator {
        "equal" => Comparator::Equal,
        "greater" => Comparator::GreaterThan,
        "abs-less" => Comparator::AbsLessThan,
        "pt-curve" => {
            let curve = curve.unwrap_or_default();
            Comparator::PtCurve {
                offset: curve.offset,
                scale: curve.scale,
                exponent: curve.exponent,
            }
        }
        other => bail!("Unknown comparator {} of criterion {}", other, name),
    };
    let mut criterion = Criterion::new(name, comparator, thresholds);
    if unordered {
        criterion = criterion.non_monotonic();
    }
    if level {
        criterion = criterion.level_packed();
    }
    Ok(criterion)
}
