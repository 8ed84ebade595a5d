//! Metadata blueprint: how each CAOM-2 element of an observation gets its
//! value.
//!
//! Keys are dotted element paths (`Observation.telescope.name`,
//! `Chunk.energy.axis.function.delta`, ...). A key maps either to a literal,
//! to an explicit "no value", or to a list of FITS keywords to read with an
//! optional fallback.

use crate::fits::FitsHeader;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entry {
    /// Literal value
    Value(String),
    /// Explicitly no value
    Unset,
    /// Read from the first present header keyword, else use the default
    Fits {
        keywords: Vec<String>,
        default: Option<String>,
    },
    /// Fallback only, no keyword to read
    Default(String),
}

impl Entry {
    fn resolve(&self, header: Option<&FitsHeader>) -> Option<String> {
        match self {
            Entry::Value(v) | Entry::Default(v) => Some(v.clone()),
            Entry::Unset => None,
            Entry::Fits { keywords, default } => header
                .and_then(|h| keywords.iter().find_map(|k| h.get(k)))
                .map(str::to_string)
                .or_else(|| default.clone()),
        }
    }
}

/// Which WCS axes have been configured for the chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfiguredAxes {
    pub position: Option<(usize, usize)>,
    pub energy: Option<usize>,
    pub polarization: Option<usize>,
}

impl ConfiguredAxes {
    pub fn count(&self) -> usize {
        self.position.map_or(0, |_| 2)
            + self.energy.map_or(0, |_| 1)
            + self.polarization.map_or(0, |_| 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Blueprint {
    plan: BTreeMap<String, Entry>,
    axes: ConfiguredAxes,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.plan.insert(key.to_string(), Entry::Value(value.into()));
    }

    /// Set a literal, or record "no value" for `None`
    pub fn set_opt<S: Into<String>>(&mut self, key: &str, value: Option<S>) {
        match value {
            Some(v) => self.set(key, v),
            None => self.unset(key),
        }
    }

    pub fn unset(&mut self, key: &str) {
        self.plan.insert(key.to_string(), Entry::Unset);
    }

    /// Read `key` from the given header keywords, keeping any existing default
    pub fn set_fits_attribute<S: AsRef<str>>(&mut self, key: &str, keywords: &[S]) {
        let default = match self.plan.get(key) {
            Some(Entry::Fits { default, .. }) => default.clone(),
            Some(Entry::Default(d)) => Some(d.clone()),
            _ => None,
        };
        self.plan.insert(
            key.to_string(),
            Entry::Fits {
                keywords: keywords.iter().map(|k| k.as_ref().to_string()).collect(),
                default,
            },
        );
    }

    /// Install a fallback. A literal already set for `key` is left alone.
    pub fn set_default(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.plan.get_mut(key) {
            Some(Entry::Fits { default, .. }) => *default = Some(value),
            Some(Entry::Value(_)) => {}
            Some(entry) => *entry = Entry::Default(value),
            None => {
                self.plan.insert(key.to_string(), Entry::Default(value));
            }
        }
    }

    /// Append to a literal with a separator, creating it if absent
    pub fn append_value(&mut self, key: &str, value: &str, separator: &str) {
        let joined = match self.value(key) {
            Some(existing) => format!("{}{}{}", existing, separator, value),
            None => value.to_string(),
        };
        self.set(key, joined);
    }

    /// Set several literals at once
    pub fn apply_overrides(&mut self, overrides: &[(&str, &str)]) {
        for (key, value) in overrides {
            self.set(key, *value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.plan.get(key)
    }

    /// The literal set for `key`, if it is a literal
    pub fn value(&self, key: &str) -> Option<&str> {
        match self.plan.get(key) {
            Some(Entry::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn configured_axes_count(&self) -> usize {
        self.axes.count()
    }

    pub fn configure_position_axes(&mut self, axis1: usize, axis2: usize) {
        let (i, j) = (axis1, axis2);
        self.set("Chunk.positionAxis1", i.to_string());
        self.set("Chunk.positionAxis2", j.to_string());
        self.set_fits_attribute("Chunk.position.coordsys", &["RADESYS", "RADECSYS"]);
        self.set_fits_attribute("Chunk.position.equinox", &["EQUINOX", "EPOCH"]);

        for (n, axis) in [(1, i), (2, j)] {
            self.set_fits_attribute(
                &format!("Chunk.position.axis.axis{}.ctype", n),
                &[format!("CTYPE{}", axis)],
            );
            self.set_fits_attribute(
                &format!("Chunk.position.axis.axis{}.cunit", n),
                &[format!("CUNIT{}", axis)],
            );
            self.set_fits_attribute(
                &format!("Chunk.position.axis.function.dimension.naxis{}", n),
                &[format!("ZNAXIS{}", axis), format!("NAXIS{}", axis)],
            );
            self.set_fits_attribute(
                &format!("Chunk.position.axis.function.refCoord.coord{}.pix", n),
                &[format!("CRPIX{}", axis)],
            );
            self.set_fits_attribute(
                &format!("Chunk.position.axis.function.refCoord.coord{}.val", n),
                &[format!("CRVAL{}", axis)],
            );
        }

        // CD matrix, falling back to CDELT with no rotation
        self.set_fits_attribute(
            "Chunk.position.axis.function.cd11",
            &[format!("CD{}_{}", i, i), format!("CDELT{}", i)],
        );
        self.set_fits_attribute("Chunk.position.axis.function.cd12", &[format!("CD{}_{}", i, j)]);
        self.set_default("Chunk.position.axis.function.cd12", "0.0");
        self.set_fits_attribute("Chunk.position.axis.function.cd21", &[format!("CD{}_{}", j, i)]);
        self.set_default("Chunk.position.axis.function.cd21", "0.0");
        self.set_fits_attribute(
            "Chunk.position.axis.function.cd22",
            &[format!("CD{}_{}", j, j), format!("CDELT{}", j)],
        );

        self.axes.position = Some((i, j));
    }

    pub fn configure_energy_axis(&mut self, axis: usize) {
        self.set("Chunk.energyAxis", axis.to_string());
        self.set_fits_attribute("Chunk.energy.specsys", &["SPECSYS"]);
        self.set_fits_attribute("Chunk.energy.ssysobs", &["SSYSOBS"]);
        self.set_fits_attribute("Chunk.energy.restfrq", &["RESTFRQ"]);
        self.set_fits_attribute("Chunk.energy.restwav", &["RESTWAV"]);
        self.set_fits_attribute("Chunk.energy.velosys", &["VELOSYS"]);
        self.set_fits_attribute("Chunk.energy.zsource", &["ZSOURCE"]);
        self.configure_function_axis("Chunk.energy.axis", axis);
        self.axes.energy = Some(axis);
    }

    pub fn configure_polarization_axis(&mut self, axis: usize) {
        self.set("Chunk.polarizationAxis", axis.to_string());
        self.configure_function_axis("Chunk.polarization.axis", axis);
        self.axes.polarization = Some(axis);
    }

    /// One-dimensional linear WCS axis
    fn configure_function_axis(&mut self, prefix: &str, axis: usize) {
        let entries = [
            ("axis.ctype", "CTYPE"),
            ("axis.cunit", "CUNIT"),
            ("function.naxis", "NAXIS"),
            ("function.delta", "CDELT"),
            ("function.refCoord.pix", "CRPIX"),
            ("function.refCoord.val", "CRVAL"),
        ];
        for (suffix, keyword) in entries {
            self.set_fits_attribute(
                &format!("{}.{}", prefix, suffix),
                &[format!("{}{}", keyword, axis)],
            );
        }
    }

    /// Evaluate every entry against a header; entries without a value are
    /// left out.
    pub fn resolve(&self, header: Option<&FitsHeader>) -> BTreeMap<String, String> {
        self.plan
            .iter()
            .filter_map(|(key, entry)| entry.resolve(header).map(|v| (key.clone(), v)))
            .collect()
    }
}
