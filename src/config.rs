use crate::blueprint::Blueprint;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Site-specific blueprint changes loaded with `--config`.
///
/// ```toml
/// [fits]
/// "Plane.provenance.lastExecuted" = ["DATE-FTS"]
///
/// [defaults]
/// "Observation.intent" = "science"
///
/// [overrides]
/// "Plane.provenance.version" = "1"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlueprintConfig {
    /// Element -> FITS keywords to read it from
    pub fits: BTreeMap<String, Vec<String>>,
    /// Element -> fallback value
    pub defaults: BTreeMap<String, String>,
    /// Element -> literal value replacing whatever the rules derived
    pub overrides: BTreeMap<String, String>,
}

impl BlueprintConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        for key in config
            .fits
            .keys()
            .chain(config.defaults.keys())
            .chain(config.overrides.keys())
        {
            validate_key(key)?;
        }
        Ok(config)
    }

    /// Merge into a blueprint: keyword mappings, then defaults, then
    /// overrides
    pub fn apply(&self, bp: &mut Blueprint) {
        for (key, keywords) in &self.fits {
            bp.set_fits_attribute(key, keywords.as_slice());
        }
        for (key, value) in &self.defaults {
            bp.set_default(key, value.as_str());
        }
        for (key, value) in &self.overrides {
            bp.set(key, value.as_str());
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    match key.split_once('.') {
        Some(("Observation" | "Plane" | "Artifact" | "Part" | "Chunk", rest)) if !rest.is_empty() => {
            Ok(())
        }
        _ => anyhow::bail!("'{}' is not a CAOM-2 element path", key),
    }
}
