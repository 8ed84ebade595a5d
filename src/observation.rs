//! In-memory CAOM-2 observation that blueprints are applied to.
//!
//! Each level keeps its elements as dotted-path fields relative to that
//! level (`telescope.name`, `provenance.inputs`, `energy.axis.function.delta`).
//! Planes and artifacts keep the order in which they were first seen.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationLevel {
    Raw,
    Calibrated,
    Product,
}

impl CalibrationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationLevel::Raw => "raw",
            CalibrationLevel::Calibrated => "calibrated",
            CalibrationLevel::Product => "product",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Data,
    Meta,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Data => "data",
            ReleaseType::Meta => "meta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataProductType {
    Image,
    Cube,
    Catalog,
}

impl DataProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataProductType::Image => "image",
            DataProductType::Cube => "cube",
            DataProductType::Catalog => "catalog",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Science,
    Auxiliary,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Science => "science",
            ProductType::Auxiliary => "auxiliary",
        }
    }
}

/// Fields holding timestamps, by path relative to their level
const DATE_FIELDS: &[&str] = &["metaRelease", "dataRelease", "provenance.lastExecuted"];

/// Fields that identify a level and are never copied from a plan
const IDENTITY_FIELDS: &[&str] = &["observationID", "collection", "productID", "uri"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Chunk {
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub uri: String,
    pub fields: BTreeMap<String, String>,
    pub chunk: Chunk,
}

impl Artifact {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            fields: BTreeMap::new(),
            chunk: Chunk::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plane {
    pub product_id: String,
    pub fields: BTreeMap<String, String>,
    pub artifacts: Vec<Artifact>,
}

impl Plane {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            fields: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn artifact(&self, uri: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.uri == uri)
    }

    fn artifact_mut(&mut self, uri: &str) -> &mut Artifact {
        match self.artifacts.iter().position(|a| a.uri == uri) {
            Some(i) => &mut self.artifacts[i],
            None => {
                self.artifacts.push(Artifact::new(uri));
                let last = self.artifacts.len() - 1;
                &mut self.artifacts[last]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub collection: String,
    pub observation_id: String,
    pub algorithm: String,
    pub fields: BTreeMap<String, String>,
    pub planes: Vec<Plane>,
}

impl Observation {
    /// A simple (single exposure) observation
    pub fn simple(collection: impl Into<String>, observation_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            observation_id: observation_id.into(),
            algorithm: "exposure".to_string(),
            fields: BTreeMap::new(),
            planes: Vec::new(),
        }
    }

    pub fn plane(&self, product_id: &str) -> Option<&Plane> {
        self.planes.iter().find(|p| p.product_id == product_id)
    }

    fn plane_mut(&mut self, product_id: &str) -> &mut Plane {
        match self.planes.iter().position(|p| p.product_id == product_id) {
            Some(i) => &mut self.planes[i],
            None => {
                self.planes.push(Plane::new(product_id));
                let last = self.planes.len() - 1;
                &mut self.planes[last]
            }
        }
    }

    /// Merge a resolved blueprint into the observation.
    ///
    /// The plane `product_id` and its artifact `artifact_uri` are created if
    /// needed. Values already present are replaced, so the last file
    /// processed wins for shared fields.
    pub fn augment(&mut self, plan: &BTreeMap<String, String>, artifact_uri: &str, product_id: &str) {
        if let Some(id) = plan.get("Observation.observationID") {
            if *id != self.observation_id {
                debug!(
                    "Blueprint observationID {} differs from {}, keeping the latter",
                    id, self.observation_id
                );
            }
        }

        let plane = self.plane_mut(product_id);
        let mut observation_fields = Vec::new();
        for (key, value) in plan {
            let Some((level, path)) = key.split_once('.') else {
                warn!("Ignoring blueprint key without a level: {}", key);
                continue;
            };
            if IDENTITY_FIELDS.contains(&path) {
                continue;
            }
            let value = normalize_value(path, value);
            match level {
                "Observation" => observation_fields.push((path.to_string(), value)),
                "Plane" => {
                    plane.fields.insert(path.to_string(), value);
                }
                "Artifact" => {
                    plane
                        .artifact_mut(artifact_uri)
                        .fields
                        .insert(path.to_string(), value);
                }
                "Chunk" => {
                    plane
                        .artifact_mut(artifact_uri)
                        .chunk
                        .fields
                        .insert(path.to_string(), value);
                }
                other => warn!("Ignoring blueprint key with unknown level {}: {}", other, key),
            }
        }

        // An artifact exists even when no Artifact/Chunk key resolved
        plane.artifact_mut(artifact_uri);
        self.fields.extend(observation_fields);
    }
}

fn normalize_value(path: &str, value: &str) -> String {
    if !DATE_FIELDS.contains(&path) {
        return value.to_string();
    }
    match normalize_date(value) {
        Some(normalized) => normalized,
        None => {
            warn!("Keeping unparseable date for {}: {}", path, value);
            value.to_string()
        }
    }
}

/// Normalise a FITS date to the CAOM form `YYYY-MM-DDTHH:MM:SS.sss`
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];

    let datetime = FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            // Old-style DD/MM/YY dates
            NaiveDate::parse_from_str(value, "%d/%m/%y")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    Some(datetime.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
}
