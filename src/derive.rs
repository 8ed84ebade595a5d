//! CGPS/VGPS rules that turn a classified file and its headers into a
//! blueprint.
//!
//! Besides the blueprint for the file itself, every run accumulates a catalog
//! blueprint describing the auxiliary `catalog` plane built from the `fwhm`
//! text files. That state lives in [`RunContext`], which the caller threads
//! through the whole file loop.

use crate::blueprint::Blueprint;
use crate::classify::{classify, file_id_from_uri, Classification, Collection, Telescope};
use crate::error::ClassifyError;
use crate::fits::FitsHeader;
use crate::geolocation;
use crate::observation::{CalibrationLevel, DataProductType, ProductType, ReleaseType};
use crate::tables::{energy_overrides, POLARIZATION, POLARIZATION_CTYPES, POLARIZATION_REFCOORD_VAL};
use tracing::{debug, warn};

pub const PLANE_PRODUCT_ID: &str = "Plane.productID";
pub const PROVENANCE_INPUTS: &str = "Plane.provenance.inputs";
pub const CATALOG_PRODUCT_ID: &str = "catalog";

const VGPS_PRODUCER: &str = "\"VLA Galactic Plane Survey (VGPS) Consortium\"";
const IRAS_PROVENANCE_NAME: &str = "CGPS MOSAIC HIRES";

/// Fallbacks installed on both the file and the catalog blueprint
const DEFAULTS: &[(&str, &str)] = &[
    ("Observation.target.type", "field"),
    ("Plane.provenance.project", "CGPS"),
    ("Chunk.position.axis.axis1.cunit", "deg"),
    ("Chunk.position.axis.axis2.cunit", "deg"),
    ("Observation.intent", "science"),
];

/// State shared by all files of one run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    catalog: Blueprint,
    catalog_uri: Option<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifact URI of the last `fwhm` file seen, if any
    pub fn catalog_uri(&self) -> Option<&str> {
        self.catalog_uri.as_deref()
    }

    pub fn catalog_blueprint(&self) -> &Blueprint {
        &self.catalog
    }

    /// The catalog blueprint and its artifact URI, once an `fwhm` file was seen
    pub fn catalog(&self) -> Option<(&Blueprint, &str)> {
        self.catalog_uri.as_deref().map(|uri| (&self.catalog, uri))
    }
}

/// Build the blueprint for one file.
///
/// `headers` are the file's own HDU headers (empty for the headerless
/// `fwhm` text files). `image_headers` is only called for `fwhm` files and
/// must return the headers of the matching `_image` file.
pub fn draw_blueprint<F>(
    ctx: &mut RunContext,
    uri: &str,
    headers: &[FitsHeader],
    image_headers: F,
) -> Result<Blueprint, ClassifyError>
where
    F: FnOnce() -> Vec<FitsHeader>,
{
    debug!("Begin blueprint customization for CGPS {}.", uri);
    let mut bp = Blueprint::new();

    metadata_from(ctx, &mut bp, uri, headers, image_headers)?;
    set_defaults_and_overrides(&mut bp, &mut ctx.catalog);

    debug!("Blueprint customization complete for CGPS {}.", uri);
    Ok(bp)
}

fn metadata_from<F>(
    ctx: &mut RunContext,
    bp: &mut Blueprint,
    uri: &str,
    headers: &[FitsHeader],
    image_headers: F,
) -> Result<(), ClassifyError>
where
    F: FnOnce() -> Vec<FitsHeader>,
{
    let file_id = file_id_from_uri(uri);
    let class = classify(file_id)?;
    debug!(
        "telescope {:?} target {:?} product id {:?} bandpass name {:?} content {:?}",
        class.telescope, class.target, class.product_id, class.bandpass_name, class.content
    );

    bp.set_opt(PLANE_PRODUCT_ID, class.product_id.clone());
    bp.set("Artifact.releaseType", ReleaseType::Data.as_str());

    let collection = class.collection();

    // FITS files first
    let primary = headers.first().filter(|h| h.contains("INSTRUME"));
    if let Some(hdu0) = primary {
        if let Some(telescope) = class.telescope {
            structural(ctx, bp, headers, hdu0, &class, telescope, collection)?;
        }
    } else if class.content_is("fwhm") {
        if let Some(telescope) = class.telescope {
            catalog_plane(ctx, bp, uri, &class, telescope, collection, image_headers);
        }
    }

    Ok(())
}

/// Plane, artifact and chunk metadata of a file with FITS headers
fn structural(
    ctx: &mut RunContext,
    bp: &mut Blueprint,
    headers: &[FitsHeader],
    hdu0: &FitsHeader,
    class: &Classification,
    telescope: Telescope,
    collection: Collection,
) -> Result<(), ClassifyError> {
    // For CGPS the ADC_AREA header names the target better than the file
    // name does. VGPS keeps the name from the file.
    let target = match collection {
        Collection::Cgps => hdu0
            .get("ADC_AREA")
            .map(str::to_string)
            .or_else(|| class.target.clone()),
        Collection::Vgps => class.target.clone(),
    };
    let target = target.unwrap_or_default();

    set_common(bp, &mut ctx.catalog, headers, telescope, &target, collection);

    bp.set("Observation.instrument.name", telescope.as_str());
    ctx.catalog.set("Observation.instrument.name", telescope.as_str());

    // Artifact-level metadata, plus the plane-level metadata that only the
    // science artifacts determine
    let is_image = class.content_is("image");
    let product_id = class.product_id.as_deref().unwrap_or_default();

    bp.configure_position_axes(1, 2);
    if is_image {
        bp.configure_energy_axis(3);
        let overrides = energy_overrides(product_id)
            .ok_or_else(|| ClassifyError::UnknownProduct(product_id.to_string()))?;
        bp.apply_overrides(overrides);
    }

    match collection {
        Collection::Cgps => {
            if is_image {
                bp.configure_polarization_axis(4);
                bp.apply_overrides(POLARIZATION);
                if product_id == "1420MHz-QU" {
                    set_stokes_from_crval4(bp, hdu0);
                }
            } else if class.content_is("phn")
                && hdu0
                    .get("CTYPE4")
                    .is_some_and(|ctype| POLARIZATION_CTYPES.contains(&ctype))
            {
                bp.configure_polarization_axis(4);
            }
        }
        Collection::Vgps => {
            bp.configure_polarization_axis(4);
            bp.apply_overrides(POLARIZATION);
        }
    }

    if telescope.is_cgps_radio() {
        bp.set_fits_attribute("Chunk.energy.restfrq", &["OBSFREQ"]);
    } else if telescope == Telescope::Vla {
        bp.set_fits_attribute("Chunk.energy.restfrq", &["FREQ0"]);
    }
    bp.set_opt("Chunk.energy.bandpassName", class.bandpass_name.clone());

    let product_type = if collection == Collection::Vgps || is_image {
        // Content "image" in the file name does not mean the file holds an
        // image; only the axis count of the science artifact decides.
        bp.set_opt(
            "Plane.dataProductType",
            data_product_type(hdu0).map(|t| t.as_str()),
        );
        ProductType::Science
    } else {
        ProductType::Auxiliary
    };
    bp.set("Artifact.productType", product_type.as_str());

    // Axes without usable WCS were never configured and are left out of the
    // count
    bp.set("Chunk.naxis", bp.configured_axes_count().to_string());

    Ok(())
}

/// Q and U maps keep their Stokes index in CRVAL4
fn set_stokes_from_crval4(bp: &mut Blueprint, hdu0: &FitsHeader) {
    match hdu0.get_f64("CRVAL4") {
        Some(crval4) => bp.set(POLARIZATION_REFCOORD_VAL, format!("{}", crval4.floor() as i64)),
        None => warn!("1420MHz-QU image without CRVAL4, keeping the default Stokes value"),
    }
}

/// Classify the data of a science artifact by its axis count
pub fn data_product_type(hdu0: &FitsHeader) -> Option<DataProductType> {
    if !hdu0.contains("NAXIS") {
        return Some(DataProductType::Catalog);
    }
    let naxis = hdu0.get_i64("NAXIS").unwrap_or(0);
    if naxis == 2 || (naxis > 2 && hdu0.get_i64("NAXIS3") == Some(1)) {
        Some(DataProductType::Image)
    } else if naxis > 2 {
        Some(DataProductType::Cube)
    } else {
        None
    }
}

/// Headerless `fwhm` text file: a science artifact of the catalog plane whose
/// metadata comes from the matching image file
fn catalog_plane<F>(
    ctx: &mut RunContext,
    bp: &mut Blueprint,
    uri: &str,
    class: &Classification,
    telescope: Telescope,
    collection: Collection,
    image_headers: F,
) where
    F: FnOnce() -> Vec<FitsHeader>,
{
    ctx.catalog_uri = Some(uri.to_string());

    bp.set("Plane.dataProductType", DataProductType::Catalog.as_str());
    bp.set(PLANE_PRODUCT_ID, CATALOG_PRODUCT_ID);
    ctx.catalog
        .set("Plane.dataProductType", DataProductType::Catalog.as_str());
    ctx.catalog.set(PLANE_PRODUCT_ID, CATALOG_PRODUCT_ID);
    bp.set("Artifact.productType", ProductType::Science.as_str());

    let headers = image_headers();
    let target = class.target.clone().unwrap_or_default();
    set_common(bp, &mut ctx.catalog, &headers, telescope, &target, collection);

    let plane_uri = format!(
        "caom:{}/{}/{}",
        collection,
        observation_id(&target, telescope),
        class.product_id.as_deref().unwrap_or_default()
    );
    debug!("Adding {} to the catalog provenance inputs", plane_uri);
    ctx.catalog.append_value(PROVENANCE_INPUTS, &plane_uri, " ");
}

pub fn observation_id(target: &str, telescope: Telescope) -> String {
    format!("{}_{}", target, telescope).to_uppercase()
}

/// Elements that are the same for a catalog plane and every other plane
fn set_common(
    bp: &mut Blueprint,
    catalog: &mut Blueprint,
    headers: &[FitsHeader],
    telescope: Telescope,
    target: &str,
    collection: Collection,
) {
    let hdu0 = headers.first();
    let header = |keyword: &str| hdu0.and_then(|h| h.get(keyword)).map(str::to_string);

    let release = match collection {
        Collection::Cgps => header("PUB_RELD"),
        Collection::Vgps => header("DATE-OBS"),
    };

    let provenance_name = match telescope {
        t if t.is_cgps_radio() => {
            let parts: Vec<String> = [header("ADC_ARCH"), header("ADC_TYPE")]
                .into_iter()
                .flatten()
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        Telescope::Iras => Some(IRAS_PROVENANCE_NAME.to_string()),
        _ => header("ORIGIN"),
    };

    let producer = match collection {
        Collection::Cgps => header("OBSERVER"),
        Collection::Vgps => Some(VGPS_PRODUCER.to_string()),
    };

    let location = geolocation::location(telescope);
    let common: Vec<(&str, Option<String>)> = vec![
        ("Observation.observationID", Some(observation_id(target, telescope))),
        ("Observation.telescope.name", Some(telescope.as_str().to_string())),
        ("Observation.telescope.geoLocationX", location.map(|l| l.x.to_string())),
        ("Observation.telescope.geoLocationY", location.map(|l| l.y.to_string())),
        ("Observation.telescope.geoLocationZ", location.map(|l| l.z.to_string())),
        ("Observation.target.name", Some(target.to_string())),
        ("Observation.metaRelease", release.clone()),
        ("Plane.metaRelease", release.clone()),
        ("Plane.dataRelease", release),
        (
            "Plane.calibrationLevel",
            Some(CalibrationLevel::Calibrated.as_str().to_string()),
        ),
        ("Plane.provenance.name", provenance_name),
        ("Plane.provenance.producer", producer),
        (
            "Plane.provenance.reference",
            Some(collection.reference().to_string()),
        ),
    ];

    for (key, value) in common {
        bp.set_opt(key, value.clone());
        catalog.set_opt(key, value);
    }
}

fn set_defaults_and_overrides(bp: &mut Blueprint, catalog: &mut Blueprint) {
    bp.set_fits_attribute("Plane.provenance.lastExecuted", &["DATE-FTS"]);

    for (key, value) in DEFAULTS {
        bp.set_default(key, *value);
        catalog.set_default(key, *value);
    }
}
