use crate::config::BlueprintConfig;
use crate::fits::FitsHeader;
use crate::headers::{HeaderSource, LocalHeaderSource};
use crate::ingest::{resolve_inputs, Ingest, Input, Location};
use crate::observation::Observation;
use crate::xml;
use std::collections::HashMap;
use std::path::PathBuf;

const IMAGE_URI: &str = "ad:CGPS/CGPS_MC2_1420_MHz_I_image.fits";
const FWHM_100_URI: &str = "ad:CGPS/CGPS_MD1_100_um_fwhm.txt";
const FWHM_60_URI: &str = "ad:CGPS/CGPS_MD1_060_um_fwhm.txt";

/// Header source backed by a map of location -> headers
#[derive(Default)]
struct MemorySource {
    files: HashMap<String, Vec<FitsHeader>>,
}

impl MemorySource {
    fn with(mut self, location: &str, cards: &[(&str, &str)]) -> Self {
        let mut header = FitsHeader::new();
        for (k, v) in cards {
            header.insert(*k, *v);
        }
        self.files.insert(location.to_string(), vec![header]);
        self
    }
}

impl HeaderSource for MemorySource {
    fn fetch(&self, location: &str) -> anyhow::Result<Vec<FitsHeader>> {
        self.files
            .get(location)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file: {}", location))
    }
}

fn drao_image_cards() -> Vec<(&'static str, &'static str)> {
    vec![
        ("INSTRUME", "DRAO-ST"),
        ("NAXIS", "4"),
        ("NAXIS1", "1024"),
        ("NAXIS2", "1024"),
        ("NAXIS3", "1"),
        ("NAXIS4", "1"),
        ("CTYPE1", "GLON-CAR"),
        ("CTYPE2", "GLAT-CAR"),
        ("CDELT1", "-0.005"),
        ("CDELT2", "0.005"),
        ("OBSFREQ", "1420406000.0"),
        ("ADC_AREA", "MC2"),
        ("PUB_RELD", "2003-01-01"),
        ("OBSERVER", "CGPS Consortium"),
        ("DATE-FTS", "2002-11-20"),
    ]
}

fn remote(uri: &str) -> Input {
    Input {
        uri: uri.to_string(),
        location: Location::Remote(uri.to_string()),
    }
}

fn ingest(source: MemorySource) -> Ingest {
    Ingest::new(Box::new(LocalHeaderSource::new()), BlueprintConfig::default())
        .with_remote(Box::new(source))
}

fn field<'a>(fields: &'a std::collections::BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    fields.get(key).map(String::as_str)
}

#[test]
fn test_image_and_catalog_planes() {
    let source = MemorySource::default()
        .with(IMAGE_URI, &drao_image_cards())
        .with(
            "ad:CGPS/CGPS_MD1_100_um_image.fits",
            &[("INSTRUME", "IRAS"), ("PUB_RELD", "2004-02-02")],
        );
    let mut obs = Observation::simple("CGPS", "MC2_DRAO-ST");
    ingest(source)
        .process(&mut obs, &[remote(IMAGE_URI), remote(FWHM_100_URI)], "1420MHz")
        .unwrap();

    let ids: Vec<_> = obs.planes.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, vec!["1420MHz", "catalog"]);

    let image = obs.plane("1420MHz").unwrap();
    assert_eq!(field(&image.fields, "dataProductType"), Some("image"));
    assert_eq!(field(&image.fields, "metaRelease"), Some("2003-01-01T00:00:00.000"));
    assert_eq!(
        field(&image.fields, "provenance.lastExecuted"),
        Some("2002-11-20T00:00:00.000")
    );
    let artifact = image.artifact(IMAGE_URI).unwrap();
    assert_eq!(field(&artifact.fields, "productType"), Some("science"));
    assert_eq!(field(&artifact.chunk.fields, "naxis"), Some("4"));
    assert_eq!(
        field(&artifact.chunk.fields, "position.axis.function.cd11"),
        Some("-0.005")
    );
    assert_eq!(field(&artifact.chunk.fields, "energy.restfrq"), Some("1420406000.0"));

    let catalog = obs.plane("catalog").unwrap();
    assert_eq!(field(&catalog.fields, "dataProductType"), Some("catalog"));
    assert_eq!(
        field(&catalog.fields, "provenance.inputs"),
        Some("caom:CGPS/MD1_IRAS/100um")
    );
    assert_eq!(field(&catalog.fields, "metaRelease"), Some("2004-02-02T00:00:00.000"));
    assert!(catalog.artifact(FWHM_100_URI).is_some());
}

#[test]
fn test_catalog_inputs_match_fwhm_files() {
    let mut obs = Observation::simple("CGPS", "MD1_IRAS");
    ingest(MemorySource::default())
        .process(&mut obs, &[remote(FWHM_100_URI), remote(FWHM_60_URI)], "100um")
        .unwrap();

    let catalog = obs.plane("catalog").unwrap();
    let inputs = field(&catalog.fields, "provenance.inputs").unwrap();
    assert_eq!(inputs.split(' ').count(), 2);
    assert_eq!(inputs, "caom:CGPS/MD1_IRAS/100um caom:CGPS/MD1_IRAS/60um");
    // Missing sibling images only cost the header-derived fields
    assert!(field(&catalog.fields, "metaRelease").is_none());
    assert_eq!(catalog.artifacts.len(), 2);
    assert_eq!(obs.planes.len(), 1);
}

#[test]
fn test_unclassified_file_uses_positional_product() {
    let uri = "ad:CGPS/unrelated_file.fits";
    let source = MemorySource::default().with(uri, &[("INSTRUME", "OTHER")]);
    let mut obs = Observation::simple("CGPS", "X");
    ingest(source).process(&mut obs, &[remote(uri)], "misc").unwrap();

    let plane = obs.plane("misc").unwrap();
    let artifact = plane.artifact(uri).unwrap();
    assert_eq!(field(&artifact.fields, "releaseType"), Some("data"));
    assert!(!artifact.chunk.fields.contains_key("naxis"));
    assert!(obs.plane("catalog").is_none());
}

#[test]
fn test_missing_headers_fail_the_run() {
    let mut obs = Observation::simple("CGPS", "X");
    let err = ingest(MemorySource::default())
        .process(&mut obs, &[remote(IMAGE_URI)], "1420MHz")
        .unwrap_err();
    assert!(format!("{:#}", err).contains(IMAGE_URI));
}

#[test]
fn test_config_overrides_reach_observation() {
    let config = BlueprintConfig::parse(
        r#"
[fits]
"Plane.provenance.version" = ["PROCVERS"]

[overrides]
"Observation.intent" = "calibration"
"#,
    )
    .unwrap();
    let mut cards = drao_image_cards();
    cards.push(("PROCVERS", "2.1"));
    let source = MemorySource::default().with(IMAGE_URI, &cards);

    let mut obs = Observation::simple("CGPS", "MC2_DRAO-ST");
    Ingest::new(Box::new(source), config)
        .process(
            &mut obs,
            &[Input {
                uri: IMAGE_URI.to_string(),
                location: Location::Local(PathBuf::from(IMAGE_URI)),
            }],
            "1420MHz",
        )
        .unwrap();

    assert_eq!(field(&obs.fields, "intent"), Some("calibration"));
    let plane = obs.plane("1420MHz").unwrap();
    assert_eq!(field(&plane.fields, "provenance.version"), Some("2.1"));
}

#[test]
fn test_local_header_dumps_and_xml() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("CGPS_MC2_1420_MHz_I_image.fits.header");
    let text: String = drao_image_cards()
        .iter()
        .map(|(k, v)| format!("{:<8}= '{}'\n", k, v))
        .chain(std::iter::once("END\n".to_string()))
        .collect();
    std::fs::write(&image, text).unwrap();
    let sibling = dir.path().join("CGPS_MD1_100_um_image.fits.header");
    std::fs::write(&sibling, "INSTRUME= 'IRAS'\nPUB_RELD= '2004-02-02'\nEND\n").unwrap();
    let fwhm = dir.path().join("CGPS_MD1_100_um_fwhm.txt");

    let file_uris = vec![
        image.to_string_lossy().into_owned(),
        fwhm.to_string_lossy().into_owned(),
    ];
    let inputs = resolve_inputs(&file_uris, &[], "CGPS").unwrap();
    assert_eq!(inputs[0].uri, IMAGE_URI);
    assert_eq!(inputs[1].uri, FWHM_100_URI);

    let mut obs = Observation::simple("CGPS", "MC2_DRAO-ST");
    Ingest::new(Box::new(LocalHeaderSource::new()), BlueprintConfig::default())
        .process(&mut obs, &inputs, "1420MHz")
        .unwrap();

    let catalog = obs.plane("catalog").unwrap();
    assert_eq!(field(&catalog.fields, "metaRelease"), Some("2004-02-02T00:00:00.000"));

    let out = dir.path().join("obs.xml");
    xml::write_to_path(&obs, &out).unwrap();
    let mut reread = xml::read_from_path(&out).unwrap();
    assert_eq!(reread, obs);

    // Augmenting the stored observation again keeps one plane per product
    Ingest::new(Box::new(LocalHeaderSource::new()), BlueprintConfig::default())
        .process(&mut reread, &inputs, "1420MHz")
        .unwrap();
    assert_eq!(reread.planes.len(), 2);
    assert_eq!(reread, obs);
}
