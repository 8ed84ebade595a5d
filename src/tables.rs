//! Fixed lookup tables for CGPS/VGPS file classification.
//!
//! File identifiers are lower case, so every pattern and band token here is
//! lower case too. The derived values may differ in case from the matching
//! FITS header values.

use crate::classify::Telescope;
use regex::Regex;
use std::sync::LazyLock;

/// One telescope's file identifier pattern.
///
/// Named groups: `target` and `content` always, `band` for the CGPS
/// telescopes only.
#[derive(Debug)]
pub struct NamePattern {
    pub telescope: Telescope,
    pub regex: Regex,
}

/// Patterns are tried in this order and the first match wins. They are
/// disjoint in practice: the CGPS patterns differ in their band alternatives
/// and the VLA pattern requires a `.tb` suffix straight after seven
/// characters.
pub static NAME_PATTERNS: LazyLock<Vec<NamePattern>> = LazyLock::new(|| {
    [
        (
            Telescope::DraoSt,
            r"^cgps_(?P<target>[^_]+)_(?P<band>1420_mhz_[iqu]|408_mhz|hi_line)_(?P<content>image|beams|rescb|wght)",
        ),
        (
            Telescope::Fcrao,
            r"^cgps_(?P<target>[^_]+)_(?P<band>co_line)_(?P<content>image|flags)",
        ),
        (
            Telescope::Iras,
            r"^cgps_(?P<target>[^_]+)_(?P<band>012_um|025_um|060_um|100_um)_(?P<content>image|beams|cfv|phn|fwhm)",
        ),
        (
            Telescope::Vla,
            r"^(?P<target>.{7})(?P<content>\.tb|_cont\.tb|_contincluded\.tb)",
        ),
    ]
    .into_iter()
    .map(|(telescope, pattern)| NamePattern {
        telescope,
        regex: Regex::new(pattern).expect("static file name pattern"),
    })
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandEntry {
    pub product_id: &'static str,
    pub bandpass_name: &'static str,
}

const fn band(product_id: &'static str, bandpass_name: &'static str) -> BandEntry {
    BandEntry {
        product_id,
        bandpass_name,
    }
}

/// Band (or, for VLA, content) token to productID and bandpass name
pub const BANDS: &[(&str, BandEntry)] = &[
    ("1420_mhz_i", band("1420MHz", "1420 MHz")),
    ("1420_mhz_q", band("1420MHz-QU", "1420 MHz")),
    ("1420_mhz_u", band("1420MHz-QU", "1420 MHz")),
    ("408_mhz", band("408MHz", "408 MHz")),
    ("hi_line", band("HI-line", "21 cm")),
    ("co_line", band("CO-line", "CO (1-0)")),
    ("012_um", band("12um", "IRAS-12um")),
    ("025_um", band("25um", "IRAS-25um")),
    ("060_um", band("60um", "IRAS-60um")),
    ("100_um", band("100um", "IRAS-100um")),
    (".tb", band("21cm-line", "21 cm")),
    ("_cont.tb", band("21cm-cont", "1420 MHz")),
    ("_contincluded.tb", band("21cm-lineWithCont", "21 cm")),
];

pub fn band_entry(token: &str) -> Option<&'static BandEntry> {
    BANDS.iter().find(|(key, _)| *key == token).map(|(_, entry)| entry)
}

pub type Overrides = &'static [(&'static str, &'static str)];

const POSITION_CUNIT1: &str = "Chunk.position.axis.axis1.cunit";
const POSITION_CUNIT2: &str = "Chunk.position.axis.axis2.cunit";
const ENERGY_CTYPE: &str = "Chunk.energy.axis.axis.ctype";
const ENERGY_CUNIT: &str = "Chunk.energy.axis.axis.cunit";
const ENERGY_DELTA: &str = "Chunk.energy.axis.function.delta";
const ENERGY_SPECSYS: &str = "Chunk.energy.specsys";

/// Axis overrides per productID, consistent with the IRIS collection for
/// the IRAS bands.
pub const ENERGY: &[(&str, Overrides)] = &[
    (
        "1420MHz",
        &[
            (POSITION_CUNIT1, "deg"),  // CUNIT1
            (POSITION_CUNIT2, "deg"),  // CUNIT2
            (ENERGY_CUNIT, "Hz"),      // CUNIT3
            (ENERGY_DELTA, "30.0E6"),  // CDELT3
            (ENERGY_SPECSYS, "TOPOCENT"),
        ],
    ),
    (
        "1420MHz-QU",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CUNIT, "Hz"),
            (ENERGY_DELTA, "30.0E6"),
            (ENERGY_SPECSYS, "TOPOCENT"),
        ],
    ),
    (
        "408MHz",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CUNIT, "Hz"),
            (ENERGY_DELTA, "4.0E6"),
            (ENERGY_SPECSYS, "TOPOCENT"),
        ],
    ),
    (
        "HI-line",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "VRAD"), // CTYPE3
            (ENERGY_CUNIT, "m/s"),
            (ENERGY_SPECSYS, "LSRK"),
        ],
    ),
    (
        "CO-line",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "VRAD"),
            (ENERGY_CUNIT, "m/s"),
            (ENERGY_SPECSYS, "LSRK"),
        ],
    ),
    (
        "12um",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "WAVE"),
            (ENERGY_CUNIT, "m"),
            (ENERGY_SPECSYS, "TOPOCENT"),
            (ENERGY_DELTA, "7.0E-6"),
        ],
    ),
    (
        "25um",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "WAVE"),
            (ENERGY_CUNIT, "m"),
            (ENERGY_SPECSYS, "TOPOCENT"),
            (ENERGY_DELTA, "11.15e-6"),
        ],
    ),
    (
        "60um",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "WAVE"),
            (ENERGY_CUNIT, "m"),
            (ENERGY_SPECSYS, "TOPOCENT"),
            (ENERGY_DELTA, "32.5e-6"),
        ],
    ),
    (
        "100um",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "WAVE"),
            (ENERGY_CUNIT, "m"),
            (ENERGY_SPECSYS, "TOPOCENT"),
            (ENERGY_DELTA, "31.5e-6"),
        ],
    ),
    (
        "21cm-line",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "VRAD"),
            (ENERGY_CUNIT, "m/s"),
            (ENERGY_SPECSYS, "LSRK"),
        ],
    ),
    (
        "21cm-cont",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "VRAD"),
            (ENERGY_CUNIT, "m/s"),
            (ENERGY_SPECSYS, "TOPOCENT"),
        ],
    ),
    (
        "21cm-lineWithCont",
        &[
            (POSITION_CUNIT1, "deg"),
            (POSITION_CUNIT2, "deg"),
            (ENERGY_CTYPE, "VRAD"),
            (ENERGY_CUNIT, "m/s"),
            (ENERGY_SPECSYS, "LSRK"),
        ],
    ),
];

pub fn energy_overrides(product_id: &str) -> Option<Overrides> {
    ENERGY
        .iter()
        .find(|(key, _)| *key == product_id)
        .map(|(_, overrides)| *overrides)
}

pub const POLARIZATION_REFCOORD_VAL: &str = "Chunk.polarization.axis.function.refCoord.val";

/// Fixed single-plane Stokes axis
pub const POLARIZATION: Overrides = &[
    ("Chunk.polarization.axis.axis.ctype", "STOKES"),     // CTYPE4
    ("Chunk.polarization.axis.function.naxis", "1"),      // NAXIS4
    ("Chunk.polarization.axis.function.refCoord.pix", "1"), // CRPIX4
    (POLARIZATION_REFCOORD_VAL, "1"),                     // CRVAL4
    ("Chunk.polarization.axis.function.delta", "1"),      // CDELT4
];

/// CTYPE values accepted as a polarization axis
pub const POLARIZATION_CTYPES: &[&str] = &["STOKES"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_band_has_energy_entry() {
        for (token, entry) in BANDS {
            assert!(
                energy_overrides(entry.product_id).is_some(),
                "band {} -> {} has no energy entry",
                token,
                entry.product_id
            );
        }
    }

    #[test]
    fn test_energy_keys_unique() {
        for (i, (a, _)) in ENERGY.iter().enumerate() {
            assert!(ENERGY[i + 1..].iter().all(|(b, _)| a != b), "duplicate {}", a);
        }
    }

    #[test]
    fn test_band_lookup() {
        let entry = band_entry("1420_mhz_q").unwrap();
        assert_eq!(entry.product_id, "1420MHz-QU");
        assert_eq!(entry.bandpass_name, "1420 MHz");
        assert_eq!(band_entry("_cont.tb").unwrap().product_id, "21cm-cont");
        assert!(band_entry("1420_MHZ_I").is_none());
    }

    #[test]
    fn test_patterns_in_telescope_order() {
        let order: Vec<_> = NAME_PATTERNS.iter().map(|p| p.telescope).collect();
        assert_eq!(
            order,
            vec![Telescope::DraoSt, Telescope::Fcrao, Telescope::Iras, Telescope::Vla]
        );
    }

    #[test]
    fn test_patterns_disjoint_on_samples() {
        let samples = [
            "cgps_mc2_1420_mhz_i_image",
            "cgps_mc2_408_mhz_beams",
            "cgps_mc2_hi_line_wght",
            "cgps_mc2_co_line_flags",
            "cgps_md1_100_um_fwhm.txt",
            "cgps_md1_012_um_phn",
            "mos_049.tb",
            "mos_049_cont.tb",
            "mos_049_contincluded.tb",
        ];
        for sample in samples {
            let matches = NAME_PATTERNS
                .iter()
                .filter(|p| p.regex.is_match(sample))
                .count();
            assert_eq!(matches, 1, "{} matched {} patterns", sample, matches);
        }
    }
}
