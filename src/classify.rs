use crate::error::ClassifyError;
use crate::tables::{band_entry, NAME_PATTERNS};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Telescope {
    #[serde(rename = "DRAO-ST")]
    DraoSt,
    #[serde(rename = "FCRAO")]
    Fcrao,
    #[serde(rename = "IRAS")]
    Iras,
    #[serde(rename = "VLA")]
    Vla,
}

impl Telescope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Telescope::DraoSt => "DRAO-ST",
            Telescope::Fcrao => "FCRAO",
            Telescope::Iras => "IRAS",
            Telescope::Vla => "VLA",
        }
    }

    /// The two CGPS radio telescopes share their header conventions
    pub fn is_cgps_radio(&self) -> bool {
        matches!(self, Telescope::DraoSt | Telescope::Fcrao)
    }
}

impl fmt::Display for Telescope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Collection {
    #[serde(rename = "CGPS")]
    Cgps,
    #[serde(rename = "VGPS")]
    Vgps,
}

impl Collection {
    /// VLA files belong to VGPS, everything else (unclassified included) to CGPS
    pub fn for_telescope(telescope: Option<Telescope>) -> Self {
        match telescope {
            Some(Telescope::Vla) => Collection::Vgps,
            _ => Collection::Cgps,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Cgps => "CGPS",
            Collection::Vgps => "VGPS",
        }
    }

    /// Survey paper used as the provenance reference
    pub fn reference(&self) -> &'static str {
        match self {
            Collection::Cgps => "http://dx.doi.org/10.1086/375301",
            Collection::Vgps => "http://dx.doi.org/10.1086/505940",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a file identifier says about its file.
///
/// Every field is `None` when no telescope pattern matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub telescope: Option<Telescope>,
    pub target: Option<String>,
    pub content: Option<String>,
    pub band: Option<String>,
    pub product_id: Option<String>,
    pub bandpass_name: Option<String>,
}

impl Classification {
    pub fn collection(&self) -> Collection {
        Collection::for_telescope(self.telescope)
    }

    pub fn content_is(&self, content: &str) -> bool {
        self.content.as_deref() == Some(content)
    }
}

/// Captured groups of the first matching telescope pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub telescope: Telescope,
    pub target: String,
    pub content: String,
    pub band: Option<String>,
}

/// Match a file identifier against the telescope patterns, first match wins
pub fn match_file_id(file_id: &str) -> Option<NameMatch> {
    let lower = file_id.to_lowercase();
    NAME_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.regex.captures(&lower)?;
        Some(NameMatch {
            telescope: pattern.telescope,
            target: caps.name("target")?.as_str().to_string(),
            content: caps.name("content")?.as_str().to_string(),
            band: caps.name("band").map(|m| m.as_str().to_string()),
        })
    })
}

/// Classify a file identifier and resolve its productID and bandpass name.
///
/// An identifier that matches no pattern is not an error; it yields an empty
/// classification. A band token missing from the band table is.
pub fn classify(file_id: &str) -> Result<Classification, ClassifyError> {
    let Some(name) = match_file_id(file_id) else {
        return Ok(Classification::default());
    };

    let token = name.band.as_deref().unwrap_or(&name.content);
    let entry = band_entry(token).ok_or_else(|| ClassifyError::UnknownBand(token.to_string()))?;

    Ok(Classification {
        telescope: Some(name.telescope),
        target: Some(name.target),
        content: Some(name.content),
        band: name.band,
        product_id: Some(entry.product_id.to_string()),
        bandpass_name: Some(entry.bandpass_name.to_string()),
    })
}

/// The file identifier part of an artifact URI (`ad:CGPS/name` -> `name`)
pub fn file_id_from_uri(uri: &str) -> &str {
    match uri.split_once('/') {
        Some((_, rest)) => rest.split('/').next().unwrap_or(rest),
        None => uri,
    }
}

/// Convert a file basename to the identifier it is archived under.
///
/// Identifiers are lower case without the extension, except for the `fwhm`
/// text files which keep their full name.
pub fn make_file_id(basename: &str) -> String {
    let lower = basename.to_lowercase();
    let (base, _ext) = split_extension(&lower);
    if base.contains("fwhm") {
        lower
    } else {
        base.to_string()
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_drao_image() {
        let c = classify("CGPS_MC2_1420_MHz_I_image.fits").unwrap();
        assert_eq!(c.telescope, Some(Telescope::DraoSt));
        assert_eq!(c.target.as_deref(), Some("mc2"));
        assert_eq!(c.content.as_deref(), Some("image"));
        assert_eq!(c.band.as_deref(), Some("1420_mhz_i"));
        assert_eq!(c.product_id.as_deref(), Some("1420MHz"));
        assert_eq!(c.bandpass_name.as_deref(), Some("1420 MHz"));
        assert_eq!(c.collection(), Collection::Cgps);
    }

    #[test]
    fn test_classify_fcrao_and_iras() {
        let c = classify("cgps_mg1_co_line_flags").unwrap();
        assert_eq!(c.telescope, Some(Telescope::Fcrao));
        assert_eq!(c.product_id.as_deref(), Some("CO-line"));
        assert_eq!(c.bandpass_name.as_deref(), Some("CO (1-0)"));

        let c = classify("CGPS_MD1_100_um_fwhm.txt").unwrap();
        assert_eq!(c.telescope, Some(Telescope::Iras));
        assert_eq!(c.content.as_deref(), Some("fwhm"));
        assert_eq!(c.product_id.as_deref(), Some("100um"));
    }

    #[test]
    fn test_classify_vla_uses_content_for_band() {
        let c = classify("MOS_049_cont.Tb.fits").unwrap();
        assert_eq!(c.telescope, Some(Telescope::Vla));
        assert_eq!(c.target.as_deref(), Some("mos_049"));
        assert_eq!(c.content.as_deref(), Some("_cont.tb"));
        assert_eq!(c.band, None);
        assert_eq!(c.product_id.as_deref(), Some("21cm-cont"));
        assert_eq!(c.collection(), Collection::Vgps);

        let c = classify("MOS_049.Tb").unwrap();
        assert_eq!(c.product_id.as_deref(), Some("21cm-line"));
        let c = classify("MOS_049_contincluded.Tb").unwrap();
        assert_eq!(c.product_id.as_deref(), Some("21cm-lineWithCont"));
    }

    #[test]
    fn test_classify_unknown_is_empty() {
        let c = classify("something_else.fits").unwrap();
        assert_eq!(c, Classification::default());
        assert_eq!(c.telescope, None);
        assert_eq!(c.target, None);
        assert_eq!(c.product_id, None);
        assert_eq!(c.bandpass_name, None);
        assert_eq!(c.collection(), Collection::Cgps);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let id = "CGPS_MA1_1420_MHz_Q_image";
        assert_eq!(classify(id).unwrap(), classify(id).unwrap());
    }

    #[test]
    fn test_collection_for_telescope() {
        assert_eq!(Collection::for_telescope(Some(Telescope::Vla)), Collection::Vgps);
        for t in [Telescope::DraoSt, Telescope::Fcrao, Telescope::Iras] {
            assert_eq!(Collection::for_telescope(Some(t)), Collection::Cgps);
        }
        assert_eq!(Collection::for_telescope(None), Collection::Cgps);
    }

    #[test]
    fn test_file_id_from_uri() {
        assert_eq!(
            file_id_from_uri("ad:CGPS/CGPS_MC2_1420_MHz_I_image.fits"),
            "CGPS_MC2_1420_MHz_I_image.fits"
        );
        assert_eq!(file_id_from_uri("plain_name"), "plain_name");
    }

    #[test]
    fn test_make_file_id() {
        assert_eq!(make_file_id("CGPS_MC2_1420_MHz_I_image.fits"), "cgps_mc2_1420_mhz_i_image");
        assert_eq!(make_file_id("CGPS_MD1_100_um_fwhm.txt"), "cgps_md1_100_um_fwhm.txt");
        assert_eq!(make_file_id("noext"), "noext");
    }

    #[test]
    fn test_every_pattern_alternative_has_a_band() {
        let families: &[(Telescope, &[&str], &[&str])] = &[
            (
                Telescope::DraoSt,
                &["1420_MHz_I", "1420_MHz_Q", "1420_MHz_U", "408_MHz", "HI_line"],
                &["image", "beams", "rescb", "wght"],
            ),
            (Telescope::Fcrao, &["CO_line"], &["image", "flags"]),
            (
                Telescope::Iras,
                &["012_um", "025_um", "060_um", "100_um"],
                &["image", "beams", "cfv", "phn", "fwhm"],
            ),
        ];
        for (telescope, bands, contents) in families {
            for band in *bands {
                for content in *contents {
                    let file_id = format!("CGPS_MA1_{}_{}.fits", band, content);
                    let c = classify(&file_id).unwrap();
                    assert_eq!(c.telescope, Some(*telescope), "{}", file_id);
                    assert_eq!(c.content.as_deref(), Some(*content), "{}", file_id);
                    assert!(c.product_id.is_some(), "{}", file_id);
                }
            }
        }

        for suffix in [".Tb", "_cont.Tb", "_contincluded.Tb"] {
            let file_id = format!("MOS_017{}", suffix);
            let c = classify(&file_id).unwrap();
            assert_eq!(c.telescope, Some(Telescope::Vla), "{}", file_id);
            assert!(c.product_id.is_some(), "{}", file_id);
        }
    }

    #[test]
    fn test_telescope_display() {
        assert_eq!(Telescope::DraoSt.to_string(), "DRAO-ST");
        assert_eq!(Collection::Vgps.to_string(), "VGPS");
        assert!(Telescope::Fcrao.is_cgps_radio());
        assert!(!Telescope::Iras.is_cgps_radio());
    }
}
