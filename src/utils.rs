/// Last component of a path, accepting both `/` and `\` separators
pub fn file_basename(path: &str) -> &str {
    path.split(&['\\', '/'][..]).next_back().unwrap_or(path)
}

/// Artifact URI for a local header dump or FITS file.
///
/// Header dumps are named after the file they describe plus `.header`, so
/// `/data/CGPS_MC2_1420_MHz_I_image.fits.header` describes
/// `ad:CGPS/CGPS_MC2_1420_MHz_I_image.fits`.
pub fn artifact_uri(collection: &str, path: &str) -> String {
    let name = file_basename(path);
    let name = match name.find(".header") {
        Some(end) => &name[..end],
        None => name,
    };
    format!("ad:{}/{}", collection, name)
}

/// True for `scheme:...` locations such as `ad:CGPS/file`, false for paths
pub fn has_uri_scheme(location: &str) -> bool {
    match location.split_once(':') {
        // A single letter before the colon is a Windows drive
        Some((scheme, _)) => {
            scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
        }
        None => false,
    }
}
