//! Where FITS headers come from: local files or the CADC data service.

use crate::classify::file_id_from_uri;
use crate::fits::{parse_header_text, read_headers, FitsHeader};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_SERVICE_URL: &str = "https://www.cadc-ccda.hia-iha.nrc-cnrc.gc.ca/data/pub";

pub trait HeaderSource {
    /// Headers of every HDU at `location` (a path or an artifact URI)
    fn fetch(&self, location: &str) -> Result<Vec<FitsHeader>>;
}

/// Reads headers from files on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHeaderSource;

impl LocalHeaderSource {
    pub fn new() -> Self {
        Self
    }
}

impl HeaderSource for LocalHeaderSource {
    fn fetch(&self, location: &str) -> Result<Vec<FitsHeader>> {
        let path = Path::new(location);
        debug!("Reading headers from {}", path.display());
        read_headers(path)
    }
}

/// Fetches headers over HTTPS from a data service that answers
/// `{base}/{archive}/{file_id}?fhead=true` with a text header dump
#[derive(Debug, Clone)]
pub struct RemoteHeaderSource {
    client: Client,
    base_url: String,
}

impl RemoteHeaderSource {
    /// `cert` is a PEM file holding both the client certificate and its key
    pub fn new(base_url: &str, cert: Option<&Path>) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(60));
        if let Some(cert) = cert {
            let pem = std::fs::read(cert)
                .with_context(|| format!("Failed to read certificate: {}", cert.display()))?;
            let identity = reqwest::Identity::from_pem(&pem)
                .with_context(|| format!("Invalid certificate/key PEM: {}", cert.display()))?;
            builder = builder.identity(identity);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Service URL for an `ad:ARCHIVE/FILE` artifact URI
    pub fn url_for(&self, uri: &str) -> Result<String> {
        let (scheme, path) = uri
            .split_once(':')
            .with_context(|| format!("Not an artifact URI: {}", uri))?;
        let archive = path
            .split('/')
            .next()
            .filter(|a| !a.is_empty())
            .with_context(|| format!("Artifact URI without an archive: {}", uri))?;
        if scheme != "ad" {
            anyhow::bail!("Unsupported URI scheme '{}' in {}", scheme, uri);
        }
        Ok(format!(
            "{}/{}/{}?fhead=true",
            self.base_url,
            archive,
            file_id_from_uri(uri)
        ))
    }
}

impl HeaderSource for RemoteHeaderSource {
    fn fetch(&self, location: &str) -> Result<Vec<FitsHeader>> {
        let url = self.url_for(location)?;
        debug!("Fetching headers from {}", url);
        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Header request failed: {}", url))?
            .text()
            .with_context(|| format!("Failed to read header response: {}", url))?;
        Ok(parse_header_text(&body))
    }
}

/// Location of the image file an `fwhm` text file was measured on
pub fn sibling_image_location(location: &str) -> String {
    location.replace("_fwhm.txt", "_image.fits")
}
