//! The file loop: fetch headers, draw a blueprint per file and merge the
//! results into one observation.

use crate::blueprint::Blueprint;
use crate::classify::{file_id_from_uri, make_file_id};
use crate::cli::Cli;
use crate::config::BlueprintConfig;
use crate::derive::{draw_blueprint, RunContext, CATALOG_PRODUCT_ID, PLANE_PRODUCT_ID};
use crate::fits::FitsHeader;
use crate::headers::{sibling_image_location, HeaderSource, LocalHeaderSource, RemoteHeaderSource};
use crate::observation::Observation;
use crate::utils::{artifact_uri, has_uri_scheme};
use crate::xml;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(String),
}

/// One FILE_URI argument: the artifact it describes and where its headers are
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub uri: String,
    pub location: Location,
}

/// Pair every FILE_URI with its header location.
///
/// With `--local` the i-th path holds the headers of the i-th FILE_URI.
/// Without it, URIs are fetched remotely and plain paths are read from disk
/// under an `ad:{collection}/...` artifact URI.
pub fn resolve_inputs(file_uris: &[String], local: &[PathBuf], collection: &str) -> Result<Vec<Input>> {
    if !local.is_empty() && local.len() != file_uris.len() {
        anyhow::bail!(
            "--local names {} files but {} FILE_URIs were given",
            local.len(),
            file_uris.len()
        );
    }

    let inputs = file_uris
        .iter()
        .enumerate()
        .map(|(i, file_uri)| {
            let uri = if has_uri_scheme(file_uri) {
                file_uri.clone()
            } else {
                artifact_uri(collection, file_uri)
            };
            let location = match local.get(i) {
                Some(path) => Location::Local(path.clone()),
                None if has_uri_scheme(file_uri) => Location::Remote(file_uri.clone()),
                None => Location::Local(PathBuf::from(file_uri)),
            };
            Input { uri, location }
        })
        .collect();
    Ok(inputs)
}

pub struct Ingest {
    local: Box<dyn HeaderSource>,
    remote: Option<Box<dyn HeaderSource>>,
    config: BlueprintConfig,
    dumpconfig: bool,
}

impl Ingest {
    pub fn new(local: Box<dyn HeaderSource>, config: BlueprintConfig) -> Self {
        Self {
            local,
            remote: None,
            config,
            dumpconfig: false,
        }
    }

    pub fn with_remote(mut self, remote: Box<dyn HeaderSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn dumpconfig(mut self, dump: bool) -> Self {
        self.dumpconfig = dump;
        self
    }

    fn source(&self, location: &Location) -> Result<(&dyn HeaderSource, String)> {
        match location {
            Location::Local(path) => Ok((&*self.local, path.to_string_lossy().into_owned())),
            Location::Remote(uri) => {
                let remote = self
                    .remote
                    .as_deref()
                    .with_context(|| format!("No remote header source for {}", uri))?;
                Ok((remote, uri.clone()))
            }
        }
    }

    fn fetch(&self, location: &Location) -> Result<Vec<FitsHeader>> {
        let (source, location) = self.source(location)?;
        source.fetch(&location)
    }

    /// Headers of the image an `fwhm` file belongs to, empty when unavailable
    fn sibling_headers(&self, location: &Location) -> Vec<FitsHeader> {
        let sibling = match location {
            Location::Local(path) => Location::Local(local_sibling(path)),
            Location::Remote(uri) => Location::Remote(sibling_image_location(uri)),
        };
        match self.fetch(&sibling) {
            Ok(headers) => headers,
            Err(e) => {
                warn!("No image headers for {:?}: {:#}", sibling, e);
                Vec::new()
            }
        }
    }

    /// Draw, configure and merge the blueprint of every input into `obs`.
    /// Files whose blueprint names no plane land in `product_id`.
    pub fn process(&self, obs: &mut Observation, inputs: &[Input], product_id: &str) -> Result<()> {
        let mut ctx = RunContext::new();

        for input in inputs {
            info!("Begin processing {}", input.uri);
            let file_id = file_id_from_uri(&input.uri);

            // fwhm text files carry no headers
            let headers = if make_file_id(file_id).contains("fwhm") {
                Vec::new()
            } else {
                self.fetch(&input.location)
                    .with_context(|| format!("Failed to read headers for {}", input.uri))?
            };

            let mut bp = draw_blueprint(&mut ctx, &input.uri, &headers, || {
                self.sibling_headers(&input.location)
            })
            .with_context(|| format!("Cannot classify {}", input.uri))?;
            self.config.apply(&mut bp);

            let plane_id = self.apply(obs, &bp, headers.first(), &input.uri, product_id)?;
            info!("artifact URI {} product ID {}", input.uri, plane_id);
            debug!("catalog URI {:?}", ctx.catalog_uri());
        }

        if let Some((catalog, uri)) = ctx.catalog() {
            info!("Adding catalog plane for {}", uri);
            let mut catalog = catalog.clone();
            self.config.apply(&mut catalog);
            self.apply(obs, &catalog, None, uri, CATALOG_PRODUCT_ID)?;
        }

        Ok(())
    }

    fn apply(
        &self,
        obs: &mut Observation,
        bp: &Blueprint,
        header: Option<&FitsHeader>,
        uri: &str,
        fallback_product_id: &str,
    ) -> Result<String> {
        if self.dumpconfig {
            println!("{}", serde_json::to_string_pretty(bp)?);
        }
        let plan = bp.resolve(header);
        let product_id = plan
            .get(PLANE_PRODUCT_ID)
            .cloned()
            .unwrap_or_else(|| fallback_product_id.to_string());
        obs.augment(&plan, uri, &product_id);
        Ok(product_id)
    }
}

/// Local image file or header dump next to an `fwhm` file
fn local_sibling(path: &Path) -> PathBuf {
    let image = PathBuf::from(sibling_image_location(&path.to_string_lossy()));
    if image.exists() {
        return image;
    }
    let mut dump = image.clone().into_os_string();
    dump.push(".header");
    let dump = PathBuf::from(dump);
    if dump.exists() {
        dump
    } else {
        image
    }
}

/// Run the whole command line
pub fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => BlueprintConfig::load(path)?,
        None => BlueprintConfig::default(),
    };

    let mut obs = match (cli.new_observation(), &cli.input) {
        (Some((collection, observation_id)), _) => Observation::simple(collection, observation_id),
        (None, Some(path)) => xml::read_from_path(path)?,
        (None, None) => anyhow::bail!("Either --observation or --in is required"),
    };

    let inputs = resolve_inputs(&cli.file_uri, &cli.local, &obs.collection)?;

    let mut ingest = Ingest::new(Box::new(LocalHeaderSource::new()), config).dumpconfig(cli.dumpconfig);
    if inputs.iter().any(|i| matches!(i.location, Location::Remote(_))) {
        let remote = RemoteHeaderSource::new(&cli.service_url, cli.cert.as_deref())?;
        ingest = ingest.with_remote(Box::new(remote));
    }

    ingest.process(&mut obs, &inputs, &cli.product_id)?;

    if cli.test {
        info!(
            "Test run: not writing observation {}/{} with {} planes",
            obs.collection,
            obs.observation_id,
            obs.planes.len()
        );
        return Ok(());
    }

    match &cli.out {
        Some(path) => {
            xml::write_to_path(&obs, path)?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", xml::write_observation(&obs)?),
    }
    Ok(())
}
