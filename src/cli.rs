use crate::headers::DEFAULT_SERVICE_URL;
use clap::{ArgAction, ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "cgps2caom2", version)]
#[command(about = "Build CAOM-2 observations from CGPS and VGPS files", long_about = None)]
#[command(group(ArgGroup::new("target").required(true).args(["observation", "input"])))]
#[command(group(ArgGroup::new("verbosity").args(["debug", "quiet", "verbose"])))]
pub struct Cli {
    /// Print debugging messages
    #[arg(short, long)]
    pub debug: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Print progress messages
    #[arg(short, long)]
    pub verbose: bool,

    /// Write log messages to this file instead of the console
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print each blueprint as JSON before it is applied
    #[arg(long)]
    pub dumpconfig: bool,

    /// Dry run: build the observation but do not write it
    #[arg(long)]
    pub test: bool,

    /// PEM file with the client certificate and key for remote headers
    #[arg(long, value_name = "PEM")]
    pub cert: Option<PathBuf>,

    /// TOML file with extra blueprint mappings, defaults and overrides
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Base URL of the data service answering header requests
    #[arg(long, value_name = "URL", default_value = DEFAULT_SERVICE_URL)]
    pub service_url: String,

    /// Local file to read headers from; repeat once per FILE_URI, in order
    #[arg(long, value_name = "PATH", action = ArgAction::Append)]
    pub local: Vec<PathBuf>,

    /// Where to write the observation XML (stdout when omitted)
    #[arg(short, long, value_name = "OUT")]
    pub out: Option<PathBuf>,

    /// Create a new observation
    #[arg(long, num_args = 2, value_names = ["COLLECTION", "OBSERVATION_ID"])]
    pub observation: Option<Vec<String>>,

    /// Augment the observation in this XML file
    #[arg(short = 'i', long = "in", value_name = "IN")]
    pub input: Option<PathBuf>,

    /// Plane used for files that do not name their own product
    #[arg(value_name = "PRODUCT_ID")]
    pub product_id: String,

    /// Artifact URIs (ad:ARCHIVE/FILE) or local header files
    #[arg(value_name = "FILE_URI", required = true, num_args = 1..)]
    pub file_uri: Vec<String>,
}

impl Cli {
    /// Collection and observation ID given with `--observation`
    pub fn new_observation(&self) -> Option<(&str, &str)> {
        match self.observation.as_deref() {
            Some([collection, observation_id]) => {
                Some((collection.as_str(), observation_id.as_str()))
            }
            _ => None,
        }
    }
}
