pub mod blueprint;
pub mod classify;
pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod fits;
pub mod geolocation;
pub mod headers;
pub mod ingest;
pub mod observation;
pub mod tables;
pub mod utils;
pub mod xml;

#[cfg(test)]
mod test_pipeline;

// Re-export commonly used items
pub use blueprint::{Blueprint, Entry};
pub use classify::{classify, Classification, Collection, Telescope};
pub use derive::{draw_blueprint, RunContext};
pub use error::ClassifyError;
pub use fits::FitsHeader;
pub use observation::Observation;
