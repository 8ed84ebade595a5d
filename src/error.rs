use thiserror::Error;

/// Lookup failures against the fixed classification tables.
///
/// These mean a table and the filename patterns disagree, so the file being
/// processed cannot be described at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("unknown band/content '{0}': no entry in the band table")]
    UnknownBand(String),

    #[error("unknown product '{0}': no entry in the energy table")]
    UnknownProduct(String),
}
