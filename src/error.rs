use thiserror::Error;

/// Failures of the ingestion, resolution, and index pipeline.
///
/// Degenerate arithmetic (an all-zero Jaccard union, a zero set
/// dissimilarity) is not an error; those cases flow through as NaN.
#[derive(Debug, Error)]
pub enum Error {
    /// The input stream could not be parsed as delimited text or as a
    /// spreadsheet table.
    #[error("could not read data table: {0}")]
    Format(String),
    /// Fingerprint bitstrings differ in length.
    #[error("fingerprints must be of equal length")]
    LengthMismatch,
    /// A fingerprint contains a value other than 0 or 1.
    #[error("fingerprints can only contain 0's or 1's")]
    InvalidSymbol,
    /// The remote fingerprint lookup failed, either in transport or with
    /// a non-success status.
    #[error("fingerprint service lookup failed: {0}")]
    Service(String),
    /// A weighted index was requested for a dataset without descriptors.
    #[error("weighted index requires fingerprint descriptors")]
    MissingDescriptors,
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
