//! Promiscuity index calculations for sets of functional items.
//!
//! Takes a delimited-text or spreadsheet table of activity measurements,
//! optionally paired with binary chemical fingerprints (given directly or
//! resolved from PubChem CIDs), and computes the unweighted promiscuity
//! index I, the dissimilarity-weighted index J, and the overall set
//! dissimilarity.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod promiscuity;
pub mod sample;

pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::promiscuity::{calculate_results, Promiscuity};
