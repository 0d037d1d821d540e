//! Fingerprint resolution and bit-matrix assembly.
//!
//! PubChem CIDs are resolved in a single batch request against the
//! PUG-REST property service, which answers with one base64 encoded 2D
//! fingerprint per CID, in request order. The payload carries a
//! big-endian bit-length prefix (whose leading zero bits are not part of
//! the fingerprint) and a fixed trailing pad.

use crate::config::Config;
use crate::error::Error;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

/// Resolves a batch of PubChem CIDs into a validated bit matrix.
///
/// The whole batch is one GET request; any transport failure, non-success
/// status, or malformed body fails the resolution as a whole. There are
/// no retries and no partial results.
pub fn resolve_cids(cids: &[String], config: &Config) -> Result<Vec<Vec<u8>>, Error> {
    let url = format!(
        "{}{}{}",
        config.service_url_start,
        cids.join(","),
        config.service_url_end
    );
    let response = reqwest::blocking::get(&url).map_err(|e| Error::Service(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Service(format!("service returned status {status}")));
    }
    let body: Value = response.json().map_err(|e| Error::Service(e.to_string()))?;

    let properties = body["PropertyTable"]["Properties"]
        .as_array()
        .ok_or_else(|| Error::Service("response carries no property table".to_string()))?;
    let mut bitstrings = Vec::with_capacity(properties.len());
    for property in properties {
        let payload = property[&config.fingerprint_field]
            .as_str()
            .ok_or_else(|| Error::Service("property entry has no fingerprint".to_string()))?;
        bitstrings.push(b64_to_bitstring(payload, config.pad_len)?);
    }
    bit_matrix(&bitstrings)
}

/// Decodes a base64 fingerprint payload into a 0/1 digit string.
///
/// Leading zero bits are dropped, mirroring an integer rendition of the
/// payload, and `pad_len` trailing pad bits are stripped.
pub fn b64_to_bitstring(payload: &str, pad_len: usize) -> Result<String, Error> {
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| Error::Service(format!("fingerprint is not valid base64: {e}")))?;
    let mut bits = String::with_capacity(bytes.len() * 8);
    for byte in bytes {
        for shift in (0..8).rev() {
            bits.push(if byte >> shift & 1 == 1 { '1' } else { '0' });
        }
    }
    let trimmed = bits.trim_start_matches('0');
    let end = trimmed.len().saturating_sub(pad_len);
    Ok(trimmed[..end].to_string())
}

/// Stacks 0/1 digit strings into a bit matrix.
///
/// Validation order matters: row widths are checked before symbols, so a
/// ragged input reports a length mismatch even when it also contains
/// stray characters.
pub fn bit_matrix(bitstrings: &[String]) -> Result<Vec<Vec<u8>>, Error> {
    let width = bitstrings
        .first()
        .map(|bits| bits.len())
        .ok_or(Error::LengthMismatch)?;
    if bitstrings.iter().any(|bits| bits.len() != width) {
        return Err(Error::LengthMismatch);
    }
    bitstrings
        .iter()
        .map(|bits| {
            bits.chars()
                .map(|c| match c {
                    '0' => Ok(0),
                    '1' => Ok(1),
                    _ => Err(Error::InvalidSymbol),
                })
                .collect()
        })
        .collect()
}
