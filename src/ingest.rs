//! Table ingestion: format detection, delimiter sniffing, and
//! descriptor-column classification.
//!
//! The uploaded table has one header per item; headers matching the
//! fingerprint or CID token mark the single descriptor column, every
//! other column is an activity column. A stream that is not valid UTF-8
//! is retried as a spreadsheet workbook; that is the only format branch.

use crate::config::Config;
use crate::error::Error;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::{ReaderBuilder, Trim};
use std::io::Cursor;

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

/// How the descriptor column of a table is to be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Column at this index holds raw 0/1 bitstrings.
    RawFingerprintBits(usize),
    /// Column at this index holds PubChem CIDs to resolve remotely.
    ExternalIdentifier(usize),
    /// No descriptor column; only the unweighted index is available.
    None,
}

/// The raw descriptor column of a parsed table, one entry per data row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorColumn {
    RawBits(Vec<String>),
    Cids(Vec<String>),
}

/// A parsed input table. `ids` are the activity column headers, in table
/// order; `activity` has one inner vector per data row, `ids.len()` wide.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub ids: Vec<String>,
    pub activity: Vec<Vec<f64>>,
    pub descriptors: Option<DescriptorColumn>,
}

/// Classifies the descriptor column from the header row.
///
/// The fingerprint token takes precedence over the CID token; both are
/// case-insensitive substring matches, and only the first matching
/// column is classified.
pub fn classify_headers(headers: &[String], config: &Config) -> DescriptorKind {
    if let Some(idx) = headers
        .iter()
        .position(|h| h.to_lowercase().contains(&config.fingerprint_token))
    {
        return DescriptorKind::RawFingerprintBits(idx);
    }
    if let Some(idx) = headers
        .iter()
        .position(|h| h.to_lowercase().contains(&config.cid_token))
    {
        return DescriptorKind::ExternalIdentifier(idx);
    }
    DescriptorKind::None
}

/// Infers the field separator from the first line of delimited text.
pub fn sniff_delimiter(first_line: &str) -> Option<u8> {
    DELIMITER_CANDIDATES
        .iter()
        .map(|&sep| (sep, first_line.bytes().filter(|&b| b == sep).count()))
        .filter(|&(_, count)| count > 0)
        .max_by_key(|&(_, count)| count)
        .map(|(sep, _)| sep)
}

/// Parses an uploaded byte stream into a [`Dataset`].
///
/// Tries delimited text first; a UTF-8 decode failure selects the
/// spreadsheet reader instead. File names and extensions play no part.
pub fn read_table(bytes: &[u8], config: &Config) -> Result<Dataset, Error> {
    match std::str::from_utf8(bytes) {
        Ok(text) => read_delimited(text, config),
        Err(_) => read_spreadsheet(bytes, config),
    }
}

fn read_delimited(text: &str, config: &Config) -> Result<Dataset, Error> {
    let first_line = text
        .lines()
        .next()
        .ok_or_else(|| Error::Format("empty input".to_string()))?;
    let sep = sniff_delimiter(first_line)
        .ok_or_else(|| Error::Format("could not determine the field separator".to_string()))?;

    let mut reader = ReaderBuilder::new()
        .delimiter(sep)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    assemble(headers, rows, config)
}

fn read_spreadsheet(bytes: &[u8], config: &Config) -> Result<Dataset, Error> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| Error::Format(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Format("workbook has no sheets".to_string()))?
        .map_err(|e| Error::Format(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| Error::Format("workbook sheet is empty".to_string()))?
        .iter()
        .map(cell_to_string)
        .collect();
    let rows: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    assemble(headers, rows, config)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // CIDs come out of spreadsheets as floats; keep them integral.
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn assemble(
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    config: &Config,
) -> Result<Dataset, Error> {
    if rows.is_empty() {
        return Err(Error::Format("table has no data rows".to_string()));
    }
    let kind = classify_headers(&headers, config);
    let descriptor_idx = match kind {
        DescriptorKind::RawFingerprintBits(idx) | DescriptorKind::ExternalIdentifier(idx) => {
            Some(idx)
        }
        DescriptorKind::None => None,
    };

    let ids: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|&(c, _)| Some(c) != descriptor_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let mut activity = Vec::with_capacity(rows.len());
    let mut column = Vec::with_capacity(rows.len());
    for row in &rows {
        if row.len() != headers.len() {
            return Err(Error::Format(format!(
                "row has {} fields, expected {}",
                row.len(),
                headers.len()
            )));
        }
        let mut values = Vec::with_capacity(ids.len());
        for (c, cell) in row.iter().enumerate() {
            if Some(c) == descriptor_idx {
                column.push(cell.clone());
            } else {
                let value = cell.parse::<f64>().map_err(|_| {
                    Error::Format(format!("invalid activity value '{cell}'"))
                })?;
                values.push(value);
            }
        }
        activity.push(values);
    }

    let descriptors = match kind {
        DescriptorKind::RawFingerprintBits(_) => Some(DescriptorColumn::RawBits(column)),
        DescriptorKind::ExternalIdentifier(_) => Some(DescriptorColumn::Cids(column)),
        DescriptorKind::None => None,
    };
    Ok(Dataset {
        ids,
        activity,
        descriptors,
    })
}
