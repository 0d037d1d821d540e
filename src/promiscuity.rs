//! The promiscuity index engine.
//!
//! [`Promiscuity`] is built once per computation from the parsed table
//! and is read-only afterwards. It computes the unweighted index I
//! (normalized Shannon entropy of an activity column), the weighted
//! index J (I reweighted by per-row average Jaccard dissimilarity), and
//! the overall set dissimilarity.
//!
//! NaN is a legitimate output here, not a failure: an all-zero Jaccard
//! union and a zero set dissimilarity both propagate as NaN.

use crate::config::{Config, DEFAULT_EPSILON};
use crate::error::Error;
use crate::fingerprint::{bit_matrix, resolve_cids};
use crate::ingest::{read_table, DescriptorColumn};
use rayon::prelude::*;
use std::collections::HashMap;

/// The index pair computed for one identifier. J is absent when the
/// dataset carries no descriptors.
#[derive(Clone, Copy, Debug)]
pub struct ItemIndices {
    pub i: f64,
    pub j: Option<f64>,
}

/// Working function for shells: parse the uploaded bytes, resolve any
/// descriptor column, and format the full result table.
pub fn calculate_results(bytes: &[u8], config: &Config) -> Result<Vec<Vec<String>>, Error> {
    Ok(Promiscuity::from_table(bytes, config)?.result_rows())
}

/// Computes the Jaccard distance between two equal-length binary vectors.
///
/// A pair of all-zero vectors has an empty union and yields NaN.
pub fn jaccard(u: &[u8], v: &[u8]) -> f64 {
    let mut dot = 0usize;
    let mut union = 0usize;
    for (&a, &b) in u.iter().zip(v) {
        dot += (a & b) as usize;
        union += (a | b) as usize;
    }
    1.0 - dot as f64 / union as f64
}

/// Promiscuity indices over one immutable dataset.
///
/// Identifiers label the activity columns; descriptors, when present,
/// pair with the activity rows. All derived quantities are computed at
/// construction.
#[derive(Clone, Debug)]
pub struct Promiscuity {
    ids: Vec<String>,
    data: Vec<Vec<f64>>,
    descriptors: Option<Vec<Vec<u8>>>,
    avg_dists: Vec<f64>,
    dset: Option<f64>,
}

impl Promiscuity {
    /// Builds an engine straight from an uploaded byte stream: ingest
    /// the table, resolve or decode the descriptor column, construct.
    pub fn from_table(bytes: &[u8], config: &Config) -> Result<Self, Error> {
        let dataset = read_table(bytes, config)?;
        let descriptors = match dataset.descriptors {
            Some(DescriptorColumn::Cids(cids)) => Some(resolve_cids(&cids, config)?),
            Some(DescriptorColumn::RawBits(bits)) => Some(bit_matrix(&bits)?),
            None => None,
        };
        Ok(Self::with_epsilon(
            dataset.ids,
            dataset.activity,
            descriptors,
            config.epsilon,
        ))
    }

    /// Builds an engine with the default epsilon floor.
    pub fn new(
        ids: Vec<String>,
        activity: Vec<Vec<f64>>,
        descriptors: Option<Vec<Vec<u8>>>,
    ) -> Self {
        Self::with_epsilon(ids, activity, descriptors, DEFAULT_EPSILON)
    }

    /// Builds an engine with a caller-chosen epsilon floor.
    ///
    /// The floor is added to every activity value; raw activities are
    /// assumed non-negative, the floor makes them strictly positive for
    /// the logarithms below.
    pub fn with_epsilon(
        ids: Vec<String>,
        activity: Vec<Vec<f64>>,
        descriptors: Option<Vec<Vec<u8>>>,
        epsilon: f64,
    ) -> Self {
        let data: Vec<Vec<f64>> = activity
            .into_iter()
            .map(|row| row.into_iter().map(|v| v + epsilon).collect())
            .collect();
        let (avg_dists, dset) = match &descriptors {
            Some(d) => {
                debug_assert_eq!(d.len(), data.len());
                (average_distances(d), Some(set_dissimilarity(d)))
            }
            None => (Vec::new(), None),
        };
        Self {
            ids,
            data,
            descriptors,
            avg_dists,
            dset,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Average Jaccard distance of each descriptor row to all others.
    /// Empty without descriptors.
    pub fn avg_dists(&self) -> &[f64] {
        &self.avg_dists
    }

    /// Overall set dissimilarity; `None` means "not determined" because
    /// the dataset has no descriptors.
    pub fn dset(&self) -> Option<f64> {
        self.dset
    }

    /// The unweighted promiscuity index of activity column `idx`:
    /// normalized Shannon entropy of the column's share distribution,
    /// in (0, 1] with 1 at perfect evenness.
    pub fn ivalue(&self, idx: usize) -> f64 {
        let total: f64 = self.data.iter().map(|row| row[idx]).sum();
        let n = self.data.len() as f64;
        let entropy: f64 = self
            .data
            .iter()
            .map(|row| {
                let p = row[idx] / total;
                p * p.ln()
            })
            .sum();
        -entropy / n.ln()
    }

    /// The weighted promiscuity index of activity column `idx`, each
    /// row's share weighted by its average dissimilarity relative to the
    /// set dissimilarity.
    ///
    /// Fails with [`Error::MissingDescriptors`] when the dataset has no
    /// descriptors. When the set dissimilarity is zero every weight is
    /// 0/0 and the result is NaN, which is expected.
    pub fn jvalue(&self, idx: usize) -> Result<f64, Error> {
        let dset = self.dset.ok_or(Error::MissingDescriptors)?;
        let total: f64 = self.data.iter().map(|row| row[idx]).sum();
        let n = self.data.len() as f64;
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for (avg, row) in self.avg_dists.iter().zip(&self.data) {
            let w = avg / dset;
            let p = row[idx] / total;
            weighted += w * p * p.ln();
            weight_sum += w;
        }
        Ok(-n * weighted / (weight_sum * n.ln()))
    }

    /// Index pairs keyed by identifier, for analysis callers.
    pub fn results(&self) -> HashMap<String, ItemIndices> {
        self.ids
            .iter()
            .enumerate()
            .map(|(idx, id)| {
                let j = self.descriptors.is_some().then(|| {
                    // Descriptors are present, so jvalue cannot fail.
                    self.jvalue(idx).unwrap_or(f64::NAN)
                });
                (
                    id.clone(),
                    ItemIndices {
                        i: self.ivalue(idx),
                        j,
                    },
                )
            })
            .collect()
    }

    /// Formats the full result table: one row per identifier, `[id, I]`
    /// or `[id, I, J]`, then a trailing `["dset", value]` summary row.
    /// NaN renders as the literal `nan`; without descriptors the summary
    /// value is `not determined`.
    pub fn result_rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(self.ids.len() + 1);
        for (idx, id) in self.ids.iter().enumerate() {
            let mut row = vec![id.clone(), format_value(self.ivalue(idx))];
            if self.descriptors.is_some() {
                if let Ok(j) = self.jvalue(idx) {
                    row.push(format_value(j));
                }
            }
            rows.push(row);
        }
        let dset = match self.dset {
            Some(d) => format_value(d),
            None => "not determined".to_string(),
        };
        rows.push(vec!["dset".to_string(), dset]);
        rows
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

fn average_distances(descriptors: &[Vec<u8>]) -> Vec<f64> {
    let n = descriptors.len();
    (0..n)
        .into_par_iter()
        .map(|i| {
            let sum: f64 = (0..n)
                .filter(|&j| j != i)
                .map(|j| jaccard(&descriptors[i], &descriptors[j]))
                .sum();
            sum / (n - 1) as f64
        })
        .collect()
}

/// Fraction of mixed bit positions among all non-empty positions: a
/// position set in every row counts as uniform, one set in some rows as
/// mixed, and one set in none is ignored.
fn set_dissimilarity(descriptors: &[Vec<u8>]) -> f64 {
    let rows = descriptors.len();
    let width = descriptors.first().map_or(0, Vec::len);
    let mut mixed = 0.0;
    let mut uniform = 0.0;
    for pos in 0..width {
        let sum: usize = descriptors.iter().map(|row| row[pos] as usize).sum();
        if sum == 0 {
            continue;
        }
        if sum == rows {
            uniform += 1.0;
        } else {
            mixed += 1.0;
        }
    }
    mixed / (mixed + uniform)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        vec!["id1".to_string(), "id2".to_string()]
    }

    fn even_activity() -> Vec<Vec<f64>> {
        vec![vec![1.0, 1.0], vec![1.0, 1.0]]
    }

    // Half-overlapping fingerprints.
    fn p1() -> Promiscuity {
        Promiscuity::new(
            ids(),
            even_activity(),
            Some(vec![vec![1, 1, 1, 1], vec![1, 1, 0, 0]]),
        )
    }

    // Disjoint fingerprints.
    fn p2() -> Promiscuity {
        Promiscuity::new(
            ids(),
            even_activity(),
            Some(vec![vec![1, 1, 1, 1], vec![0, 0, 0, 0]]),
        )
    }

    // Identical fingerprints.
    fn p3() -> Promiscuity {
        Promiscuity::new(
            ids(),
            even_activity(),
            Some(vec![vec![1, 1, 1, 1], vec![1, 1, 1, 1]]),
        )
    }

    // No fingerprints at all.
    fn p4() -> Promiscuity {
        Promiscuity::new(ids(), even_activity(), None)
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard(&[1, 0, 1, 0], &[1, 0, 1, 0]), 0.0);
        assert_eq!(jaccard(&[1, 1, 1, 1], &[1, 1, 0, 0]), 0.5);
        assert_eq!(jaccard(&[1, 1], &[0, 0]), 1.0);
        // Empty union is mathematically undefined, not an error.
        assert!(jaccard(&[0, 0], &[0, 0]).is_nan());
    }

    #[test]
    fn test_avg_dists() {
        assert_eq!(p1().avg_dists(), [0.5, 0.5]);
        assert_eq!(p2().avg_dists(), [1.0, 1.0]);
        assert_eq!(p3().avg_dists(), [0.0, 0.0]);
        assert!(p4().avg_dists().is_empty());
    }

    #[test]
    fn test_avg_dists_bounds() {
        let descriptors = vec![
            vec![1, 0, 1, 0, 1],
            vec![1, 1, 0, 0, 1],
            vec![0, 1, 1, 1, 0],
            vec![1, 1, 1, 1, 1],
        ];
        let p = Promiscuity::new(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![vec![1.0; 4]; 4],
            Some(descriptors),
        );
        for &d in p.avg_dists() {
            assert!((0.0..=1.0).contains(&d));
        }
    }

    #[test]
    fn test_dset() {
        assert_eq!(p1().dset(), Some(0.5));
        assert_eq!(p2().dset(), Some(1.0));
        assert_eq!(p3().dset(), Some(0.0));
        assert_eq!(p4().dset(), None);
    }

    #[test]
    fn test_ivalue() {
        assert_eq!(p1().ivalue(0), 1.0);
        assert_eq!(p1().ivalue(1), 1.0);
        assert_eq!(p4().ivalue(0), 1.0);
    }

    #[test]
    fn test_ivalue_dominated_column() {
        let p = Promiscuity::new(
            ids(),
            vec![vec![1000.0, 1.0], vec![0.001, 1.0]],
            None,
        );
        let i = p.ivalue(0);
        assert!(i > 0.0 && i < 0.01);
        // The even column still scores 1.
        assert_eq!(p.ivalue(1), 1.0);
    }

    #[test]
    fn test_jvalue() {
        assert_eq!(p1().jvalue(0).unwrap(), 1.0);
        assert_eq!(p1().jvalue(1).unwrap(), 1.0);
        // Identical fingerprints: dset is 0, every weight is 0/0.
        assert!(p3().jvalue(0).unwrap().is_nan());
    }

    #[test]
    fn test_jvalue_without_descriptors() {
        assert!(matches!(p4().jvalue(0), Err(Error::MissingDescriptors)));
    }

    #[test]
    fn test_results() {
        assert_eq!(p4().results()["id1"].i, 1.0);
        assert!(p4().results()["id1"].j.is_none());

        let p5 = Promiscuity::new(
            ids(),
            vec![vec![0.0, 0.0], vec![1.0, 0.5]],
            Some(vec![vec![1, 0, 1, 0], vec![1, 1, 0, 0]]),
        );
        let i = p5.results()["id1"].i;
        assert_eq!((i * 1e6).round() / 1e6, 2.1e-5);
    }

    #[test]
    fn test_result_rows() {
        let rows = p1().result_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], ["id1", "1", "1"]);
        assert_eq!(rows[1], ["id2", "1", "1"]);
        assert_eq!(rows[2], ["dset", "0.5"]);
    }

    #[test]
    fn test_result_rows_without_descriptors() {
        let rows = p4().result_rows();
        assert_eq!(rows[0], ["id1", "1"]);
        assert_eq!(rows[2], ["dset", "not determined"]);
    }

    #[test]
    fn test_result_rows_render_nan() {
        let rows = p3().result_rows();
        assert_eq!(rows[0][2], "nan");
        assert_eq!(rows[2], ["dset", "0"]);
    }

    #[test]
    fn test_result_rows_round_trip() {
        // Formatted rows pushed through a delimited writer and read back
        // must reproduce the identifiers and numeric strings exactly.
        let rows = p1().result_rows();
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for row in &rows {
            writer.write_record(row).unwrap();
        }
        let bytes = writer.into_inner().unwrap();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let read_back: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        assert_eq!(read_back, rows);
    }

    #[test]
    fn test_calculate_results_from_csv() {
        let config = Config::default();
        let rows =
            calculate_results(b"id1,id2,fingerprint\n1,1,1111\n1,1,1100\n", &config).unwrap();
        assert_eq!(rows[0], ["id1", "1", "1"]);
        assert_eq!(rows[1], ["id2", "1", "1"]);
        assert_eq!(rows[2], ["dset", "0.5"]);
    }

    #[test]
    fn test_calculate_results_propagates_bad_fingerprints() {
        let config = Config::default();
        assert!(matches!(
            calculate_results(b"id1,id2,fingerprint\n1,1,11\n1,1,1\n", &config),
            Err(Error::LengthMismatch)
        ));
        assert!(matches!(
            calculate_results(b"id1,id2,fingerprint\n1,1,12\n1,1,10\n", &config),
            Err(Error::InvalidSymbol)
        ));
    }
}
