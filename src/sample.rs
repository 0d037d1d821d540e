//! Demo data generation and jackknife analysis.

use crate::promiscuity::{ItemIndices, Promiscuity};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const SAMPLE_SEED: u64 = 5;
const SAMPLE_ROWS: usize = 26;

/// Generates a deterministic demo table: a perfectly promiscuous column
/// (`Pr`, equal activity under every condition), a near-perfectly
/// specific one (`Sp`, all activity on the first condition), and a block
/// of columns `a`..`z` between them with random activities on a growing
/// triangle of conditions.
pub fn example_dataset() -> (Vec<String>, Vec<Vec<f64>>) {
    let mut ids = vec!["Pr".to_string()];
    ids.extend(('a'..='z').map(|c| c.to_string()));
    ids.push("Sp".to_string());
    let cols = ids.len();

    let mut rng = SmallRng::seed_from_u64(SAMPLE_SEED);
    let mut data = vec![vec![1.0; cols]; SAMPLE_ROWS];
    for (r, row) in data.iter_mut().enumerate() {
        for c in 1..cols - 1 {
            if r + c <= SAMPLE_ROWS {
                row[c] = rng.gen_range(1000.0..2500.0);
            }
        }
        row[cols - 1] = 1e-10;
    }
    data[0][cols - 1] = 100.0;

    (ids, data)
}

/// Leave-one-row-out sweep: recomputes the unweighted indices once per
/// omitted condition row. Returns one result map per omitted row, in row
/// order.
pub fn jackknife(ids: &[String], activity: &[Vec<f64>]) -> Vec<HashMap<String, ItemIndices>> {
    (0..activity.len())
        .map(|omit| {
            let remaining: Vec<Vec<f64>> = activity
                .iter()
                .enumerate()
                .filter(|&(r, _)| r != omit)
                .map(|(_, row)| row.clone())
                .collect();
            Promiscuity::new(ids.to_vec(), remaining, None).results()
        })
        .collect()
}
