//! # Time-Bin Partitioner
//!
//! Buckets the labeled samples into contiguous age intervals. Two modes:
//! equal sample count per bin, or equal year span per bin. Bins are
//! constructed once per run and read-only afterwards; the core never
//! reshuffles them.
//!
//! Ages are calibrated years BP (before 1950 CE). Bin labels render each
//! age extreme to calendar years: 4450 BP is "2500 BC", 250 BP is "1700 AD".

use crate::data::sample::SampleTable;
use crate::error::{Result, StargenError};

/// Minimum samples an equal-span bin must hold before it stops widening.
const MIN_SAMPLES_PER_SPAN_BIN: usize = 5;

/// Step (years) by which an underfull equal-span bin widens its upper bound.
const SPAN_WIDEN_STEP: f64 = 50.0;

/// Number of oldest samples excluded when sizing equal-span bins. The age
/// distribution has a long sparse tail; sizing on the full range would
/// produce mostly-empty bins.
const SPAN_TAIL_TRIM: usize = 100;

/// How bins divide the age axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinningMode {
    /// Same number of samples in every bin.
    EqualCount,
    /// Same year span per bin; underfull bins widen, the last bin absorbs
    /// the oldest tail.
    EqualSpan,
}

/// A contiguous age interval owning a subset of the sample table.
#[derive(Clone, Debug)]
pub struct TimeBin {
    /// Human-readable calendar range, youngest first (e.g. "1700 AD - 2500 BC").
    pub label: String,
    /// Youngest age in the bin (years BP).
    pub min_age: f64,
    /// Oldest age in the bin (years BP).
    pub max_age: f64,
    /// Indices into the sample table, sorted by age.
    pub indices: Vec<usize>,
}

impl TimeBin {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Render an age in years BP as a calendar year.
pub fn format_age(age_bp: f64) -> String {
    let age = age_bp.round() as i64;
    if age < 1950 {
        format!("{} AD", 1950 - age)
    } else {
        format!("{} BC", age - 1950)
    }
}

/// Partition the table into `n_bins` time bins.
pub fn partition(table: &SampleTable, n_bins: usize, mode: BinningMode) -> Result<Vec<TimeBin>> {
    if n_bins == 0 {
        return Err(StargenError::config("number of time bins must be positive"));
    }
    if table.len() < n_bins {
        return Err(StargenError::invalid_data(format!(
            "{} samples cannot fill {} time bins",
            table.len(),
            n_bins
        )));
    }

    // Sort indices by age, youngest first.
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| {
        table
            .get(a)
            .age
            .total_cmp(&table.get(b).age)
            .then(a.cmp(&b))
    });

    let groups = match mode {
        BinningMode::EqualCount => partition_equal_count(table, &order, n_bins),
        BinningMode::EqualSpan => partition_equal_span(table, &order, n_bins),
    };

    Ok(groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|indices| {
            let min_age = table.get(indices[0]).age;
            let max_age = table.get(*indices.last().expect("non-empty bin")).age;
            TimeBin {
                label: format!("{} - {}", format_age(min_age), format_age(max_age)),
                min_age,
                max_age,
                indices,
            }
        })
        .collect())
}

/// Split into `n_bins` slices whose sizes differ by at most one, remainder
/// distributed one-per-bin from the front.
fn partition_equal_count(_table: &SampleTable, order: &[usize], n_bins: usize) -> Vec<Vec<usize>> {
    let per_bin = order.len() / n_bins;
    let mut remainder = order.len() % n_bins;
    let mut groups = Vec::with_capacity(n_bins);
    let mut start = 0usize;

    for _ in 0..n_bins {
        let extra = if remainder > 0 { 1 } else { 0 };
        remainder = remainder.saturating_sub(1);
        let end = start + per_bin + extra;
        groups.push(order[start..end].to_vec());
        start = end;
    }

    groups
}

/// Fixed-width windows over the age axis. Bin width is sized after trimming
/// the oldest tail; an underfull window widens its upper bound in 50-year
/// steps; the last window takes everything older. Each sample lands in the
/// first window that covers it.
fn partition_equal_span(table: &SampleTable, order: &[usize], n_bins: usize) -> Vec<Vec<usize>> {
    let ages: Vec<f64> = order.iter().map(|&i| table.get(i).age).collect();

    let sizing = if ages.len() > SPAN_TAIL_TRIM {
        &ages[..ages.len() - SPAN_TAIL_TRIM]
    } else {
        &ages[..]
    };
    let min_age = sizing.first().copied().unwrap_or(0.0);
    let max_age = sizing.last().copied().unwrap_or(0.0);
    let bin_size = ((max_age - min_age) / n_bins as f64).floor();

    let mut groups: Vec<Vec<usize>> = Vec::with_capacity(n_bins);
    let mut claimed = vec![false; order.len()];
    let mut low = min_age;
    let mut up = min_age + bin_size;

    for _ in 0..n_bins.saturating_sub(1) {
        let count_in = |up: f64| {
            ages
                .iter()
                .zip(claimed.iter())
                .filter(|&(&age, &taken)| !taken && age >= low && age < up)
                .count()
        };
        while count_in(up) < MIN_SAMPLES_PER_SPAN_BIN && up < max_age + SPAN_WIDEN_STEP {
            up += SPAN_WIDEN_STEP;
        }

        let mut group = Vec::new();
        for (pos, &idx) in order.iter().enumerate() {
            if !claimed[pos] && ages[pos] >= low && ages[pos] < up {
                claimed[pos] = true;
                group.push(idx);
            }
        }
        groups.push(group);
        low += bin_size;
        up += bin_size;
    }

    // Last bin absorbs everything older.
    let tail: Vec<usize> = order
        .iter()
        .enumerate()
        .filter(|&(pos, _)| !claimed[pos] && ages[pos] >= low)
        .map(|(_, &idx)| idx)
        .collect();
    groups.push(tail);

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{Sample, SampleTable};
    use h3o::{LatLng, Resolution};

    fn table_with_ages(ages: &[f64]) -> SampleTable {
        let cell = LatLng::new(45.0, 10.0)
            .unwrap()
            .to_cell(Resolution::Three);
        let samples = ages
            .iter()
            .enumerate()
            .map(|(i, &age)| Sample {
                id: format!("S{i}"),
                lat: 45.0,
                lon: 10.0,
                age,
                cell,
            })
            .collect();
        SampleTable::from_samples(samples)
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(4450.0), "2500 BC");
        assert_eq!(format_age(250.0), "1700 AD");
        assert_eq!(format_age(1950.0), "0 BC");
    }

    #[test]
    fn test_equal_count_sizes_differ_by_at_most_one() {
        let ages: Vec<f64> = (0..23).map(|i| 100.0 * i as f64).collect();
        let table = table_with_ages(&ages);
        let bins = partition(&table, 4, BinningMode::EqualCount).unwrap();
        assert_eq!(bins.len(), 4);
        let sizes: Vec<usize> = bins.iter().map(TimeBin::len).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 23);
        let max = sizes.iter().max().unwrap();
        let min = sizes.iter().min().unwrap();
        assert!(max - min <= 1);
        // Chronological: every age in bin i is <= every age in bin i+1.
        for w in bins.windows(2) {
            assert!(w[0].max_age <= w[1].min_age);
        }
    }

    #[test]
    fn test_equal_span_bins_hold_minimum() {
        // Dense cluster of young ages plus a sparse old tail.
        let mut ages: Vec<f64> = (0..40).map(|i| 500.0 + 10.0 * i as f64).collect();
        ages.extend((0..10).map(|i| 3000.0 + 400.0 * i as f64));
        let table = table_with_ages(&ages);
        let bins = partition(&table, 4, BinningMode::EqualSpan).unwrap();
        let total: usize = bins.iter().map(TimeBin::len).sum();
        assert_eq!(total, ages.len());
        for bin in &bins[..bins.len() - 1] {
            assert!(bin.len() >= MIN_SAMPLES_PER_SPAN_BIN, "underfull bin {:?}", bin.label);
        }
    }

    #[test]
    fn test_partition_rejects_more_bins_than_samples() {
        let table = table_with_ages(&[100.0, 200.0]);
        assert!(partition(&table, 5, BinningMode::EqualCount).is_err());
    }

    #[test]
    fn test_bins_do_not_share_samples() {
        let ages: Vec<f64> = (0..30).map(|i| 100.0 * i as f64).collect();
        let table = table_with_ages(&ages);
        for mode in [BinningMode::EqualCount, BinningMode::EqualSpan] {
            let bins = partition(&table, 5, mode).unwrap();
            let mut seen = std::collections::HashSet::new();
            for bin in &bins {
                for &idx in &bin.indices {
                    assert!(seen.insert(idx), "sample {idx} in two bins");
                }
            }
        }
    }
}
