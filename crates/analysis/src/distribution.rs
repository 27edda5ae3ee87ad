//! Distribution of signed relative price change across events.

use drift_core::{Error, Event, Result};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::BTreeMap;

/// Equal-width histogram of event relative change, plus counts per size
/// bucket.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeDistribution {
    /// Lower edge of the first bin.
    pub low: f64,
    pub bin_width: f64,
    /// Count by bin lower edge; empty bins are present with 0.
    pub counts: BTreeMap<OrderedFloat<f64>, usize>,
    /// Count by size bucket.
    pub by_size_bucket: BTreeMap<i8, usize>,
}

impl ChangeDistribution {
    /// Histogram over the finite relative changes of `events`.
    ///
    /// The range spans the smallest to the largest value; the largest value
    /// lands in the last bin. When all values are equal the range is widened
    /// by 0.5 on each side.
    pub fn from_events(events: &[Event], bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(Error::config("histogram needs at least one bin"));
        }

        let values: Vec<f64> = events
            .iter()
            .map(|e| e.relative_change)
            .filter(|r| r.is_finite())
            .collect();

        let mut by_size_bucket = BTreeMap::new();
        for event in events {
            *by_size_bucket.entry(event.size_bucket).or_insert(0) += 1;
        }

        if values.is_empty() {
            return Ok(Self {
                low: 0.0,
                bin_width: 0.0,
                counts: BTreeMap::new(),
                by_size_bucket,
            });
        }

        let mut low = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mut high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if low == high {
            low -= 0.5;
            high += 0.5;
        }
        let bin_width = (high - low) / bins as f64;

        let edge = |i: usize| OrderedFloat(low + i as f64 * bin_width);
        let mut counts: BTreeMap<OrderedFloat<f64>, usize> = (0..bins).map(|i| (edge(i), 0)).collect();
        for &x in &values {
            let i = (((x - low) / bin_width).floor() as usize).min(bins - 1);
            *counts.entry(edge(i)).or_insert(0) += 1;
        }

        Ok(Self {
            low,
            bin_width,
            counts,
            by_size_bucket,
        })
    }

    /// Total number of values binned.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// `(lower, upper, count)` for every bin in order.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.counts
            .iter()
            .map(move |(lower, &count)| (lower.0, lower.0 + self.bin_width, count))
    }
}
