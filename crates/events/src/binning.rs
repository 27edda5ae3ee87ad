//! Fixed-width time binning of the mid-price series.
//!
//! Buckets are half-open `[start, start + size)` offsets from the first
//! tick's transaction time. Each bucket remembers where in the tick table
//! its extrema came from so later stages can recover their timestamps.

use drift_core::{Error, Result, Seconds, TickIndex, TickTable, TimeBucket};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Bucket number of a timestamp: floor((t - t0) / bucket_size).
#[inline]
pub fn bucket_key(t: Seconds, t0: Seconds, bucket_size: Seconds) -> i64 {
    ((t - t0) / bucket_size).floor() as i64
}

/// A bucket that's currently being accumulated.
#[derive(Debug, Clone)]
struct BucketAccumulator {
    key: i64,
    max_mid: f64,
    max_index: TickIndex,
    min_mid: f64,
    min_index: TickIndex,
    sum: f64,
    count: usize,
}

impl BucketAccumulator {
    fn new(key: i64, index: TickIndex, mid: f64) -> Self {
        Self {
            key,
            max_mid: mid,
            max_index: index,
            min_mid: mid,
            min_index: index,
            sum: mid,
            count: 1,
        }
    }

    fn add(&mut self, index: TickIndex, mid: f64) {
        // Strict comparisons keep the first tick reaching each extreme
        if mid > self.max_mid {
            self.max_mid = mid;
            self.max_index = index;
        }
        if mid < self.min_mid {
            self.min_mid = mid;
            self.min_index = index;
        }
        self.sum += mid;
        self.count += 1;
    }

    fn to_bucket(&self, bucket_size: Seconds) -> TimeBucket {
        let mean = (self.sum / self.count as f64).clamp(self.min_mid, self.max_mid);
        TimeBucket {
            key: self.key,
            bucket_start: self.key as f64 * bucket_size,
            bucket_size,
            max_mid: self.max_mid,
            max_index: self.max_index,
            min_mid: self.min_mid,
            min_index: self.min_index,
            mean_mid: mean,
            tick_count: self.count,
        }
    }
}

/// Partition ticks into time buckets, ordered by bucket start.
///
/// Buckets without ticks are never produced. Ticks with a non-finite time
/// or mid price are skipped.
pub fn bin_ticks(ticks: &TickTable, bucket_size: Seconds) -> Result<Vec<TimeBucket>> {
    if !(bucket_size.is_finite() && bucket_size > 0.0) {
        return Err(Error::config(format!(
            "bucket size must be positive and finite, got {bucket_size}"
        )));
    }

    let t0 = match ticks.first() {
        Some(tick) => tick.transaction_time,
        None => return Ok(Vec::new()),
    };

    let mut buckets: BTreeMap<i64, BucketAccumulator> = BTreeMap::new();
    let mut skipped = 0usize;

    for (index, tick) in ticks.iter().enumerate() {
        let mid = tick.mid_price;
        if !mid.is_finite() || !tick.transaction_time.is_finite() {
            skipped += 1;
            continue;
        }
        let key = bucket_key(tick.transaction_time, t0, bucket_size);
        buckets
            .entry(key)
            .and_modify(|acc| acc.add(index, mid))
            .or_insert_with(|| BucketAccumulator::new(key, index, mid));
    }

    if skipped > 0 {
        warn!(skipped, "skipped ticks with non-finite time or mid price");
    }

    let result: Vec<TimeBucket> = buckets.values().map(|acc| acc.to_bucket(bucket_size)).collect();
    debug!(ticks = ticks.len(), buckets = result.len(), bucket_size, "binned ticks");
    Ok(result)
}

/// Look up the bucket with a given key.
pub fn find_bucket(buckets: &[TimeBucket], key: i64) -> Result<&TimeBucket> {
    buckets
        .binary_search_by_key(&key, |b| b.key)
        .map(|i| &buckets[i])
        .map_err(|_| Error::EmptyBucket(key))
}
