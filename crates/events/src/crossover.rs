//! EMA crossover event engine.
//!
//! A short and a long time-weighted EMA run over the mid-price series.
//! Every change of sign of their difference is a crossing, and the stretch
//! between two consecutive crossings is one event.

use crate::ema::ewm_mean;
use drift_core::config::CrossoverConfig;
use drift_core::{
    CrossoverEvent, Detection, Direction, Error, Result, RowError, RowLocation, Seconds,
    TickIndex, TickTable,
};
use statrs::statistics::Statistics;
use tracing::{debug, warn};

/// Crossing indices, each list in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Crossings {
    /// Short EMA moved above the long one.
    pub up: Vec<TickIndex>,
    /// Short EMA moved to or below the long one.
    pub down: Vec<TickIndex>,
}

impl Crossings {
    /// All crossings in time order.
    pub fn merged(&self) -> Vec<TickIndex> {
        let mut all: Vec<TickIndex> = self.up.iter().chain(&self.down).copied().collect();
        all.sort_unstable();
        all
    }

    /// Direction of the crossing at `index`, if there is one.
    pub fn direction_at(&self, index: TickIndex) -> Option<Direction> {
        if self.up.binary_search(&index).is_ok() {
            Some(Direction::Up)
        } else if self.down.binary_search(&index).is_ok() {
            Some(Direction::Down)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.up.len() + self.down.len()
    }

    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }
}

#[inline]
fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Find where `short - long` changes sign.
///
/// Up: previous sign <= 0 and current > 0. Down: previous > 0 and current
/// <= 0. The reported index is the first sample on the new side.
pub fn find_crossings(short: &[f64], long: &[f64]) -> Crossings {
    let mut crossings = Crossings::default();
    let mut prev: Option<i8> = None;

    for (i, (&s, &l)) in short.iter().zip(long).enumerate() {
        let cur = sign(s - l);
        if let Some(p) = prev {
            if p <= 0 && cur > 0 {
                crossings.up.push(i);
            } else if p > 0 && cur <= 0 {
                crossings.down.push(i);
            }
        }
        prev = Some(cur);
    }

    crossings
}

/// Events between consecutive crossings of the configured EMA pair.
///
/// An interval starting at a zero price is reported as a row error.
pub fn crossover_events(
    ticks: &TickTable,
    config: &CrossoverConfig,
) -> Result<Detection<CrossoverEvent>> {
    let times = ticks.times();
    let mids = ticks.mids();
    let short = ewm_mean(&times, &mids, config.short_half_life)?;
    let long = ewm_mean(&times, &mids, config.long_half_life)?;

    let crossings = find_crossings(&short, &long);
    let indices = crossings.merged();
    let mut detection = Detection::default();

    for pair in indices.windows(2) {
        let (start_idx, end_idx) = (pair[0], pair[1]);
        let start_price = mids[start_idx];
        let end_price = mids[end_idx];

        if start_price == 0.0 {
            let e = Error::division_by_zero(format!("crossover at tick #{start_idx} starts at zero price"));
            warn!(start_idx, error = %e, "crossover interval skipped");
            detection.errors.push(RowError::new(RowLocation::TickIndex(start_idx), e));
            continue;
        }

        detection.events.push(CrossoverEvent {
            start_idx,
            end_idx,
            start_time: times[start_idx],
            end_time: times[end_idx],
            start_price,
            end_price,
            duration: times[end_idx] - times[start_idx],
            relative_price_change: (end_price - start_price) / start_price,
            direction: crossings.direction_at(start_idx).unwrap_or(Direction::Up),
        });
    }

    debug!(
        ticks = ticks.len(),
        up = crossings.up.len(),
        down = crossings.down.len(),
        events = detection.events.len(),
        "detected EMA crossovers"
    );
    Ok(detection)
}

/// Keep short events whose relative change is a statistical outlier.
///
/// Events with `duration < max_time` form the population; of those, only
/// the ones outside `mean ± k·std` (sample std) are kept. A population
/// smaller than two yields nothing.
pub fn filter_events(events: &[CrossoverEvent], max_time: Seconds, k: f64) -> Vec<CrossoverEvent> {
    let short: Vec<&CrossoverEvent> = events.iter().filter(|e| e.duration < max_time).collect();
    if short.len() < 2 {
        debug!(population = short.len(), "too few events for outlier filter");
        return Vec::new();
    }

    let changes: Vec<f64> = short.iter().map(|e| e.relative_price_change).collect();
    let mean = changes.iter().mean();
    let std = changes.iter().std_dev();
    let (lower, upper) = (mean - k * std, mean + k * std);

    let kept: Vec<CrossoverEvent> = short
        .into_iter()
        .filter(|e| e.relative_price_change > upper || e.relative_price_change < lower)
        .cloned()
        .collect();

    debug!(
        total = events.len(),
        population = changes.len(),
        kept = kept.len(),
        mean,
        std,
        "filtered crossover events"
    );
    kept
}
