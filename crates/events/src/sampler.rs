//! As-of price sampling for post-event drift.

use drift_core::{Error, Result, Seconds, TickIndex, TickTable};

/// Last-observation-carried-forward lookups into a time-ordered tick table.
pub struct ForwardSampler<'a> {
    ticks: &'a TickTable,
}

impl<'a> ForwardSampler<'a> {
    /// Create a sampler. The table must be ordered by transaction time.
    pub fn new(ticks: &'a TickTable) -> Self {
        Self { ticks }
    }

    /// Index of the latest tick with `transaction_time <= timestamp`.
    ///
    /// With several ticks at the same time the last one wins.
    pub fn sample_index(&self, timestamp: Seconds) -> Result<TickIndex> {
        let count = self
            .ticks
            .as_slice()
            .partition_point(|t| t.transaction_time <= timestamp);
        if count == 0 {
            return Err(Error::NoPriorObservation {
                timestamp,
                first: self.ticks.first().map(|t| t.transaction_time),
            });
        }
        Ok(count - 1)
    }

    /// Mid price as of `timestamp`.
    pub fn sample(&self, timestamp: Seconds) -> Result<f64> {
        self.sample_index(timestamp).map(|i| self.ticks[i].mid_price)
    }
}

/// Drift after an event normalized by the event's own move:
/// (P2 - P1) / (P1 - P0).
pub fn post_event_relative_change(p0: f64, p1: f64, p2: f64) -> Result<f64> {
    let move_size = p1 - p0;
    if move_size == 0.0 {
        return Err(Error::undefined_ratio(format!(
            "event start and end price are both {p1}"
        )));
    }
    Ok((p2 - p1) / move_size)
}

/// Total move from the event start normalized by the event's own move:
/// (P2 - P0) / (P1 - P0).
pub fn normalized_drift(p0: f64, p1: f64, p2: f64) -> Result<f64> {
    post_event_relative_change(p0, p1, p2).map(|r| r + 1.0)
}
