//! Post-event drift statistics.
//!
//! Groups the post-event relative change `(P2 - P1) / (P1 - P0)` by
//! sampling delay and size bucket.

use drift_core::{Event, Seconds};
use ordered_float::OrderedFloat;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Drift statistics for one (delay, size bucket) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftStats {
    pub delay: Seconds,
    pub size_bucket: i8,
    /// Events with a defined relative change.
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation, 0 with fewer than two events.
    pub std_dev: f64,
    /// mean - std_dev
    pub lower: f64,
    /// mean + std_dev
    pub upper: f64,
}

impl DriftStats {
    fn from_changes(delay: Seconds, size_bucket: i8, changes: &[f64]) -> Self {
        let mean = changes.iter().mean();
        let std_dev = if changes.len() < 2 {
            0.0
        } else {
            changes.iter().std_dev()
        };
        Self {
            delay,
            size_bucket,
            count: changes.len(),
            mean,
            std_dev,
            lower: mean - std_dev,
            upper: mean + std_dev,
        }
    }
}

/// Drift statistics for every observed delay and size bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport {
    /// Ordered by delay, then size bucket.
    pub cells: Vec<DriftStats>,
    /// Events whose drift could not be normalized.
    pub undefined: usize,
}

impl DriftReport {
    pub fn from_events(events: &[Event]) -> Self {
        let mut groups: BTreeMap<(OrderedFloat<f64>, i8), Vec<f64>> = BTreeMap::new();
        let mut undefined = 0usize;

        for event in events {
            for sample in &event.post_event {
                match sample.post_event_relative_change {
                    Some(r) => groups
                        .entry((OrderedFloat(sample.delay), event.size_bucket))
                        .or_default()
                        .push(r),
                    None => undefined += 1,
                }
            }
        }

        let cells = groups
            .iter()
            .map(|((delay, bucket), changes)| DriftStats::from_changes(delay.0, *bucket, changes))
            .collect();

        Self { cells, undefined }
    }

    /// Cell for one delay and size bucket.
    pub fn cell(&self, delay: Seconds, size_bucket: i8) -> Option<&DriftStats> {
        self.cells
            .iter()
            .find(|c| c.delay == delay && c.size_bucket == size_bucket)
    }

    /// Cells sampled at one delay, by size bucket.
    pub fn at_delay(&self, delay: Seconds) -> impl Iterator<Item = &DriftStats> {
        self.cells.iter().filter(move |c| c.delay == delay)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use drift_core::{Direction, PostEventSample};

    fn make_event(size_bucket: i8, samples: &[(f64, Option<f64>)]) -> Event {
        Event {
            bucket_key: 0,
            bucket_start: 0.0,
            direction: Direction::Up,
            start_time: 0.0,
            end_time: 0.05,
            start_price: 100.0,
            end_price: 101.0,
            start_index: 0,
            end_index: 1,
            relative_change: 0.01,
            size_bucket,
            post_event: samples
                .iter()
                .map(|&(delay, r)| PostEventSample {
                    delay,
                    sample_time: 0.05 + delay,
                    post_event_price: 101.0,
                    post_event_relative_change: r,
                })
                .collect(),
        }
    }

    #[test]
    fn test_groups_by_delay_and_bucket() {
        let events = vec![
            make_event(4, &[(0.1, Some(-0.2)), (1.0, Some(0.5))]),
            make_event(4, &[(0.1, Some(0.0)), (1.0, Some(0.5))]),
            make_event(-2, &[(0.1, Some(0.3)), (1.0, None)]),
        ];
        let report = DriftReport::from_events(&events);

        assert_eq!(report.cells.len(), 3);
        assert_eq!(report.undefined, 1);

        let cell = report.cell(0.1, 4).unwrap();
        assert_eq!(cell.count, 2);
        assert_relative_eq!(cell.mean, -0.1);
        assert_relative_eq!(cell.std_dev, 0.02_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(cell.upper - cell.lower, 2.0 * cell.std_dev, epsilon = 1e-12);

        let flat = report.cell(1.0, 4).unwrap();
        assert_relative_eq!(flat.std_dev, 0.0);

        let single = report.cell(0.1, -2).unwrap();
        assert_eq!(single.count, 1);
        assert_relative_eq!(single.mean, 0.3);
        assert_relative_eq!(single.std_dev, 0.0);
        assert!(report.cell(1.0, -2).is_none());

        let buckets: Vec<i8> = report.at_delay(0.1).map(|c| c.size_bucket).collect();
        assert_eq!(buckets, vec![-2, 4]);
    }

    #[test]
    fn test_empty() {
        let report = DriftReport::from_events(&[]);
        assert!(report.is_empty());
        assert_eq!(report.undefined, 0);
    }
}
