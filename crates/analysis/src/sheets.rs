//! Drift export sheets.
//!
//! One sheet per sampling delay with a row per sized event:
//! P0 timestamp, P0, P1, P2 and (P2 - P0) / (P1 - P0).

use drift_core::{Event, Result, Seconds};
use drift_events::normalized_drift;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// One exported event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRow {
    pub p0_timestamp: Seconds,
    pub p0: f64,
    pub p1: f64,
    pub p2: f64,
    pub normalized_drift: f64,
}

/// All rows sampled at one delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSheet {
    pub delay: Seconds,
    pub rows: Vec<DriftRow>,
}

impl DriftSheet {
    /// Sheet title, e.g. `drift_0.5s`.
    pub fn name(&self) -> String {
        format!("drift_{}s", self.delay)
    }
}

/// Build one sheet per delay, in ascending delay order.
///
/// Events in size bucket 0 are left out, as are rows whose event start and
/// end prices are equal.
pub fn export_sheets(events: &[Event]) -> Vec<DriftSheet> {
    let mut sheets: BTreeMap<OrderedFloat<f64>, Vec<DriftRow>> = BTreeMap::new();
    let mut skipped = 0usize;

    for event in events.iter().filter(|e| e.size_bucket != 0) {
        for sample in &event.post_event {
            let rows = sheets.entry(OrderedFloat(sample.delay)).or_default();
            match normalized_drift(event.start_price, event.end_price, sample.post_event_price) {
                Ok(drift) => rows.push(DriftRow {
                    p0_timestamp: event.start_time,
                    p0: event.start_price,
                    p1: event.end_price,
                    p2: sample.post_event_price,
                    normalized_drift: drift,
                }),
                Err(_) => skipped += 1,
            }
        }
    }

    let sheets: Vec<DriftSheet> = sheets
        .into_iter()
        .map(|(delay, rows)| DriftSheet {
            delay: delay.into_inner(),
            rows,
        })
        .collect();
    debug!(sheets = sheets.len(), skipped, "exported drift sheets");
    sheets
}

/// Write sheets as one pretty-printed JSON document.
pub fn write_sheets(path: &Path, sheets: &[DriftSheet]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, sheets)?;
    writer.flush()?;
    debug!(path = %path.display(), sheets = sheets.len(), "wrote drift sheets");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use drift_core::{Direction, PostEventSample};

    fn make_event(start_time: f64, p0: f64, p1: f64, size_bucket: i8, samples: &[(f64, f64)]) -> Event {
        Event {
            bucket_key: 0,
            bucket_start: 0.0,
            direction: if p1 >= p0 { Direction::Up } else { Direction::Down },
            start_time,
            end_time: start_time + 0.05,
            start_price: p0,
            end_price: p1,
            start_index: 0,
            end_index: 1,
            relative_change: (p1 - p0) / p0,
            size_bucket,
            post_event: samples
                .iter()
                .map(|&(delay, p2)| PostEventSample {
                    delay,
                    sample_time: start_time + 0.05 + delay,
                    post_event_price: p2,
                    post_event_relative_change: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_sheets_per_delay() {
        let events = vec![
            make_event(1.0, 100.0, 101.0, 4, &[(0.5, 100.5), (0.1, 101.0)]),
            make_event(2.0, 100.0, 99.0, -4, &[(0.1, 98.0), (0.5, 99.5)]),
        ];
        let sheets = export_sheets(&events);

        assert_eq!(sheets.len(), 2);
        assert_relative_eq!(sheets[0].delay, 0.1);
        assert_eq!(sheets[0].name(), "drift_0.1s");
        assert_eq!(sheets[0].rows.len(), 2);
        assert_relative_eq!(sheets[0].rows[0].normalized_drift, 1.0);
        assert_relative_eq!(sheets[0].rows[1].normalized_drift, 2.0);

        assert_relative_eq!(sheets[1].delay, 0.5);
        assert_relative_eq!(sheets[1].rows[0].normalized_drift, 0.5);
        assert_relative_eq!(sheets[1].rows[0].p0_timestamp, 1.0);
        assert_relative_eq!(sheets[1].rows[1].normalized_drift, 0.5);
    }

    #[test]
    fn test_zero_bucket_and_flat_events_skipped() {
        let events = vec![
            make_event(1.0, 100.0, 100.01, 0, &[(0.1, 100.0)]),
            make_event(2.0, 100.0, 100.0, 1, &[(0.1, 100.0)]),
        ];
        let sheets = export_sheets(&events);
        assert_eq!(sheets.len(), 1);
        assert!(sheets[0].rows.is_empty());
    }

    #[test]
    fn test_write_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.json");
        let sheets = export_sheets(&[make_event(1.0, 100.0, 102.0, 4, &[(1.0, 103.0)])]);

        write_sheets(&path, &sheets).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<DriftSheet> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, sheets);
        assert_relative_eq!(back[0].rows[0].normalized_drift, 1.5);
    }
}
