//! Directional event classification of time buckets.
//!
//! Each bucket becomes one event: the order of its extrema gives the
//! direction, the signed relative range gives the size bucket, and the
//! as-of sampler measures where price went after the event ended.

use crate::sampler::{post_event_relative_change, ForwardSampler};
use drift_core::{
    Detection, Direction, Error, Event, PostEventSample, Result, RowError, RowLocation, Seconds,
    TickTable, TimeBucket,
};
use tracing::{debug, warn};

/// Lower edges of size buckets 1..=4, applied to |r|.
pub const SIZE_THRESHOLDS: [f64; 4] = [0.0005, 0.0010, 0.0020, 0.0040];

/// Map a signed relative change onto -4..=4.
///
/// Buckets are symmetric in magnitude: |r| >= 0.004 is ±4, [0.002, 0.004)
/// is ±3 and so on down to |r| < 0.0005, which is 0. NaN maps to 0.
pub fn size_bucket(r: f64) -> i8 {
    let magnitude = r.abs();
    let level = SIZE_THRESHOLDS.iter().take_while(|&&t| magnitude >= t).count() as i8;
    if r < 0.0 {
        -level
    } else {
        level
    }
}

/// Direction, bounds and size of a single bucket, before drift sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMove {
    pub direction: Direction,
    pub start_time: Seconds,
    pub end_time: Seconds,
    pub start_price: f64,
    pub end_price: f64,
    pub start_index: usize,
    pub end_index: usize,
    pub relative_change: f64,
    pub size_bucket: i8,
}

/// Classify one bucket against the tick table it was built from.
pub fn classify_bucket(bucket: &TimeBucket, ticks: &TickTable) -> Result<BucketMove> {
    let tick_at = |index: usize| {
        ticks.get(index).ok_or_else(|| {
            Error::data(format!(
                "bucket {} refers to tick #{index} of a {}-tick table",
                bucket.key,
                ticks.len()
            ))
        })
    };
    let max_ts = tick_at(bucket.max_index)?.transaction_time;
    let min_ts = tick_at(bucket.min_index)?.transaction_time;

    let direction = Direction::from_extrema(min_ts, max_ts);
    let relative_change = bucket.relative_price_change()? * direction.sign_f64();

    let (start_index, end_index, start_price, end_price) = match direction {
        Direction::Up => (bucket.min_index, bucket.max_index, bucket.min_mid, bucket.max_mid),
        Direction::Down => (bucket.max_index, bucket.min_index, bucket.max_mid, bucket.min_mid),
    };

    Ok(BucketMove {
        direction,
        start_time: max_ts.min(min_ts),
        end_time: max_ts.max(min_ts),
        start_price,
        end_price,
        start_index,
        end_index,
        relative_change,
        size_bucket: size_bucket(relative_change),
    })
}

/// Turns buckets into events with post-event drift samples.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    /// Sampling delays after event end (seconds), in output order.
    delays: Vec<Seconds>,
}

impl EventClassifier {
    /// Create a classifier sampling drift at the given delays.
    pub fn new(delays: Vec<Seconds>) -> Self {
        Self { delays }
    }

    pub fn delays(&self) -> &[Seconds] {
        &self.delays
    }

    /// Classify every bucket.
    ///
    /// A bucket that cannot be classified, or an event whose drift cannot be
    /// normalized, is reported in `errors`; the rest of the batch goes on.
    pub fn classify(&self, ticks: &TickTable, buckets: &[TimeBucket]) -> Detection<Event> {
        let sampler = ForwardSampler::new(ticks);
        let mut detection = Detection::default();

        for bucket in buckets {
            let mv = match classify_bucket(bucket, ticks) {
                Ok(mv) => mv,
                Err(e) => {
                    warn!(bucket = bucket.key, error = %e, "bucket not classified");
                    detection.errors.push(RowError::new(RowLocation::Bucket(bucket.key), e));
                    continue;
                }
            };

            let event = self.sample_drift(bucket, mv, &sampler, &mut detection.errors);
            detection.events.push(event);
        }

        debug!(
            buckets = buckets.len(),
            events = detection.events.len(),
            errors = detection.errors.len(),
            "classified buckets"
        );
        detection
    }

    fn sample_drift(
        &self,
        bucket: &TimeBucket,
        mv: BucketMove,
        sampler: &ForwardSampler<'_>,
        errors: &mut Vec<RowError>,
    ) -> Event {
        let location = RowLocation::EventEnd(mv.end_time);
        let mut post_event = Vec::with_capacity(self.delays.len());
        let mut ratio_flagged = false;

        for &delay in &self.delays {
            let sample_time = mv.end_time + delay;
            let p2 = match sampler.sample(sample_time) {
                Ok(p) => p,
                Err(e) => {
                    errors.push(RowError::new(location, e));
                    continue;
                }
            };

            let relative = match post_event_relative_change(mv.start_price, mv.end_price, p2) {
                Ok(r) => Some(r),
                Err(e) => {
                    // Zero-size events fail the same way for every delay; flag once
                    if !ratio_flagged {
                        errors.push(RowError::new(location, e));
                        ratio_flagged = true;
                    }
                    None
                }
            };

            post_event.push(PostEventSample {
                delay,
                sample_time,
                post_event_price: p2,
                post_event_relative_change: relative,
            });
        }

        Event {
            bucket_key: bucket.key,
            bucket_start: bucket.bucket_start,
            direction: mv.direction,
            start_time: mv.start_time,
            end_time: mv.end_time,
            start_price: mv.start_price,
            end_price: mv.end_price,
            start_index: mv.start_index,
            end_index: mv.end_index,
            relative_change: mv.relative_change,
            size_bucket: mv.size_bucket,
            post_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::bin_ticks;
    use approx::assert_relative_eq;
    use drift_core::{OrderBookRecord, Tick};

    fn make_tick(ts: f64, bid: f64, ask: f64) -> Tick {
        Tick::from_record(&OrderBookRecord {
            received_time: ts,
            md_entry_time: ts,
            transaction_time: ts,
            sequence_id: 0,
            bid_qty: 1.0,
            bid_price: bid,
            ask_qty: 1.0,
            ask_price: ask,
        })
    }

    fn table_from_mids(points: &[(f64, f64)]) -> TickTable {
        points
            .iter()
            .map(|&(ts, mid)| make_tick(ts, mid - 0.5, mid + 0.5))
            .collect()
    }

    #[test]
    fn test_size_bucket_table() {
        let cases = [
            (-0.0100, -4),
            (-0.0040, -4),
            (-0.0039999, -3),
            (-0.0020, -3),
            (-0.0019999, -2),
            (-0.0010, -2),
            (-0.0009999, -1),
            (-0.0005, -1),
            (-0.0004999, 0),
            (0.0, 0),
            (0.0004999, 0),
            (0.0005, 1),
            (0.0009999, 1),
            (0.0010, 2),
            (0.0019999, 2),
            (0.0020, 3),
            (0.0039999, 3),
            (0.0040, 4),
            (0.5, 4),
        ];
        for (r, expected) in cases {
            assert_eq!(size_bucket(r), expected, "r = {r}");
        }
        assert_eq!(size_bucket(f64::NAN), 0);
        assert_eq!(size_bucket(f64::NEG_INFINITY), -4);
    }

    #[test]
    fn test_down_move_scenario() {
        // bid/ask (99.5, 100.5), (100, 101), (99, 100): mids 100, 100.5, 99.5
        let ticks: TickTable = vec![
            make_tick(0.0, 99.5, 100.5),
            make_tick(1.0, 100.0, 101.0),
            make_tick(2.0, 99.0, 100.0),
        ]
        .into_iter()
        .collect();
        let buckets = bin_ticks(&ticks, 3.0).unwrap();
        assert_eq!(buckets.len(), 1);

        let mv = classify_bucket(&buckets[0], &ticks).unwrap();
        assert_eq!(mv.direction, Direction::Down);
        assert_relative_eq!(mv.relative_change, -0.01);
        assert_eq!(mv.size_bucket, -4);
        assert_eq!(mv.start_time, 1.0);
        assert_eq!(mv.end_time, 2.0);
        assert_relative_eq!(mv.start_price, 100.5);
        assert_relative_eq!(mv.end_price, 99.5);
        assert_eq!((mv.start_index, mv.end_index), (1, 2));
    }

    #[test]
    fn test_up_move() {
        let ticks = table_from_mids(&[(0.0, 100.0), (0.5, 99.9), (0.9, 100.2)]);
        let buckets = bin_ticks(&ticks, 1.0).unwrap();
        let mv = classify_bucket(&buckets[0], &ticks).unwrap();

        assert_eq!(mv.direction, Direction::Up);
        assert!(mv.relative_change > 0.0);
        assert_eq!(mv.size_bucket, 3);
        assert_eq!(mv.start_time, 0.5);
        assert_eq!(mv.end_time, 0.9);
    }

    #[test]
    fn test_single_tick_bucket_is_up() {
        let ticks = table_from_mids(&[(0.0, 100.0)]);
        let buckets = bin_ticks(&ticks, 1.0).unwrap();
        let mv = classify_bucket(&buckets[0], &ticks).unwrap();

        assert_eq!(mv.direction, Direction::Up);
        assert_eq!(mv.relative_change, 0.0);
        assert_eq!(mv.size_bucket, 0);
        assert_eq!(mv.start_time, mv.end_time);
    }

    #[test]
    fn test_same_timestamp_extrema_is_up() {
        let ticks = table_from_mids(&[(0.0, 100.0), (0.0, 101.0)]);
        let buckets = bin_ticks(&ticks, 1.0).unwrap();
        let mv = classify_bucket(&buckets[0], &ticks).unwrap();
        assert_eq!(mv.direction, Direction::Up);
    }

    #[test]
    fn test_stale_index_is_an_error() {
        let ticks = table_from_mids(&[(0.0, 100.0), (0.1, 101.0)]);
        let mut bucket = bin_ticks(&ticks, 1.0).unwrap().remove(0);
        bucket.max_index = 10;
        assert!(matches!(classify_bucket(&bucket, &ticks), Err(Error::Data(_))));
    }

    #[test]
    fn test_classify_with_drift() {
        let ticks = table_from_mids(&[
            (0.00, 100.0),
            (0.05, 100.5), // bucket 0 high: up move 100 -> 100.5
            (0.12, 100.25),
            (0.30, 100.0),
        ]);
        let buckets = bin_ticks(&ticks, 0.1).unwrap();
        let classifier = EventClassifier::new(vec![0.1, 0.2]);
        let detection = classifier.classify(&ticks, &buckets);

        let first = &detection.events[0];
        assert_eq!(first.direction, Direction::Up);
        assert_eq!(first.post_event.len(), 2);

        // end 0.05 + 0.1 -> as of 0.12 = 100.25; half the move given back
        let s = first.sample_for(0.1).unwrap();
        assert_relative_eq!(s.post_event_price, 100.25);
        assert_relative_eq!(s.post_event_relative_change.unwrap(), -0.5);

        // end 0.05 + 0.2 -> as of 0.12 still 100.25
        let s = first.sample_for(0.2).unwrap();
        assert_relative_eq!(s.post_event_price, 100.25);
    }

    #[test]
    fn test_zero_size_events_flagged_not_fatal() {
        let ticks = table_from_mids(&[(0.0, 100.0), (0.5, 100.0), (1.2, 100.0), (1.5, 101.0)]);
        let buckets = bin_ticks(&ticks, 1.0).unwrap();
        let classifier = EventClassifier::new(vec![0.1, 0.5, 1.0]);
        let detection = classifier.classify(&ticks, &buckets);

        assert_eq!(detection.events.len(), 2);
        // Flat first bucket: one UndefinedRatio, samples kept with no ratio
        let flat = &detection.events[0];
        assert_eq!(flat.size_bucket, 0);
        assert!(flat.post_event.iter().all(|s| s.post_event_relative_change.is_none()));
        assert_eq!(detection.errors.len(), 1);
        assert!(matches!(detection.errors[0].error, Error::UndefinedRatio(_)));

        // Second bucket still carries its ratios
        assert!(detection.events[1]
            .post_event
            .iter()
            .all(|s| s.post_event_relative_change.is_some()));
    }

    #[test]
    fn test_zero_mean_bucket_collected() {
        let ticks: TickTable = vec![
            make_tick(0.0, -1.0, 1.0),
            make_tick(1.0, 99.0, 101.0),
            make_tick(1.5, 101.0, 103.0),
        ]
        .into_iter()
        .collect();
        let buckets = bin_ticks(&ticks, 1.0).unwrap();
        let detection = EventClassifier::new(vec![]).classify(&ticks, &buckets);

        assert_eq!(detection.events.len(), 1);
        assert_eq!(detection.events[0].bucket_key, 1);
        assert_eq!(detection.errors.len(), 1);
        assert_eq!(detection.errors[0].location, RowLocation::Bucket(0));
        assert!(matches!(detection.errors[0].error, Error::DivisionByZero(_)));
    }
}
