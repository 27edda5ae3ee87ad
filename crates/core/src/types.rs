//! Core data types for the feed-drift system.

use crate::error::{Error, Result, RowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time in seconds since Unix epoch, as decoded from the feed.
pub type Seconds = f64;

/// Position of a tick inside a [`TickTable`].
pub type TickIndex = usize;

/// Nanoseconds per second (feed timestamp scale).
pub const TIME_SCALE: f64 = 1e9;

/// Fixed-point scale of feed quantities and prices.
pub const FIXED_POINT_SCALE: f64 = 1e8;

/// Convert feed seconds to a UTC wall-clock time.
pub fn seconds_to_utc(ts: Seconds) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }
    let secs = ts.floor();
    let nanos = ((ts - secs) * TIME_SCALE).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Order-book record exactly as laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOrderBookRecord {
    pub received_time_ns: u64,
    pub md_entry_time_ns: u64,
    pub transaction_time_ns: u64,
    pub sequence_id: u64,
    pub bid_qty: i64,
    pub bid_price: i64,
    pub ask_qty: i64,
    pub ask_price: i64,
}

/// Public trade record exactly as laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTradeRecord {
    pub received_time_ns: u64,
    pub md_entry_time_ns: u64,
    pub transaction_time_ns: u64,
    pub sequence_id: u64,
    pub trade_qty: i64,
    pub trade_price: i64,
}

#[inline]
fn ns_to_seconds(ns: u64) -> Seconds {
    ns as f64 / TIME_SCALE
}

#[inline]
fn seconds_to_ns(ts: Seconds) -> u64 {
    (ts * TIME_SCALE).round() as u64
}

#[inline]
fn fixed_to_decimal(v: i64) -> f64 {
    v as f64 / FIXED_POINT_SCALE
}

#[inline]
fn decimal_to_fixed(v: f64) -> i64 {
    (v * FIXED_POINT_SCALE).round() as i64
}

/// A decoded order-book quote update (best bid/ask).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookRecord {
    /// Local receive time.
    pub received_time: Seconds,
    /// Market-data entry time.
    pub md_entry_time: Seconds,
    /// Exchange transaction time.
    pub transaction_time: Seconds,
    /// Feed sequence number.
    pub sequence_id: u64,
    pub bid_qty: f64,
    pub bid_price: f64,
    pub ask_qty: f64,
    pub ask_price: f64,
}

impl From<RawOrderBookRecord> for OrderBookRecord {
    fn from(raw: RawOrderBookRecord) -> Self {
        Self {
            received_time: ns_to_seconds(raw.received_time_ns),
            md_entry_time: ns_to_seconds(raw.md_entry_time_ns),
            transaction_time: ns_to_seconds(raw.transaction_time_ns),
            sequence_id: raw.sequence_id,
            bid_qty: fixed_to_decimal(raw.bid_qty),
            bid_price: fixed_to_decimal(raw.bid_price),
            ask_qty: fixed_to_decimal(raw.ask_qty),
            ask_price: fixed_to_decimal(raw.ask_price),
        }
    }
}

impl OrderBookRecord {
    /// Inverse of the decode scaling, rounded to the nearest integer.
    ///
    /// Exact for any field whose integer form is below 2^53.
    pub fn to_raw(&self) -> RawOrderBookRecord {
        RawOrderBookRecord {
            received_time_ns: seconds_to_ns(self.received_time),
            md_entry_time_ns: seconds_to_ns(self.md_entry_time),
            transaction_time_ns: seconds_to_ns(self.transaction_time),
            sequence_id: self.sequence_id,
            bid_qty: decimal_to_fixed(self.bid_qty),
            bid_price: decimal_to_fixed(self.bid_price),
            ask_qty: decimal_to_fixed(self.ask_qty),
            ask_price: decimal_to_fixed(self.ask_price),
        }
    }
}

/// A decoded public trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub received_time: Seconds,
    pub md_entry_time: Seconds,
    pub transaction_time: Seconds,
    pub sequence_id: u64,
    pub trade_qty: f64,
    pub trade_price: f64,
}

impl From<RawTradeRecord> for TradeRecord {
    fn from(raw: RawTradeRecord) -> Self {
        Self {
            received_time: ns_to_seconds(raw.received_time_ns),
            md_entry_time: ns_to_seconds(raw.md_entry_time_ns),
            transaction_time: ns_to_seconds(raw.transaction_time_ns),
            sequence_id: raw.sequence_id,
            trade_qty: fixed_to_decimal(raw.trade_qty),
            trade_price: fixed_to_decimal(raw.trade_price),
        }
    }
}

impl TradeRecord {
    /// Inverse of the decode scaling, rounded to the nearest integer.
    pub fn to_raw(&self) -> RawTradeRecord {
        RawTradeRecord {
            received_time_ns: seconds_to_ns(self.received_time),
            md_entry_time_ns: seconds_to_ns(self.md_entry_time),
            transaction_time_ns: seconds_to_ns(self.transaction_time),
            sequence_id: self.sequence_id,
            trade_qty: decimal_to_fixed(self.trade_qty),
            trade_price: decimal_to_fixed(self.trade_price),
        }
    }
}

/// An order-book row with its derived mid price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub received_time: Seconds,
    pub md_entry_time: Seconds,
    pub transaction_time: Seconds,
    pub sequence_id: u64,
    pub bid_qty: f64,
    pub bid_price: f64,
    pub ask_qty: f64,
    pub ask_price: f64,
    /// (bid + ask) / 2, fixed when the tick is built.
    pub mid_price: f64,
}

impl Tick {
    /// Build a tick from a decoded record, deriving the mid price.
    pub fn from_record(record: &OrderBookRecord) -> Self {
        Self {
            received_time: record.received_time,
            md_entry_time: record.md_entry_time,
            transaction_time: record.transaction_time,
            sequence_id: record.sequence_id,
            bid_qty: record.bid_qty,
            bid_price: record.bid_price,
            ask_qty: record.ask_qty,
            ask_price: record.ask_price,
            mid_price: mid_price(record.bid_price, record.ask_price),
        }
    }

    /// Calculate spread.
    #[inline]
    pub fn spread(&self) -> f64 {
        self.ask_price - self.bid_price
    }

    /// Transaction time as UTC.
    pub fn transaction_utc(&self) -> Option<DateTime<Utc>> {
        seconds_to_utc(self.transaction_time)
    }
}

/// Mid price of a bid/ask pair.
#[inline]
pub fn mid_price(bid_price: f64, ask_price: f64) -> f64 {
    0.5 * (bid_price + ask_price)
}

/// Append-only arena of ticks in feed order.
///
/// Buckets and events refer to ticks by [`TickIndex`]; an index handed out
/// for a table is always `< len()` of that table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickTable {
    ticks: Vec<Tick>,
}

impl TickTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ticks: Vec::with_capacity(capacity),
        }
    }

    /// Append a tick and return its index.
    pub fn push(&mut self, tick: Tick) -> TickIndex {
        self.ticks.push(tick);
        self.ticks.len() - 1
    }

    pub fn get(&self, index: TickIndex) -> Option<&Tick> {
        self.ticks.get(index)
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn first(&self) -> Option<&Tick> {
        self.ticks.first()
    }

    pub fn as_slice(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tick> {
        self.ticks.iter()
    }

    /// Transaction times, in table order.
    pub fn times(&self) -> Vec<Seconds> {
        self.ticks.iter().map(|t| t.transaction_time).collect()
    }

    /// Mid prices, in table order.
    pub fn mids(&self) -> Vec<f64> {
        self.ticks.iter().map(|t| t.mid_price).collect()
    }
}

impl std::ops::Index<TickIndex> for TickTable {
    type Output = Tick;

    fn index(&self, index: TickIndex) -> &Tick {
        &self.ticks[index]
    }
}

impl FromIterator<Tick> for TickTable {
    fn from_iter<I: IntoIterator<Item = Tick>>(iter: I) -> Self {
        Self {
            ticks: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TickTable {
    type Item = &'a Tick;
    type IntoIter = std::slice::Iter<'a, Tick>;

    fn into_iter(self) -> Self::IntoIter {
        self.ticks.iter()
    }
}

/// Aggregated mid-price statistics for one fixed-width time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Bucket number: floor((t - t0) / bucket_size).
    pub key: i64,
    /// Bucket start offset from t0 (key * bucket_size).
    pub bucket_start: Seconds,
    /// Bucket width.
    pub bucket_size: Seconds,
    pub max_mid: f64,
    /// First tick reaching `max_mid`.
    pub max_index: TickIndex,
    pub min_mid: f64,
    /// First tick reaching `min_mid`.
    pub min_index: TickIndex,
    pub mean_mid: f64,
    /// Number of ticks in the bucket (always > 0).
    pub tick_count: usize,
}

impl TimeBucket {
    /// Bucket end offset (exclusive).
    pub fn bucket_end(&self) -> Seconds {
        self.bucket_start + self.bucket_size
    }

    /// (max - min) / mean.
    pub fn relative_price_change(&self) -> Result<f64> {
        if self.mean_mid == 0.0 {
            return Err(Error::division_by_zero(format!(
                "mean mid price of bucket {} is zero",
                self.key
            )));
        }
        Ok((self.max_mid - self.min_mid) / self.mean_mid)
    }
}

/// Direction of a price move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i8)]
pub enum Direction {
    /// Low came first (or at the same time), then the high.
    Up = 1,
    /// High came first, then the low.
    Down = -1,
}

impl Direction {
    /// Direction from extrema timestamps; a tie is an upward move.
    #[inline]
    pub fn from_extrema(min_timestamp: Seconds, max_timestamp: Seconds) -> Self {
        if min_timestamp <= max_timestamp {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// Get the sign as i8.
    #[inline]
    pub fn sign(self) -> i8 {
        self as i8
    }

    /// Get the sign as f64.
    #[inline]
    pub fn sign_f64(self) -> f64 {
        self.sign() as f64
    }
}

/// Price observed some delay after an event ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostEventSample {
    /// Delay after the event end (seconds).
    pub delay: Seconds,
    /// end_time + delay.
    pub sample_time: Seconds,
    /// As-of mid price at `sample_time` (P2).
    pub post_event_price: f64,
    /// (P2 - P1) / (P1 - P0); `None` when the event has zero size.
    pub post_event_relative_change: Option<f64>,
}

/// A price event derived from the extrema of one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Key of the source bucket.
    pub bucket_key: i64,
    pub bucket_start: Seconds,
    pub direction: Direction,
    pub start_time: Seconds,
    pub end_time: Seconds,
    /// P0.
    pub start_price: f64,
    /// P1.
    pub end_price: f64,
    pub start_index: TickIndex,
    pub end_index: TickIndex,
    /// Relative price change signed by direction.
    pub relative_change: f64,
    /// Magnitude class in -4..=4.
    pub size_bucket: i8,
    /// One entry per configured delay, in delay order.
    pub post_event: Vec<PostEventSample>,
}

impl Event {
    /// Post-event sample for a given delay, if one was taken.
    pub fn sample_for(&self, delay: Seconds) -> Option<&PostEventSample> {
        self.post_event.iter().find(|s| s.delay == delay)
    }
}

/// An event bounded by two consecutive EMA crossings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverEvent {
    pub start_idx: TickIndex,
    pub end_idx: TickIndex,
    pub start_time: Seconds,
    pub end_time: Seconds,
    pub start_price: f64,
    pub end_price: f64,
    pub duration: Seconds,
    pub relative_price_change: f64,
    /// Direction of the crossing that opens the interval.
    pub direction: Direction,
}

/// A significant peak of the EMA variance series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityPeak {
    pub peak_index: TickIndex,
    pub peak_height: f64,
    pub prominence: f64,
    pub left_bound_index: TickIndex,
    pub right_bound_index: TickIndex,
    /// Interpolated left crossing of the width line.
    pub left_position: f64,
    /// Interpolated right crossing of the width line.
    pub right_position: f64,
    /// right_position - left_position, in samples.
    pub width: f64,
}

/// Before/at/after reference prices around a volatility peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoints {
    pub p0_time: Seconds,
    pub p0: f64,
    pub p1_time: Seconds,
    pub p1: f64,
    pub p2_time: Seconds,
    pub p2: f64,
}

impl VolatilityPeak {
    /// Mids at the left bound, the peak and the right bound.
    pub fn reference_points(&self, ticks: &TickTable) -> Result<ReferencePoints> {
        let at = |i: TickIndex| {
            ticks.get(i).ok_or_else(|| {
                Error::insufficient_data(format!(
                    "tick #{i} is outside a table of {} ticks",
                    ticks.len()
                ))
            })
        };
        let before = at(self.left_bound_index)?;
        let peak = at(self.peak_index)?;
        let after = at(self.right_bound_index)?;

        Ok(ReferencePoints {
            p0_time: before.transaction_time,
            p0: before.mid_price,
            p1_time: peak.transaction_time,
            p1: peak.mid_price,
            p2_time: after.transaction_time,
            p2: after.mid_price,
        })
    }
}

/// Output of one detection pass: events plus localized failures.
#[derive(Debug)]
pub struct Detection<E> {
    pub events: Vec<E>,
    pub errors: Vec<RowError>,
}

impl<E> Detection<E> {
    pub fn new(events: Vec<E>, errors: Vec<RowError>) -> Self {
        Self { events, errors }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<E> Default for Detection<E> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_record(ts: f64, bid: f64, ask: f64) -> OrderBookRecord {
        OrderBookRecord {
            received_time: ts,
            md_entry_time: ts,
            transaction_time: ts,
            sequence_id: 1,
            bid_qty: 1.0,
            bid_price: bid,
            ask_qty: 1.0,
            ask_price: ask,
        }
    }

    #[test]
    fn test_tick_mid_and_spread() {
        let tick = Tick::from_record(&make_record(0.0, 99.0, 101.0));
        assert_relative_eq!(tick.mid_price, 100.0);
        assert_relative_eq!(tick.spread(), 2.0);
    }

    #[test]
    fn test_raw_scaling() {
        let raw = RawOrderBookRecord {
            received_time_ns: 2_500_000_000,
            md_entry_time_ns: 2_000_000_000,
            transaction_time_ns: 1_000_000_000,
            sequence_id: 42,
            bid_qty: 150_000_000,
            bid_price: 10_000_000_000,
            ask_qty: -50_000_000,
            ask_price: 10_050_000_000,
        };
        let rec = OrderBookRecord::from(raw);
        assert_eq!(rec.transaction_time, 1.0);
        assert_eq!(rec.received_time, 2.5);
        assert_eq!(rec.bid_price, 100.0);
        assert_eq!(rec.ask_price, 100.5);
        assert_eq!(rec.ask_qty, -0.5);
        assert_eq!(rec.sequence_id, 42);
        assert_eq!(rec.to_raw(), raw);
    }

    #[test]
    fn test_trade_scaling_inverse() {
        let raw = RawTradeRecord {
            received_time_ns: 1_700_000_123,
            md_entry_time_ns: 1_700_000_100,
            transaction_time_ns: 1_700_000_000,
            sequence_id: 9,
            trade_qty: 12_345_678,
            trade_price: 2_000_012_345_678,
        };
        assert_eq!(TradeRecord::from(raw).to_raw(), raw);
    }

    #[test]
    fn test_relative_price_change() {
        let bucket = TimeBucket {
            key: 0,
            bucket_start: 0.0,
            bucket_size: 1.0,
            max_mid: 101.0,
            max_index: 1,
            min_mid: 99.0,
            min_index: 0,
            mean_mid: 100.0,
            tick_count: 2,
        };
        assert_relative_eq!(bucket.relative_price_change().unwrap(), 0.02);

        let zero = TimeBucket {
            max_mid: 0.0,
            min_mid: 0.0,
            mean_mid: 0.0,
            ..bucket
        };
        assert!(matches!(
            zero.relative_price_change(),
            Err(Error::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_direction_tie_is_up() {
        assert_eq!(Direction::from_extrema(1.0, 1.0), Direction::Up);
        assert_eq!(Direction::from_extrema(0.5, 1.0), Direction::Up);
        assert_eq!(Direction::from_extrema(2.0, 1.0), Direction::Down);
        assert_eq!(Direction::Down.sign(), -1);
    }

    #[test]
    fn test_tick_table_indices() {
        let mut table = TickTable::new();
        let a = table.push(Tick::from_record(&make_record(0.0, 99.0, 101.0)));
        let b = table.push(Tick::from_record(&make_record(1.0, 100.0, 102.0)));
        assert_eq!((a, b), (0, 1));
        assert_eq!(table.len(), 2);
        assert_relative_eq!(table[b].mid_price, 101.0);
        assert!(table.get(2).is_none());
        assert_eq!(table.times(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_seconds_to_utc() {
        let utc = seconds_to_utc(1.5).unwrap();
        assert_eq!(utc.timestamp(), 1);
        assert_eq!(utc.timestamp_subsec_millis(), 500);
        assert!(seconds_to_utc(f64::NAN).is_none());
    }

    #[test]
    fn test_reference_points_out_of_range() {
        let table: TickTable = vec![Tick::from_record(&make_record(0.0, 99.0, 101.0))]
            .into_iter()
            .collect();
        let peak = VolatilityPeak {
            peak_index: 0,
            peak_height: 1.0,
            prominence: 1.0,
            left_bound_index: 0,
            right_bound_index: 3,
            left_position: 0.0,
            right_position: 3.0,
            width: 3.0,
        };
        assert!(peak.reference_points(&table).is_err());
    }
}
