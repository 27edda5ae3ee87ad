//! Basic feed statistics: time span, spread and traded volume.

use drift_core::{Seconds, TickTable, TradeRecord};
use serde::Serialize;
use statrs::statistics::Statistics;

/// Overview of one order-book table and, optionally, its trades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSummary {
    pub ticks: usize,
    pub start_time: Option<Seconds>,
    pub end_time: Option<Seconds>,
    /// First transaction time, RFC 3339.
    pub start_utc: Option<String>,
    pub end_utc: Option<String>,
    pub mean_spread: Option<f64>,
    pub max_spread: Option<f64>,
    pub trades: usize,
    /// Sum of |trade_qty|.
    pub traded_volume: f64,
}

impl FeedSummary {
    pub fn new(ticks: &TickTable, trades: &[TradeRecord]) -> Self {
        let first = ticks.first();
        let last = ticks.as_slice().last();
        let spreads: Vec<f64> = ticks.iter().map(|t| t.spread()).filter(|s| s.is_finite()).collect();

        let (mean_spread, max_spread) = if spreads.is_empty() {
            (None, None)
        } else {
            (
                Some(spreads.iter().mean()),
                Some(spreads.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            )
        };

        Self {
            ticks: ticks.len(),
            start_time: first.map(|t| t.transaction_time),
            end_time: last.map(|t| t.transaction_time),
            start_utc: first.and_then(|t| t.transaction_utc()).map(|dt| dt.to_rfc3339()),
            end_utc: last.and_then(|t| t.transaction_utc()).map(|dt| dt.to_rfc3339()),
            mean_spread,
            max_spread,
            trades: trades.len(),
            traded_volume: trades.iter().map(|t| t.trade_qty.abs()).sum(),
        }
    }

    /// Seconds between the first and last tick.
    pub fn duration(&self) -> Option<Seconds> {
        Some(self.end_time? - self.start_time?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn make_trade(qty: f64) -> TradeRecord {
        TradeRecord {
            received_time: 1.0,
            md_entry_time: 1.0,
            transaction_time: 1.0,
            sequence_id: 0,
            trade_qty: qty,
            trade_price: 100.0,
        }
    }

    #[test]
    fn test_summary() {
        let ticks: TickTable = vec![
            make_tick(1_600_000_000.0, 99.0, 101.0),
            make_tick(1_600_000_010.0, 99.5, 100.5),
        ]
        .into_iter()
        .collect();
        let trades = vec![make_trade(0.5), make_trade(-1.5)];

        let s = FeedSummary::new(&ticks, &trades);
        assert_eq!(s.ticks, 2);
        assert_relative_eq!(s.duration().unwrap(), 10.0);
        assert_relative_eq!(s.mean_spread.unwrap(), 1.5);
        assert_relative_eq!(s.max_spread.unwrap(), 2.0);
        assert_eq!(s.trades, 2);
        assert_relative_eq!(s.traded_volume, 2.0);
        assert_eq!(s.start_utc.as_deref(), Some("2020-09-13T12:26:40+00:00"));
    }

    #[test]
    fn test_empty() {
        let s = FeedSummary::new(&TickTable::new(), &[]);
        assert_eq!(s.ticks, 0);
        assert!(s.duration().is_none());
        assert!(s.mean_spread.is_none());
        assert_relative_eq!(s.traded_volume, 0.0);
    }
}
