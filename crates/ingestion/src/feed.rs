//! Fixed-width binary feed decoding.
//!
//! A feed file is a bare sequence of little-endian records with no header,
//! checksum or count prefix; the file length alone determines the record
//! count. Each record is a run of 8-byte fields: four unsigned nanosecond
//! / sequence fields followed by signed fixed-point (1e-8) quantities.

use drift_core::{
    Error, OrderBookRecord, RawOrderBookRecord, RawTradeRecord, Result, TradeRecord,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Width of one wire field.
const FIELD_WIDTH: usize = 8;

/// Record kinds carried by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordLayout {
    /// 4 x u64 + 4 x i64 (bid qty/price, ask qty/price).
    OrderBook,
    /// 4 x u64 + 2 x i64 (trade qty/price).
    PublicTrade,
}

impl RecordLayout {
    /// Number of 8-byte fields per record.
    pub fn field_count(self) -> usize {
        match self {
            RecordLayout::OrderBook => 8,
            RecordLayout::PublicTrade => 6,
        }
    }

    /// Record width in bytes.
    pub fn width(self) -> usize {
        self.field_count() * FIELD_WIDTH
    }

    /// Table name used by the store.
    pub fn name(self) -> &'static str {
        match self {
            RecordLayout::OrderBook => "order_book",
            RecordLayout::PublicTrade => "public_trade",
        }
    }

    /// Layout implied by a capture file name (`order_book.feed`, `public_trade.feed`).
    pub fn from_file_name(path: impl AsRef<Path>) -> Option<Self> {
        match path.as_ref().file_name()?.to_str()? {
            "order_book.feed" => Some(RecordLayout::OrderBook),
            "public_trade.feed" => Some(RecordLayout::PublicTrade),
            _ => None,
        }
    }

    /// Layout selected by a `-b` (book) or `-t` (trades) flag.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-b" => Some(RecordLayout::OrderBook),
            "-t" => Some(RecordLayout::PublicTrade),
            _ => None,
        }
    }
}

/// A decoded feed, one row per record in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "rows", rename_all = "snake_case")]
pub enum FeedTable {
    OrderBook(Vec<OrderBookRecord>),
    PublicTrade(Vec<TradeRecord>),
}

impl FeedTable {
    pub fn layout(&self) -> RecordLayout {
        match self {
            FeedTable::OrderBook(_) => RecordLayout::OrderBook,
            FeedTable::PublicTrade(_) => RecordLayout::PublicTrade,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FeedTable::OrderBook(rows) => rows.len(),
            FeedTable::PublicTrade(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Order-book rows, if this is an order-book table.
    pub fn order_book(&self) -> Option<&[OrderBookRecord]> {
        match self {
            FeedTable::OrderBook(rows) => Some(rows),
            FeedTable::PublicTrade(_) => None,
        }
    }

    /// Trade rows, if this is a public trade table.
    pub fn trades(&self) -> Option<&[TradeRecord]> {
        match self {
            FeedTable::PublicTrade(rows) => Some(rows),
            FeedTable::OrderBook(_) => None,
        }
    }
}

/// Sequential little-endian reader over one record.
struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn next_word(&mut self) -> [u8; FIELD_WIDTH] {
        let mut word = [0u8; FIELD_WIDTH];
        word.copy_from_slice(&self.buf[self.pos..self.pos + FIELD_WIDTH]);
        self.pos += FIELD_WIDTH;
        word
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.next_word())
    }

    fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.next_word())
    }
}

/// Split a buffer into whole records, rejecting a trailing partial record.
fn records(bytes: &[u8], layout: RecordLayout) -> Result<std::slice::ChunksExact<'_, u8>> {
    let width = layout.width();
    let remainder = bytes.len() % width;
    if remainder != 0 {
        return Err(Error::MalformedRecord {
            len: bytes.len(),
            width,
            offset: bytes.len() - remainder,
        });
    }
    Ok(bytes.chunks_exact(width))
}

/// Decode order-book records without scaling.
pub fn decode_raw_order_book(bytes: &[u8]) -> Result<Vec<RawOrderBookRecord>> {
    let rows = records(bytes, RecordLayout::OrderBook)?
        .map(|chunk| {
            let mut r = FieldReader::new(chunk);
            RawOrderBookRecord {
                received_time_ns: r.u64(),
                md_entry_time_ns: r.u64(),
                transaction_time_ns: r.u64(),
                sequence_id: r.u64(),
                bid_qty: r.i64(),
                bid_price: r.i64(),
                ask_qty: r.i64(),
                ask_price: r.i64(),
            }
        })
        .collect();
    Ok(rows)
}

/// Decode public trade records without scaling.
pub fn decode_raw_trades(bytes: &[u8]) -> Result<Vec<RawTradeRecord>> {
    let rows = records(bytes, RecordLayout::PublicTrade)?
        .map(|chunk| {
            let mut r = FieldReader::new(chunk);
            RawTradeRecord {
                received_time_ns: r.u64(),
                md_entry_time_ns: r.u64(),
                transaction_time_ns: r.u64(),
                sequence_id: r.u64(),
                trade_qty: r.i64(),
                trade_price: r.i64(),
            }
        })
        .collect();
    Ok(rows)
}

/// Decode and scale order-book records.
pub fn decode_order_book(bytes: &[u8]) -> Result<Vec<OrderBookRecord>> {
    let rows: Vec<OrderBookRecord> = decode_raw_order_book(bytes)?
        .into_iter()
        .map(OrderBookRecord::from)
        .collect();
    debug!(records = rows.len(), "decoded order book feed");
    Ok(rows)
}

/// Decode and scale public trade records.
pub fn decode_trades(bytes: &[u8]) -> Result<Vec<TradeRecord>> {
    let rows: Vec<TradeRecord> = decode_raw_trades(bytes)?
        .into_iter()
        .map(TradeRecord::from)
        .collect();
    debug!(records = rows.len(), "decoded public trade feed");
    Ok(rows)
}

/// Decode a buffer with the given layout.
pub fn decode(bytes: &[u8], layout: RecordLayout) -> Result<FeedTable> {
    match layout {
        RecordLayout::OrderBook => decode_order_book(bytes).map(FeedTable::OrderBook),
        RecordLayout::PublicTrade => decode_trades(bytes).map(FeedTable::PublicTrade),
    }
}

/// Encode raw order-book records back to wire bytes.
pub fn encode_order_book(rows: &[RawOrderBookRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rows.len() * RecordLayout::OrderBook.width());
    for row in rows {
        for word in [
            row.received_time_ns,
            row.md_entry_time_ns,
            row.transaction_time_ns,
            row.sequence_id,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for word in [row.bid_qty, row.bid_price, row.ask_qty, row.ask_price] {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    out
}

/// Encode raw trade records back to wire bytes.
pub fn encode_trades(rows: &[RawTradeRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rows.len() * RecordLayout::PublicTrade.width());
    for row in rows {
        for word in [
            row.received_time_ns,
            row.md_entry_time_ns,
            row.transaction_time_ns,
            row.sequence_id,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for word in [row.trade_qty, row.trade_price] {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_row(seq: u64, txn_ns: u64, bid: i64, ask: i64) -> RawOrderBookRecord {
        RawOrderBookRecord {
            received_time_ns: txn_ns + 500,
            md_entry_time_ns: txn_ns + 100,
            transaction_time_ns: txn_ns,
            sequence_id: seq,
            bid_qty: 200_000_000,
            bid_price: bid,
            ask_qty: 300_000_000,
            ask_price: ask,
        }
    }

    #[test]
    fn test_layout_widths() {
        assert_eq!(RecordLayout::OrderBook.width(), 64);
        assert_eq!(RecordLayout::PublicTrade.width(), 48);
    }

    #[test]
    fn test_decode_known_fields() {
        let raw = RawOrderBookRecord {
            received_time_ns: 1_000_000_500,
            md_entry_time_ns: 1_000_000_100,
            transaction_time_ns: 1_000_000_000,
            sequence_id: 7,
            bid_qty: 100_000_000,
            bid_price: 10_000_000_000,
            ask_qty: 250_000_000,
            ask_price: 10_010_000_000,
        };
        let rows = decode_order_book(&encode_order_book(&[raw])).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction_time, 1.0);
        assert_eq!(rows[0].sequence_id, 7);
        assert_eq!(rows[0].bid_price, 100.0);
        assert_eq!(rows[0].bid_qty, 1.0);
        assert_eq!(rows[0].ask_qty, 2.5);
        assert_eq!(rows[0].ask_price, 100.1);
    }

    #[test]
    fn test_hand_built_bytes() {
        // transaction_time = 1s, bid_price = 100.0, everything else zero
        let mut bytes = vec![0u8; 64];
        bytes[16..24].copy_from_slice(&1_000_000_000u64.to_le_bytes());
        bytes[40..48].copy_from_slice(&10_000_000_000i64.to_le_bytes());

        let rows = decode_order_book(&bytes).unwrap();
        assert_eq!(rows[0].transaction_time, 1.0);
        assert_eq!(rows[0].bid_price, 100.0);
        assert_eq!(rows[0].ask_price, 0.0);
    }

    #[test]
    fn test_negative_fixed_point() {
        let trade = RawTradeRecord {
            received_time_ns: 3,
            md_entry_time_ns: 2,
            transaction_time_ns: 1,
            sequence_id: 1,
            trade_qty: -150_000_000,
            trade_price: 5_000_000_000,
        };
        let rows = decode_trades(&encode_trades(&[trade])).unwrap();
        assert_eq!(rows[0].trade_qty, -1.5);
        assert_eq!(rows[0].trade_price, 50.0);
    }

    #[test]
    fn test_raw_roundtrip_is_exact() {
        let rows = vec![
            book_row(1, 1_650_000_000_123_456_789, 4_200_012_345_678, 4_200_112_345_678),
            book_row(2, 1_650_000_000_223_456_789, 4_200_012_345_679, i64::MAX),
        ];
        let bytes = encode_order_book(&rows);
        assert_eq!(bytes.len(), 128);
        assert_eq!(decode_raw_order_book(&bytes).unwrap(), rows);
        assert_eq!(encode_order_book(&decode_raw_order_book(&bytes).unwrap()), bytes);
    }

    #[test]
    fn test_scaled_roundtrip_for_representable_values() {
        let rows = vec![book_row(1, 1_000_000_000, 10_000_000_000, 10_050_000_000)];
        let decoded = decode_order_book(&encode_order_book(&rows)).unwrap();
        let back: Vec<RawOrderBookRecord> = decoded.iter().map(OrderBookRecord::to_raw).collect();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_malformed_length() {
        let mut bytes = encode_order_book(&[book_row(1, 1, 1, 1)]);
        bytes.extend_from_slice(&[0u8; 10]);

        match decode_order_book(&bytes) {
            Err(Error::MalformedRecord { len, width, offset }) => {
                assert_eq!(len, 74);
                assert_eq!(width, 64);
                assert_eq!(offset, 64);
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }

        // A 64-byte order-book buffer is not a whole number of trade records
        assert!(decode_trades(&[0u8; 64]).is_err());
    }

    #[test]
    fn test_empty_buffer() {
        let table = decode(&[], RecordLayout::PublicTrade).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.layout(), RecordLayout::PublicTrade);
    }

    #[test]
    fn test_order_preserved() {
        let rows = vec![
            book_row(3, 3_000, 1, 2),
            book_row(1, 1_000, 1, 2),
            book_row(2, 2_000, 1, 2),
        ];
        let decoded = decode_order_book(&encode_order_book(&rows)).unwrap();
        let seqs: Vec<u64> = decoded.iter().map(|r| r.sequence_id).collect();
        assert_eq!(seqs, vec![3, 1, 2]);
    }

    #[test]
    fn test_layout_selection() {
        assert_eq!(
            RecordLayout::from_file_name("/data/capture/order_book.feed"),
            Some(RecordLayout::OrderBook)
        );
        assert_eq!(
            RecordLayout::from_file_name("public_trade.feed"),
            Some(RecordLayout::PublicTrade)
        );
        assert_eq!(RecordLayout::from_file_name("quotes.bin"), None);
        assert_eq!(RecordLayout::from_flag("-t"), Some(RecordLayout::PublicTrade));
        assert_eq!(RecordLayout::from_flag("-x"), None);
    }
}
