//! Data ingestion and normalization for the feed-drift system.
//!
//! This crate handles:
//! - Fixed-width binary feed decoding (order book, public trades)
//! - Mid-price derivation into the tick arena
//! - Decoded table persistence

pub mod feed;
pub mod mid_price;
pub mod store;

pub use feed::{decode, decode_order_book, decode_trades, FeedTable, RecordLayout};
pub use mid_price::derive_ticks;
pub use store::{JsonTableStore, TableStore};
