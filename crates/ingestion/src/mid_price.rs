//! Mid-price derivation.
//!
//! Turns decoded order-book rows into the tick arena used by every event
//! detector. The input rows are never modified.

use drift_core::{OrderBookRecord, Tick, TickTable};
use tracing::debug;

/// Build the tick table, computing `mid = (bid + ask) / 2` for each row.
pub fn derive_ticks(records: &[OrderBookRecord]) -> TickTable {
    let mut table = TickTable::with_capacity(records.len());
    for record in records {
        table.push(Tick::from_record(record));
    }
    debug!(ticks = table.len(), "derived mid prices");
    table
}

/// Mid prices only, in row order.
pub fn mid_prices(records: &[OrderBookRecord]) -> Vec<f64> {
    records
        .iter()
        .map(|r| drift_core::mid_price(r.bid_price, r.ask_price))
        .collect()
}
