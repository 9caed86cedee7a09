// src/observe.rs
//! Derived market observations.

use serde::Serialize;

use crate::book::{Applied, MarketBook};
use crate::types::{Price4, Symbol};

/// Snapshot of one symbol's derived state, emitted after every applied
/// message that touches the symbol. Values reflect the post-update book;
/// the timestamp is the triggering message's.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MarketObservation {
    pub symbol: Symbol,
    /// Nanoseconds since midnight.
    pub timestamp: u64,
    /// Zero when the bid side is empty.
    pub best_bid: Price4,
    /// Zero when the ask side is empty.
    pub best_ask: Price4,
    pub bid_volume: u32,
    pub ask_volume: u32,
    /// (bid_volume - ask_volume) / (bid_volume + ask_volume), 0 when the
    /// book is empty on both sides.
    pub imbalance: f64,
}

/// Builds the observation for a just-applied message from the current
/// book state. The book lock must still be held by the caller so the
/// snapshot is consistent with the apply.
pub fn derive(book: &MarketBook, applied: &Applied) -> MarketObservation {
    let (best_bid, best_ask) = book.best_prices(&applied.symbol);
    let (bid_volume, ask_volume) = book.side_volumes(&applied.symbol);

    MarketObservation {
        symbol: applied.symbol,
        timestamp: applied.timestamp,
        best_bid,
        best_ask,
        bid_volume,
        ask_volume,
        imbalance: book.imbalance(&applied.symbol),
    }
}
