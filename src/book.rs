// src/book.rs
//! Limit order book keyed by symbol.
//!
//! The book tracks every open order by its exchange reference and
//! aggregates open quantity per price level. Per symbol and side the
//! levels live in a `BTreeMap`, so best bid (max key) and best ask (min
//! key) are O(log L); the best pair and the per-side volume totals are
//! additionally cached on every mutation so queries between writes are
//! O(1) map lookups.
//!
//! Apply semantics follow the ITCH event model:
//!
//! - Add inserts a new reference and accumulates its shares at the level.
//! - Execute / execute-with-price / cancel reduce an order by a clamped
//!   quantity; the order disappears when it reaches zero. The
//!   execute-with-price trade print price never moves the resting order.
//! - Delete removes the full remaining quantity.
//! - Replace atomically retires the old reference and creates the new
//!   one with the old order's symbol and side.
//!
//! References not present in the index are ignored (partial replay is
//! valid); protocol anomalies are counted in [`BookStats`] and logged,
//! never fatal.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::Serialize;
use tracing::warn;

use crate::message::{Body, Message};
use crate::types::{Price4, Side, Symbol};

pub type Reference = u64;

#[derive(Clone, Copy, Debug)]
struct OrderMeta {
    symbol: Symbol,
    side: Side,
    price: Price4,
    open_shares: u32,
}

/// One aggregated price level, in display order within a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Level {
    pub price: Price4,
    pub shares: u32,
}

/// Both sides of one symbol's book: bids best-first (descending),
/// asks best-first (ascending).
#[derive(Clone, Debug, Serialize)]
pub struct BookSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// Counters for feed anomalies the book absorbs without failing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BookStats {
    /// Delete/execute/cancel/replace referencing an unknown order.
    pub missing_order: u64,
    /// AddOrder re-using a live reference (overwritten).
    pub duplicate_reference: u64,
    /// Aggregate would have gone negative, or a zero-share add.
    pub invariant_violations: u64,
    /// best_bid >= best_ask observed after an apply.
    pub crossed_books: u64,
}

/// Outcome of applying a message that altered book state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Applied {
    pub symbol: Symbol,
    /// Timestamp of the triggering message.
    pub timestamp: u64,
    /// Whether best bid or best ask moved.
    pub top_changed: bool,
}

struct LevelUnderflow;

#[derive(Default)]
struct SymbolBook {
    bids: BTreeMap<Price4, u32>,
    asks: BTreeMap<Price4, u32>,
    best_bid: Price4,
    best_ask: Price4,
    bid_volume: u32,
    ask_volume: u32,
}

impl SymbolBook {
    #[inline]
    fn top(&self) -> (Price4, Price4) {
        (self.best_bid, self.best_ask)
    }

    #[inline]
    fn recompute_best(&mut self) {
        self.best_bid = self
            .bids
            .keys()
            .next_back()
            .copied()
            .unwrap_or(Price4::ZERO);
        self.best_ask = self.asks.keys().next().copied().unwrap_or(Price4::ZERO);
    }

    fn level_add(&mut self, side: Side, price: Price4, shares: u32) {
        let (levels, volume) = match side {
            Side::Buy => (&mut self.bids, &mut self.bid_volume),
            Side::Sell => (&mut self.asks, &mut self.ask_volume),
        };
        let entry = levels.entry(price).or_insert(0);
        *entry = entry.saturating_add(shares);
        *volume = volume.saturating_add(shares);
        self.recompute_best();
    }

    /// Subtracts from a level, erasing it at zero. Errs when the level is
    /// short of the requested quantity; whatever is present still comes
    /// off so the book stays internally consistent.
    fn level_sub(
        &mut self,
        side: Side,
        price: Price4,
        shares: u32,
    ) -> Result<(), LevelUnderflow> {
        let (levels, volume) = match side {
            Side::Buy => (&mut self.bids, &mut self.bid_volume),
            Side::Sell => (&mut self.asks, &mut self.ask_volume),
        };

        let Some(current) = levels.get_mut(&price) else {
            self.recompute_best();
            return Err(LevelUnderflow);
        };

        let taken = shares.min(*current);
        *current -= taken;
        *volume = volume.saturating_sub(taken);
        if *current == 0 {
            levels.remove(&price);
        }
        self.recompute_best();

        if taken < shares {
            Err(LevelUnderflow)
        } else {
            Ok(())
        }
    }
}

/// All symbols' books plus the global reference index.
#[derive(Default)]
pub struct MarketBook {
    orders: HashMap<Reference, OrderMeta>,
    books: HashMap<Symbol, SymbolBook>,
    stats: BookStats,
}

impl MarketBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve_orders(&mut self, n: usize) {
        self.orders.reserve(n);
    }

    /// Applies one message. Returns what was touched so the caller can
    /// derive an observation, or `None` when the message does not alter
    /// book state.
    pub fn apply(&mut self, msg: &Message) -> Option<Applied> {
        let (symbol, top_before) = match &msg.body {
            Body::AddOrder(a) => self.add(a.reference, a.stock, a.side, a.shares, a.price)?,
            Body::OrderExecuted(e) => self.reduce(e.reference, e.executed)?,
            // Trade print price is not the resting price; reduction
            // happens at the price held in the index.
            Body::OrderExecutedWithPrice(e) => self.reduce(e.reference, e.executed)?,
            Body::OrderCancelled(c) => self.reduce(c.reference, c.cancelled)?,
            Body::DeleteOrder(d) => self.delete(d.reference)?,
            Body::ReplaceOrder(r) => {
                self.replace(r.old_reference, r.new_reference, r.shares, r.price)?
            }
            _ => return None,
        };

        let top_after = self.best_prices(&symbol);
        let (bid, ask) = top_after;
        if !bid.is_zero() && !ask.is_zero() && bid >= ask {
            self.stats.crossed_books += 1;
            warn!(symbol = %symbol, %bid, %ask, "crossed book after apply");
        }

        Some(Applied {
            symbol,
            timestamp: msg.timestamp,
            top_changed: top_after != top_before,
        })
    }

    fn add(
        &mut self,
        reference: Reference,
        symbol: Symbol,
        side: Side,
        shares: u32,
        price: Price4,
    ) -> Option<(Symbol, (Price4, Price4))> {
        if shares == 0 {
            self.stats.invariant_violations += 1;
            warn!(reference, symbol = %symbol, "zero-share add ignored");
            return None;
        }

        let top_before = self
            .books
            .get(&symbol)
            .map(|b| b.top())
            .unwrap_or_default();

        if self.orders.contains_key(&reference) {
            // Cannot happen on a conforming feed; keep the newer order.
            self.stats.duplicate_reference += 1;
            warn!(reference, symbol = %symbol, "duplicate add reference, overwriting");
            let _ = self.unlink(reference);
        }

        self.orders.insert(
            reference,
            OrderMeta {
                symbol,
                side,
                price,
                open_shares: shares,
            },
        );
        self.books
            .entry(symbol)
            .or_default()
            .level_add(side, price, shares);

        Some((symbol, top_before))
    }

    fn reduce(&mut self, reference: Reference, quantity: u32) -> Option<(Symbol, (Price4, Price4))> {
        let Some(meta) = self.orders.get(&reference).copied() else {
            self.stats.missing_order += 1;
            return None;
        };

        let effective = quantity.min(meta.open_shares);
        if quantity > meta.open_shares {
            self.stats.invariant_violations += 1;
            warn!(
                reference,
                quantity,
                open = meta.open_shares,
                "reduction exceeds open shares, clamping"
            );
        }
        if effective == 0 {
            return None;
        }

        let book = self.books.entry(meta.symbol).or_default();
        let top_before = book.top();
        if book.level_sub(meta.side, meta.price, effective).is_err() {
            self.stats.invariant_violations += 1;
            warn!(reference, symbol = %meta.symbol, "level short of order quantity");
        }

        if effective == meta.open_shares {
            self.orders.remove(&reference);
        } else if let Some(m) = self.orders.get_mut(&reference) {
            m.open_shares -= effective;
        }

        Some((meta.symbol, top_before))
    }

    fn delete(&mut self, reference: Reference) -> Option<(Symbol, (Price4, Price4))> {
        match self.unlink(reference) {
            Some(out) => Some(out),
            None => {
                self.stats.missing_order += 1;
                None
            }
        }
    }

    fn replace(
        &mut self,
        old_reference: Reference,
        new_reference: Reference,
        shares: u32,
        price: Price4,
    ) -> Option<(Symbol, (Price4, Price4))> {
        let Some(old) = self.orders.get(&old_reference).copied() else {
            self.stats.missing_order += 1;
            return None;
        };

        let (symbol, top_before) = self.unlink(old_reference)?;

        // A replace to zero shares degrades to a plain delete.
        if shares == 0 {
            return Some((symbol, top_before));
        }

        if self.orders.contains_key(&new_reference) {
            self.stats.duplicate_reference += 1;
            warn!(new_reference, "replace target reference already live, overwriting");
            let _ = self.unlink(new_reference);
        }

        self.orders.insert(
            new_reference,
            OrderMeta {
                symbol: old.symbol,
                side: old.side,
                price,
                open_shares: shares,
            },
        );
        self.books
            .entry(old.symbol)
            .or_default()
            .level_add(old.side, price, shares);

        Some((symbol, top_before))
    }

    /// Removes an order and its full level contribution. Returns the
    /// symbol and the pre-removal top of book.
    fn unlink(&mut self, reference: Reference) -> Option<(Symbol, (Price4, Price4))> {
        let meta = self.orders.remove(&reference)?;
        let book = self.books.entry(meta.symbol).or_default();
        let top_before = book.top();
        if book
            .level_sub(meta.side, meta.price, meta.open_shares)
            .is_err()
        {
            self.stats.invariant_violations += 1;
            warn!(reference, symbol = %meta.symbol, "level short of order quantity");
        }
        Some((meta.symbol, top_before))
    }

    /// Best bid and ask; zero on an empty side.
    pub fn best_prices(&self, symbol: &Symbol) -> (Price4, Price4) {
        self.books.get(symbol).map(|b| b.top()).unwrap_or_default()
    }

    /// Total open shares across all levels, per side.
    pub fn side_volumes(&self, symbol: &Symbol) -> (u32, u32) {
        self.books
            .get(symbol)
            .map(|b| (b.bid_volume, b.ask_volume))
            .unwrap_or((0, 0))
    }

    /// Signed resting-volume ratio in [-1, 1]; 0 for an empty book.
    pub fn imbalance(&self, symbol: &Symbol) -> f64 {
        let (bid, ask) = self.side_volumes(symbol);
        let total = f64::from(bid) + f64::from(ask);
        if total == 0.0 {
            0.0
        } else {
            (f64::from(bid) - f64::from(ask)) / total
        }
    }

    /// Full depth in display order.
    pub fn snapshot(&self, symbol: &Symbol) -> BookSnapshot {
        let Some(b) = self.books.get(symbol) else {
            return BookSnapshot {
                bids: Vec::new(),
                asks: Vec::new(),
            };
        };

        BookSnapshot {
            bids: b
                .bids
                .iter()
                .rev()
                .map(|(&price, &shares)| Level { price, shares })
                .collect(),
            asks: b
                .asks
                .iter()
                .map(|(&price, &shares)| Level { price, shares })
                .collect(),
        }
    }

    /// Symbols that have had at least one book-touching event.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.books.keys()
    }

    pub fn open_orders(&self) -> usize {
        self.orders.len()
    }

    /// Remaining open quantity for a live reference.
    pub fn open_shares(&self, reference: Reference) -> Option<u32> {
        self.orders.get(&reference).map(|m| m.open_shares)
    }

    pub fn stats(&self) -> BookStats {
        self.stats
    }

    /// True when no orders rest anywhere.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.books.values().all(|b| b.bids.is_empty() && b.asks.is_empty())
    }
}

impl MarketBook {
    /// Cross-checks every cached quantity against a recount from the
    /// order index. Test-support; panics on the first inconsistency.
    pub fn assert_invariants(&self) {
        let mut agg: HashMap<(Symbol, Side, Price4), u32> = HashMap::new();
        let mut volumes: HashMap<(Symbol, Side), u32> = HashMap::new();
        for meta in self.orders.values() {
            assert!(meta.open_shares > 0, "zero open_shares in index");
            *agg.entry((meta.symbol, meta.side, meta.price)).or_insert(0) += meta.open_shares;
            *volumes.entry((meta.symbol, meta.side)).or_insert(0) += meta.open_shares;
        }

        for (symbol, book) in &self.books {
            let exp_bid = book.bids.keys().next_back().copied().unwrap_or(Price4::ZERO);
            let exp_ask = book.asks.keys().next().copied().unwrap_or(Price4::ZERO);
            assert_eq!(book.best_bid, exp_bid, "best_bid cache mismatch for {symbol}");
            assert_eq!(book.best_ask, exp_ask, "best_ask cache mismatch for {symbol}");

            for (&price, &shares) in &book.bids {
                assert!(shares > 0, "zero bid level for {symbol}");
                let exp = agg.get(&(*symbol, Side::Buy, price)).copied().unwrap_or(0);
                assert_eq!(shares, exp, "bid level mismatch for {symbol} at {price}");
            }
            for (&price, &shares) in &book.asks {
                assert!(shares > 0, "zero ask level for {symbol}");
                let exp = agg.get(&(*symbol, Side::Sell, price)).copied().unwrap_or(0);
                assert_eq!(shares, exp, "ask level mismatch for {symbol} at {price}");
            }

            let exp_bid_vol = volumes.get(&(*symbol, Side::Buy)).copied().unwrap_or(0);
            let exp_ask_vol = volumes.get(&(*symbol, Side::Sell)).copied().unwrap_or(0);
            assert_eq!(book.bid_volume, exp_bid_vol, "bid volume cache for {symbol}");
            assert_eq!(book.ask_volume, exp_ask_vol, "ask volume cache for {symbol}");
        }

        // Every indexed order must have a backing level map.
        for meta in self.orders.values() {
            assert!(
                self.books.contains_key(&meta.symbol),
                "order without symbol book"
            );
        }
    }
}
