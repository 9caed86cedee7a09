//! # itchbook - ITCH 5.0 Order Book Engine
//!
//! This crate ingests a NASDAQ ITCH 5.0 market-data feed and maintains a
//! live, per-symbol limit order book from which it derives market
//! observations (best bid/ask, side volumes, imbalance) at feed rate.
//!
//! ## Architecture
//!
//! The engine consists of several key components:
//! - **Parser**: streaming decoder over the length-prefixed binary wire format
//! - **MarketBook**: per-symbol price levels plus a global order reference index
//! - **Observe**: derives a `MarketObservation` for every book-touching event
//! - **Pipeline**: bounded queues and workers keeping decode, book and
//!   consumer in step with backpressure and cooperative shutdown
//! - **Wire**: record encoder (the decoder's inverse) and NDJSON observation output
//! - **Metrics**: cheap atomic counters with a Prometheus text rendering
//!
//! ## Example
//!
//! ```rust
//! use itchbook::{
//!     book::MarketBook,
//!     message::{AddOrder, Body, Message},
//!     types::{Price4, Side, Symbol},
//! };
//!
//! let mut book = MarketBook::new();
//! book.reserve_orders(1000);
//!
//! let add = Message::new(1, 0, 1_000, Body::AddOrder(AddOrder {
//!     reference: 1,
//!     side: Side::Buy,
//!     shares: 100,
//!     stock: Symbol::new(b"AAPL"),
//!     price: Price4::from_raw(1_000_000), // 100.0000
//!     mpid: None,
//! }));
//!
//! let applied = book.apply(&add).expect("add touches the book");
//! assert!(applied.top_changed);
//!
//! let aapl = Symbol::new(b"AAPL");
//! assert_eq!(book.best_prices(&aapl).0, Price4::from_raw(1_000_000));
//! assert_eq!(book.side_volumes(&aapl), (100, 0));
//! ```
pub mod book;
pub mod message;
pub mod metrics;
pub mod observe;
pub mod parser;
pub mod pipeline;
pub mod source;
pub mod types;
pub mod wire;
