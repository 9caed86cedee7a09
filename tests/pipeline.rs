// End-to-end pipeline tests: synthetic feeds are built with the wire
// encoder, pushed through the full decode → book → observe path, and the
// observation stream is drained to the end-of-stream close.

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use itchbook::book::MarketBook;
use itchbook::message::{AddOrder, Body, DeleteOrder, Message, OrderExecuted};
use itchbook::metrics::Metrics;
use itchbook::observe::MarketObservation;
use itchbook::parser::DecodeError;
use itchbook::pipeline::{self, Config};
use itchbook::types::{Price4, Side, Symbol};
use itchbook::wire;

fn add(ts: u64, reference: u64, side: Side, shares: u32, stock: &[u8], price: u32) -> Message {
    Message::new(
        1,
        0,
        ts,
        Body::AddOrder(AddOrder {
            reference,
            side,
            shares,
            stock: Symbol::new(stock),
            price: Price4::from_raw(price),
            mpid: None,
        }),
    )
}

fn delete(ts: u64, reference: u64) -> Message {
    Message::new(1, 0, ts, Body::DeleteOrder(DeleteOrder { reference }))
}

fn feed(msgs: &[Message]) -> Vec<u8> {
    let mut out = Vec::new();
    for msg in msgs {
        wire::encode_message_into(msg, &mut out);
    }
    out
}

async fn run(
    bytes: Vec<u8>,
    config: Config,
) -> (
    Vec<MarketObservation>,
    Arc<Mutex<MarketBook>>,
    Result<(), DecodeError>,
    Arc<Metrics>,
) {
    let metrics = Arc::new(Metrics::new());
    let (pipe, mut rx) = pipeline::spawn(Cursor::new(bytes), config, Arc::clone(&metrics));
    let book = pipe.book();

    let mut observations = Vec::new();
    while let Some(obs) = rx.recv().await {
        observations.push(obs);
    }
    let result = pipe.join().await;
    (observations, book, result, metrics)
}

#[tokio::test]
async fn add_then_delete_round_trip() {
    let bytes = feed(&[
        add(1000, 1, Side::Buy, 100, b"ABC", 100_000),
        delete(1001, 1),
    ]);

    let (obs, book, result, _) = run(bytes, Config::default()).await;
    result.unwrap();

    assert_eq!(obs.len(), 2);

    assert_eq!(obs[0].symbol, Symbol::new(b"ABC"));
    assert_eq!(obs[0].timestamp, 1000);
    assert_eq!(obs[0].best_bid, Price4::from_raw(100_000));
    assert_eq!(obs[0].best_ask, Price4::ZERO);
    assert_eq!(obs[0].bid_volume, 100);
    assert_eq!(obs[0].imbalance, 1.0);

    assert_eq!(obs[1].timestamp, 1001);
    assert_eq!(obs[1].best_bid, Price4::ZERO);
    assert_eq!(obs[1].bid_volume, 0);
    assert_eq!(obs[1].imbalance, 0.0);

    assert!(book.lock().unwrap().is_empty());
}

#[tokio::test]
async fn partial_execution_observation() {
    let bytes = feed(&[
        add(1, 7, Side::Sell, 500, b"XYZ", 500_000),
        Message::new(
            1,
            0,
            2,
            Body::OrderExecuted(OrderExecuted {
                reference: 7,
                executed: 200,
                match_number: 42,
            }),
        ),
    ]);

    let (obs, book, result, _) = run(bytes, Config::default()).await;
    result.unwrap();

    assert_eq!(obs.len(), 2);
    assert_eq!(obs[1].best_ask, Price4::from_raw(500_000));
    assert_eq!(obs[1].ask_volume, 300);
    assert_eq!(obs[1].imbalance, -1.0);
    assert_eq!(book.lock().unwrap().open_shares(7), Some(300));
}

#[tokio::test]
async fn symbol_filter_limits_observations_not_book_state() {
    let bytes = feed(&[
        add(1, 1, Side::Buy, 100, b"AAPL", 100_000),
        add(2, 2, Side::Buy, 200, b"MSFT", 200_000),
        add(3, 3, Side::Sell, 50, b"AAPL", 101_000),
    ]);

    let config = Config {
        symbol_filter: Some(HashSet::from([Symbol::new(b"AAPL")])),
        ..Config::default()
    };
    let (obs, book, result, _) = run(bytes, config).await;
    result.unwrap();

    assert_eq!(obs.len(), 2);
    assert!(obs.iter().all(|o| o.symbol == Symbol::new(b"AAPL")));

    // The book is global: the filtered symbol still has state.
    let book = book.lock().unwrap();
    assert_eq!(
        book.best_prices(&Symbol::new(b"MSFT")).0,
        Price4::from_raw(200_000)
    );
}

#[tokio::test]
async fn message_cap_stops_decoding() {
    let bytes = feed(&[
        add(1, 1, Side::Buy, 100, b"ABC", 100_000),
        add(2, 2, Side::Buy, 100, b"ABC", 99_000),
        add(3, 3, Side::Buy, 100, b"ABC", 98_000),
        add(4, 4, Side::Buy, 100, b"ABC", 97_000),
    ]);

    let config = Config {
        message_cap: 2,
        ..Config::default()
    };
    let (obs, book, result, metrics) = run(bytes, config).await;
    result.unwrap();

    assert_eq!(obs.len(), 2);
    assert_eq!(book.lock().unwrap().open_orders(), 2);
    assert_eq!(
        metrics
            .msgs_decoded
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
}

#[tokio::test]
async fn unknown_tag_is_skipped_and_stream_continues() {
    let mut bytes = feed(&[add(1, 1, Side::Buy, 100, b"ABC", 100_000)]);
    // An 11-byte header with an unassigned tag, correctly framed.
    bytes.extend_from_slice(&11u16.to_be_bytes());
    bytes.extend_from_slice(&[b'z', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    bytes.extend_from_slice(&feed(&[add(2, 2, Side::Sell, 50, b"ABC", 101_000)]));

    let (obs, _, result, metrics) = run(bytes, Config::default()).await;
    result.unwrap();

    assert_eq!(obs.len(), 2);
    assert_eq!(
        metrics
            .unknown_tags
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn truncated_tail_is_terminal_but_prior_messages_land() {
    let mut bytes = feed(&[add(1, 1, Side::Buy, 100, b"ABC", 100_000)]);
    let tail = feed(&[delete(2, 1)]);
    bytes.extend_from_slice(&tail[..tail.len() - 4]);

    let (obs, _, result, _) = run(bytes, Config::default()).await;
    assert!(matches!(result, Err(DecodeError::Truncated)));
    assert_eq!(obs.len(), 1);
}

#[tokio::test]
async fn top_only_mode_drops_unchanged_top_observations() {
    let bytes = feed(&[
        add(1, 1, Side::Buy, 100, b"ABC", 100_000), // top change
        add(2, 2, Side::Buy, 100, b"ABC", 99_000),  // deep, no change
        delete(3, 2),                               // deep, no change
        delete(4, 1),                               // top change
    ]);

    let config = Config {
        emit_on_unchanged: false,
        ..Config::default()
    };
    let (obs, _, result, metrics) = run(bytes, config).await;
    result.unwrap();

    assert_eq!(obs.len(), 2);
    assert_eq!(obs[0].timestamp, 1);
    assert_eq!(obs[1].timestamp, 4);
    // All four events touched the book even though two were not published.
    assert_eq!(
        metrics
            .book_touches
            .load(std::sync::atomic::Ordering::Relaxed),
        4
    );
}

#[tokio::test]
async fn batching_preserves_exchange_order() {
    let msgs: Vec<Message> = (1..=20)
        .map(|i| add(i, i, Side::Buy, 10, b"ABC", 100_000 + i as u32))
        .collect();
    let bytes = feed(&msgs);

    let config = Config {
        batch_size: 7,
        ..Config::default()
    };
    let (obs, _, result, _) = run(bytes, config).await;
    result.unwrap();

    let timestamps: Vec<u64> = obs.iter().map(|o| o.timestamp).collect();
    assert_eq!(timestamps, (1..=20).collect::<Vec<u64>>());
}

#[tokio::test]
async fn observations_are_monotone_per_symbol() {
    let bytes = feed(&[
        add(10, 1, Side::Buy, 100, b"ABC", 100_000),
        add(11, 2, Side::Sell, 100, b"ABC", 101_000),
        Message::new(
            1,
            0,
            12,
            Body::OrderExecuted(OrderExecuted {
                reference: 1,
                executed: 60,
                match_number: 5,
            }),
        ),
        delete(13, 2),
    ]);

    let (obs, _, result, _) = run(bytes, Config::default()).await;
    result.unwrap();

    assert_eq!(obs.len(), 4);
    for pair in obs.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    assert_eq!(obs[2].bid_volume, 40);
    assert_eq!(obs[3].ask_volume, 0);
}
