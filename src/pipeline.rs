// src/pipeline.rs
//! Bounded decode → book → observe pipeline.
//!
//! Three workers: the decoder runs on a blocking thread and pushes into
//! Q1 with `blocking_send`, so a slow applier backpressures the decoder;
//! the applier drains Q1, mutates the shared book and publishes
//! observations into Q2; the consumer owns the Q2 receiver. Shutdown is
//! cooperative: when the feed ends (or the message cap trips) the
//! decoder drops its sender, the applier drains and drops its own, and
//! the consumer sees the channel close after the last observation.
//!
//! The book is a single structure behind one mutex; the feed is globally
//! ordered and a lone applier keeps every symbol strictly in exchange
//! order. Strategy-style readers may query the same handle between
//! writes.

use std::collections::HashSet;
use std::io::{self, Read};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::book::MarketBook;
use crate::message::Message;
use crate::metrics::Metrics;
use crate::observe::{self, MarketObservation};
use crate::parser::{DecodeError, Parser};
use crate::types::Symbol;

#[derive(Clone, Debug)]
pub struct Config {
    /// Stop after this many decoded messages; 0 = unbounded.
    pub message_cap: u64,
    /// When set, observations are published only for these symbols. Book
    /// state still updates for everything.
    pub symbol_filter: Option<HashSet<Symbol>>,
    /// Q1 (raw message) depth.
    pub q1_capacity: usize,
    /// Q2 (observation) depth.
    pub q2_capacity: usize,
    /// Publish observations for touches that leave top-of-book unchanged.
    pub emit_on_unchanged: bool,
    /// Messages per Q1 envelope; 1 disables batching. Order within a
    /// batch and across batches is the exchange order either way.
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            message_cap: 0,
            symbol_filter: None,
            q1_capacity: 4096,
            q2_capacity: 16384,
            emit_on_unchanged: true,
            batch_size: 1,
        }
    }
}

/// Handle to a running pipeline. Observations arrive on the receiver
/// returned by [`spawn`]; the handle gives access to the live book and
/// to the terminal decode status.
pub struct Pipeline {
    book: Arc<Mutex<MarketBook>>,
    decoder: JoinHandle<Result<(), DecodeError>>,
    applier: JoinHandle<()>,
}

impl Pipeline {
    /// Shared book for direct queries concurrent with the applier.
    pub fn book(&self) -> Arc<Mutex<MarketBook>> {
        Arc::clone(&self.book)
    }

    /// Waits for both workers. `Ok` on a clean end of input (including a
    /// tripped message cap); the terminal decode error otherwise.
    pub async fn join(self) -> Result<(), DecodeError> {
        let decoded = match self.decoder.await {
            Ok(res) => res,
            Err(e) => Err(DecodeError::Io(io::Error::other(e))),
        };
        let _ = self.applier.await;
        decoded
    }
}

/// Starts the decoder and applier workers over `reader`. Must be called
/// from within a tokio runtime. The returned receiver is Q2; dropping it
/// early unwinds the pipeline through send failures.
pub fn spawn<R>(
    reader: R,
    config: Config,
    metrics: Arc<Metrics>,
) -> (Pipeline, mpsc::Receiver<MarketObservation>)
where
    R: Read + Send + 'static,
{
    let batch_size = config.batch_size.max(1);
    let (msg_tx, mut msg_rx) = mpsc::channel::<Vec<Message>>(config.q1_capacity.max(1));
    let (obs_tx, obs_rx) = mpsc::channel::<MarketObservation>(config.q2_capacity.max(1));

    let book = Arc::new(Mutex::new(MarketBook::new()));

    let decoder = {
        let metrics = Arc::clone(&metrics);
        let cap = config.message_cap;
        tokio::task::spawn_blocking(move || {
            let mut parser = Parser::new(reader);
            let mut batch: Vec<Message> = Vec::with_capacity(batch_size);
            let mut decoded: u64 = 0;
            let mut terminal = Ok(());

            while let Some(item) = parser.next_message() {
                match item {
                    Ok(msg) => {
                        decoded += 1;
                        metrics.inc_decoded();
                        batch.push(msg);
                        if batch.len() >= batch_size {
                            if msg_tx.blocking_send(std::mem::take(&mut batch)).is_err() {
                                debug!("applier gone, decoder stopping");
                                return terminal;
                            }
                            batch.reserve(batch_size);
                        }
                        if cap != 0 && decoded >= cap {
                            info!(cap, "message cap reached, stopping decode");
                            break;
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        warn!(error = %e, "feed terminated");
                        terminal = Err(e);
                        break;
                    }
                    Err(e) => {
                        if matches!(e, DecodeError::UnknownTag(_)) {
                            metrics.inc_unknown_tag();
                        }
                        metrics.inc_decode_err();
                        debug!(error = %e, "record dropped");
                    }
                }
            }

            if !batch.is_empty() {
                let _ = msg_tx.blocking_send(batch);
            }
            terminal
            // msg_tx drops here, closing Q1.
        })
    };

    let applier = {
        let book = Arc::clone(&book);
        let filter = config.symbol_filter;
        let emit_on_unchanged = config.emit_on_unchanged;
        tokio::spawn(async move {
            while let Some(batch) = msg_rx.recv().await {
                for msg in batch {
                    let obs = apply_one(&book, &metrics, &filter, emit_on_unchanged, &msg);
                    if let Some(obs) = obs {
                        metrics.inc_observation();
                        if obs_tx.send(obs).await.is_err() {
                            debug!("consumer gone, applier stopping");
                            return;
                        }
                    }
                }
            }
            // obs_tx drops here, closing Q2 after the drain.
        })
    };

    let pipeline = Pipeline {
        book,
        decoder,
        applier,
    };
    (pipeline, obs_rx)
}

/// Applies one message under the book lock and derives the observation
/// while the state is still consistent with the apply.
fn apply_one(
    book: &Arc<Mutex<MarketBook>>,
    metrics: &Metrics,
    filter: &Option<HashSet<Symbol>>,
    emit_on_unchanged: bool,
    msg: &Message,
) -> Option<MarketObservation> {
    let mut book = book.lock().unwrap();

    let t0 = Instant::now();
    let applied = book.apply(msg);
    metrics.record_apply(t0.elapsed());
    metrics.inc_applied();

    let applied = applied?;
    metrics.inc_touched();

    if !emit_on_unchanged && !applied.top_changed {
        return None;
    }
    if let Some(allowed) = filter {
        if !allowed.contains(&applied.symbol) {
            return None;
        }
    }

    Some(observe::derive(&book, &applied))
}
