// src/main.rs
use std::{collections::HashSet, fs::File, io::Cursor, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use memmap2::Mmap;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use itchbook::{
    metrics::Metrics,
    pipeline::{self, Config},
    types::Symbol,
    wire,
};

#[derive(ClapParser, Debug)]
#[command(
    name = "itchbook",
    version,
    about = "Replay an ITCH 5.0 feed into a live order book"
)]
struct Cli {
    /// Feed file (raw length-prefixed ITCH 5.0).
    #[arg(long)]
    file: PathBuf,
    /// Stop after N decoded messages (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    cap: u64,
    /// Comma-separated symbol allow-list for observations.
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,
    /// Write observations as NDJSON to this path.
    #[arg(long)]
    observations: Option<PathBuf>,
    /// Final per-symbol book snapshot JSON.
    #[arg(long, default_value = "final_snapshot.json")]
    out: PathBuf,
    /// Write Prometheus metrics text here at exit.
    #[arg(long)]
    metrics_out: Option<PathBuf>,
    /// Raw message queue depth.
    #[arg(long, default_value_t = 4096)]
    q1_capacity: usize,
    /// Observation queue depth.
    #[arg(long, default_value_t = 16384)]
    q2_capacity: usize,
    /// Only publish observations that move top-of-book.
    #[arg(long)]
    top_only: bool,
    /// Messages per queue envelope (1 = no batching).
    #[arg(long, default_value_t = 1)]
    batch: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let cli = Cli::parse();

    let f = File::open(&cli.file).with_context(|| format!("open feed file {:?}", cli.file))?;
    let mmap = unsafe { Mmap::map(&f)? };
    info!(file = ?cli.file, bytes = mmap.len(), "replaying feed");

    let filter = (!cli.symbols.is_empty()).then(|| {
        cli.symbols
            .iter()
            .map(|s| Symbol::new(s.as_bytes()))
            .collect::<HashSet<_>>()
    });

    let config = Config {
        message_cap: cli.cap,
        symbol_filter: filter,
        q1_capacity: cli.q1_capacity,
        q2_capacity: cli.q2_capacity,
        emit_on_unchanged: !cli.top_only,
        batch_size: cli.batch,
    };

    let metrics = Arc::new(Metrics::new());
    let (pipe, mut obs_rx) = pipeline::spawn(Cursor::new(mmap), config, metrics.clone());
    let book = pipe.book();

    let mut obs_writer = match &cli.observations {
        Some(p) => {
            let f = tokio::fs::File::create(p)
                .await
                .with_context(|| format!("create observation file {p:?}"))?;
            Some(tokio::io::BufWriter::new(f))
        }
        None => None,
    };

    let mut observed: u64 = 0;
    while let Some(obs) = obs_rx.recv().await {
        observed += 1;
        if let Some(w) = obs_writer.as_mut() {
            w.write_all(&wire::encode_observation(&obs)).await?;
            w.write_all(b"\n").await?;
        }
    }
    if let Some(mut w) = obs_writer {
        w.flush().await?;
    }

    if let Err(e) = pipe.join().await {
        warn!(error = %e, "feed ended with a terminal decode error");
    }

    let final_text = {
        let book = book.lock().unwrap();
        let stats = book.stats();
        info!(
            missing_order = stats.missing_order,
            duplicate_reference = stats.duplicate_reference,
            invariant_violations = stats.invariant_violations,
            crossed_books = stats.crossed_books,
            open_orders = book.open_orders(),
            observed,
            "replay finished"
        );

        let mut symbols: Vec<Symbol> = book.symbols().copied().collect();
        symbols.sort();

        let mut out = serde_json::Map::new();
        for sym in symbols {
            let snap = book.snapshot(&sym);
            if snap.bids.is_empty() && snap.asks.is_empty() {
                continue;
            }
            let (best_bid, best_ask) = book.best_prices(&sym);
            let (bid_volume, ask_volume) = book.side_volumes(&sym);
            out.insert(
                sym.trimmed().to_string(),
                json!({
                    "best_bid": best_bid,
                    "best_ask": best_ask,
                    "bid_volume": bid_volume,
                    "ask_volume": ask_volume,
                    "imbalance": book.imbalance(&sym),
                    "bids": snap.bids,
                    "asks": snap.asks,
                }),
            );
        }
        serde_json::to_string_pretty(&json!({ "type": "final", "symbols": out }))?
    };

    tokio::fs::write(&cli.out, final_text)
        .await
        .with_context(|| format!("write snapshot {:?}", cli.out))?;
    info!(out = ?cli.out, "wrote final snapshot");

    if let Some(p) = &cli.metrics_out {
        tokio::fs::write(p, metrics.prometheus_text())
            .await
            .with_context(|| format!("write metrics {p:?}"))?;
    }

    Ok(())
}
