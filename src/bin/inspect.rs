use std::{collections::HashSet, fs::File, io::BufReader};

use anyhow::{Context, Result};
use itchbook::message::Body;
use itchbook::parser::Parser;

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/feed.bin".to_string());
    let f = File::open(&path).with_context(|| format!("open {path}"))?;

    let mut counts = [0u64; 256];
    let mut dropped = 0u64;
    let mut symbols = HashSet::new();

    for item in Parser::new(BufReader::new(f)) {
        match item {
            Ok(msg) => {
                counts[msg.tag as usize] += 1;
                match msg.body {
                    Body::AddOrder(b) => {
                        symbols.insert(b.stock);
                    }
                    Body::StockDirectory(b) => {
                        symbols.insert(b.stock);
                    }
                    Body::NonCrossTrade(b) => {
                        symbols.insert(b.stock);
                    }
                    Body::CrossTrade(b) => {
                        symbols.insert(b.stock);
                    }
                    _ => {}
                }
            }
            Err(e) if e.is_fatal() => {
                eprintln!("stream ended: {e}");
                break;
            }
            Err(_) => dropped += 1,
        }
    }

    for (tag, count) in counts.iter().enumerate() {
        if *count > 0 {
            println!("{}={}", tag as u8 as char, count);
        }
    }
    println!("unique_symbols={}", symbols.len());
    println!("dropped={dropped}");
    Ok(())
}
