// src/wire.rs
//! Wire encoders.
//!
//! `encode_message` produces a length-prefixed ITCH 5.0 record, the exact
//! inverse of the decoder; replay tooling and tests build synthetic feeds
//! with it. `encode_observation` renders one observation as a compact
//! NDJSON line without going through serde.

use std::io::Write;

use bytes::Bytes;
use itoa::Buffer;

use crate::message::{Body, Message};
use crate::observe::MarketObservation;

#[inline(always)]
fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
}

#[inline(always)]
fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

#[inline(always)]
fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

#[inline(always)]
fn push_u48(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes()[2..]);
}

#[inline(always)]
fn push_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

#[inline(always)]
fn push_flag(out: &mut Vec<u8>, v: bool) {
    out.push(if v { b'Y' } else { b'N' });
}

#[inline(always)]
fn push_maybe_flag(out: &mut Vec<u8>, v: Option<bool>) {
    out.push(match v {
        Some(true) => b'Y',
        Some(false) => b'N',
        None => b' ',
    });
}

/// Appends one framed record to `out`.
pub fn encode_message_into(msg: &Message, out: &mut Vec<u8>) {
    let len_at = out.len();
    push_u16(out, 0); // patched below
    let start = out.len();

    out.push(msg.body.tag());
    push_u16(out, msg.stock_locate);
    push_u16(out, msg.tracking_number);
    push_u48(out, msg.timestamp);

    match &msg.body {
        Body::SystemEvent(b) => out.push(b.event.byte()),
        Body::StockDirectory(b) => {
            out.extend_from_slice(b.stock.as_bytes());
            out.push(b.market_category.byte());
            out.push(b.financial_status.byte());
            push_u32(out, b.round_lot_size);
            push_flag(out, b.round_lots_only);
            out.push(b.issue_classification.byte());
            out.extend_from_slice(&b.issue_subtype.bytes());
            out.push(if b.authenticity { b'P' } else { b'T' });
            push_maybe_flag(out, b.short_sale_threshold);
            push_maybe_flag(out, b.ipo_flag);
            out.push(b.luld_ref_price_tier.byte());
            push_maybe_flag(out, b.etp_flag);
            push_u32(out, b.etp_leverage_factor);
            push_flag(out, b.inverse_indicator);
        }
        Body::TradingAction(b) => {
            out.extend_from_slice(b.stock.as_bytes());
            out.push(b.trading_state.byte());
            out.push(b' '); // reserved
            out.extend_from_slice(b.reason.as_bytes());
        }
        Body::RegShoRestriction(b) => {
            out.extend_from_slice(b.stock.as_bytes());
            out.push(b.action.byte());
        }
        Body::ParticipantPosition(b) => {
            out.extend_from_slice(b.mpid.as_bytes());
            out.extend_from_slice(b.stock.as_bytes());
            push_flag(out, b.primary_market_maker);
            out.push(b.market_maker_mode.byte());
            out.push(b.market_participant_state.byte());
        }
        Body::AddOrder(b) => {
            push_u64(out, b.reference);
            out.push(b.side.byte());
            push_u32(out, b.shares);
            out.extend_from_slice(b.stock.as_bytes());
            push_u32(out, b.price.raw());
            if let Some(mpid) = b.mpid {
                out.extend_from_slice(mpid.as_bytes());
            }
        }
        Body::OrderExecuted(b) => {
            push_u64(out, b.reference);
            push_u32(out, b.executed);
            push_u64(out, b.match_number);
        }
        Body::OrderExecutedWithPrice(b) => {
            push_u64(out, b.reference);
            push_u32(out, b.executed);
            push_u64(out, b.match_number);
            push_flag(out, b.printable);
            push_u32(out, b.price.raw());
        }
        Body::OrderCancelled(b) => {
            push_u64(out, b.reference);
            push_u32(out, b.cancelled);
        }
        Body::DeleteOrder(b) => push_u64(out, b.reference),
        Body::ReplaceOrder(b) => {
            push_u64(out, b.old_reference);
            push_u64(out, b.new_reference);
            push_u32(out, b.shares);
            push_u32(out, b.price.raw());
        }
        Body::NonCrossTrade(b) => {
            push_u64(out, b.reference);
            out.push(b.side.byte());
            push_u32(out, b.shares);
            out.extend_from_slice(b.stock.as_bytes());
            push_u32(out, b.price.raw());
            push_u64(out, b.match_number);
        }
        Body::CrossTrade(b) => {
            push_u64(out, b.shares);
            out.extend_from_slice(b.stock.as_bytes());
            push_u32(out, b.cross_price.raw());
            push_u64(out, b.match_number);
            out.push(b.cross_type.byte());
        }
        Body::BrokenTrade(b) => push_u64(out, b.match_number),
        Body::Imbalance(b) => {
            push_u64(out, b.paired_shares);
            push_u64(out, b.imbalance_shares);
            out.push(b.imbalance_direction.byte());
            out.extend_from_slice(b.stock.as_bytes());
            push_u32(out, b.far_price.raw());
            push_u32(out, b.near_price.raw());
            push_u32(out, b.current_ref_price.raw());
            out.push(b.cross_type.byte());
            out.push(b.price_variation_indicator);
        }
        Body::RetailPriceImprovement(b) => {
            out.extend_from_slice(b.stock.as_bytes());
            out.push(b.interest_flag.byte());
        }
        Body::IpoQuotingPeriod(b) => {
            out.extend_from_slice(b.stock.as_bytes());
            push_u32(out, b.release_time);
            out.push(b.release_qualifier.byte());
            push_u32(out, b.price.raw());
        }
        Body::LuldAuctionCollar(b) => {
            out.extend_from_slice(b.stock.as_bytes());
            push_u32(out, b.ref_price.raw());
            push_u32(out, b.upper_price.raw());
            push_u32(out, b.lower_price.raw());
            push_u32(out, b.extension);
        }
        Body::MwcbDeclineLevel(b) => {
            push_u64(out, b.level1.raw());
            push_u64(out, b.level2.raw());
            push_u64(out, b.level3.raw());
        }
        Body::MwcbBreach(b) => out.push(b.level.byte()),
    }

    let len = (out.len() - start) as u16;
    out[len_at..len_at + 2].copy_from_slice(&len.to_be_bytes());
}

/// One framed record as an owned buffer.
pub fn encode_message(msg: &Message) -> Bytes {
    let mut out = Vec::with_capacity(64);
    encode_message_into(msg, &mut out);
    Bytes::from(out)
}

/// One observation as an NDJSON line (no trailing newline).
pub fn encode_observation(obs: &MarketObservation) -> Bytes {
    let mut out = Vec::with_capacity(160);
    let mut b = Buffer::new();

    push_str(&mut out, "{\"symbol\":\"");
    push_str(&mut out, obs.symbol.trimmed());

    push_str(&mut out, "\",\"timestamp\":");
    push_str(&mut out, b.format(obs.timestamp));

    push_str(&mut out, ",\"best_bid\":\"");
    let _ = write!(out, "{}", obs.best_bid);

    push_str(&mut out, "\",\"best_ask\":\"");
    let _ = write!(out, "{}", obs.best_ask);

    push_str(&mut out, "\",\"bid_volume\":");
    push_str(&mut out, b.format(obs.bid_volume));

    push_str(&mut out, ",\"ask_volume\":");
    push_str(&mut out, b.format(obs.ask_volume));

    push_str(&mut out, ",\"imbalance\":");
    let _ = write!(out, "{:.6}", obs.imbalance);

    out.push(b'}');
    Bytes::from(out)
}
