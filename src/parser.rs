// src/parser.rs
//! Streaming ITCH 5.0 decoder.
//!
//! Records are length-prefixed; the prefix is authoritative. Each record
//! payload is pulled into a scratch buffer before field extraction, so a
//! bad tag or enum byte costs exactly one record: the cursor is already
//! past it and the next call resumes at the following prefix. Only a
//! short read from the source or an I/O failure ends the stream.

use std::io::{self, Read};

use thiserror::Error;
use tracing::warn;

use crate::message::{
    AddOrder, Body, BrokenTrade, CrossTrade, DeleteOrder, ImbalanceIndicator, IpoQuotingPeriod,
    LuldAuctionCollar, MarketParticipantPosition, Message, MwcbBreach, MwcbDeclineLevel,
    NonCrossTrade, OrderCancelled, OrderExecuted, OrderExecutedWithPrice, RegShoRestriction,
    ReplaceOrder, RetailPriceImprovementIndicator, StockDirectory, SystemEvent, TradingAction,
};
use crate::source::ByteSource;
use crate::types::{
    CrossType, EventCode, FinancialStatus, ImbalanceDirection, InterestFlag, IpoReleaseQualifier,
    IssueClassification, IssueSubType, LevelBreached, LuldRefPriceTier, MarketCategory,
    MarketMakerMode, MarketParticipantState, Mpid, Price4, Price8, RegShoAction, Side, Symbol,
    TradingState,
};

/// Bytes between the length prefix and the body: tag, stock locate,
/// tracking number, 48-bit timestamp.
pub const HEADER_LEN: usize = 11;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The byte source ran out mid-record. Terminal for the stream.
    #[error("stream truncated mid-record")]
    Truncated,
    /// Tag byte outside the ITCH 5.0 table. The record was skipped using
    /// the length prefix; decoding can continue.
    #[error("unknown message tag 0x{0:02x}")]
    UnknownTag(u8),
    /// A field inside a known record did not decode. The record is
    /// dropped; decoding can continue.
    #[error("invalid {field} byte 0x{raw:02x} in record tag 0x{tag:02x}")]
    InvalidField {
        tag: u8,
        field: &'static str,
        raw: u8,
    },
    /// Underlying stream failure. Terminal for the stream.
    #[error("i/o error reading feed")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Whether the stream can produce further records after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DecodeError::Truncated | DecodeError::Io(_))
    }
}

/// Fixed body length (bytes after the 11-byte header) for each tag.
fn body_len(tag: u8) -> Option<usize> {
    Some(match tag {
        b'S' => 1,
        b'R' => 28,
        b'H' => 14,
        b'Y' => 9,
        b'L' => 15,
        b'A' => 25,
        b'F' => 29,
        b'E' => 20,
        b'C' => 25,
        b'X' => 12,
        b'D' => 8,
        b'U' => 24,
        b'P' => 33,
        b'Q' => 29,
        b'B' => 8,
        b'I' => 39,
        b'N' => 9,
        b'K' => 17,
        b'J' => 24,
        b'V' => 24,
        b'W' => 1,
        _ => return None,
    })
}

/// Lazy, one-shot decoder over a byte stream.
pub struct Parser<R> {
    src: ByteSource<R>,
    scratch: Vec<u8>,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R) -> Self {
        Parser {
            src: ByteSource::new(reader),
            scratch: Vec::with_capacity(64),
        }
    }

    /// Decodes the next record. `None` at a clean end of stream.
    /// Recoverable errors (unknown tag, invalid field) leave the cursor
    /// at the next record boundary.
    pub fn next_message(&mut self) -> Option<Result<Message, DecodeError>> {
        match self.src.at_end() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(e) => return Some(Err(e.into())),
        }

        let len = match self.src.read_u16() {
            Ok(l) => l as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Some(Err(DecodeError::Truncated))
            }
            Err(e) => return Some(Err(e.into())),
        };

        self.scratch.resize(len, 0);
        if let Err(e) = self.src.read_exact(&mut self.scratch) {
            return Some(Err(if e.kind() == io::ErrorKind::UnexpectedEof {
                DecodeError::Truncated
            } else {
                e.into()
            }));
        }

        Some(parse_record(&self.scratch))
    }
}

impl<R: Read> Iterator for Parser<R> {
    type Item = Result<Message, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message()
    }
}

/// Field cursor over one complete record payload. Bounds are validated
/// against the tag's fixed body length before field extraction, so the
/// accessors index without further checks.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
    tag: u8,
}

impl<'a> Fields<'a> {
    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        u16::from_be_bytes(self.array())
    }

    fn u32(&mut self) -> u32 {
        u32::from_be_bytes(self.array())
    }

    fn u64(&mut self) -> u64 {
        u64::from_be_bytes(self.array())
    }

    fn u48(&mut self) -> u64 {
        let mut v = 0u64;
        for _ in 0..6 {
            v = (v << 8) | u64::from(self.u8());
        }
        v
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut a = [0u8; N];
        a.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        a
    }

    fn symbol(&mut self) -> Symbol {
        Symbol::from_raw(self.array())
    }

    fn mpid(&mut self) -> Mpid {
        Mpid::from_raw(self.array())
    }

    fn price4(&mut self) -> Price4 {
        Price4::from_raw(self.u32())
    }

    fn price8(&mut self) -> Price8 {
        Price8::from_raw(self.u64())
    }

    /// One ASCII byte mapped through an enum table.
    fn coded<T>(
        &mut self,
        field: &'static str,
        parse: impl FnOnce(u8) -> Option<T>,
    ) -> Result<T, DecodeError> {
        let raw = self.u8();
        parse(raw).ok_or(DecodeError::InvalidField {
            tag: self.tag,
            field,
            raw,
        })
    }

    /// 'Y'/'N' flag byte.
    fn flag(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        self.coded(field, |b| match b {
            b'Y' => Some(true),
            b'N' => Some(false),
            _ => None,
        })
    }

    /// 'Y'/'N' flag byte where a space means "not stated".
    fn maybe_flag(&mut self, field: &'static str) -> Result<Option<bool>, DecodeError> {
        self.coded(field, |b| match b {
            b'Y' => Some(Some(true)),
            b'N' => Some(Some(false)),
            b' ' => Some(None),
            _ => None,
        })
    }
}

fn parse_record(buf: &[u8]) -> Result<Message, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::InvalidField {
            tag: buf.first().copied().unwrap_or(0),
            field: "record_length",
            raw: buf.len() as u8,
        });
    }

    let mut f = Fields {
        buf,
        pos: 0,
        tag: buf[0],
    };
    let tag = f.u8();
    let stock_locate = f.u16();
    let tracking_number = f.u16();
    let timestamp = f.u48();

    let expected = body_len(tag).ok_or(DecodeError::UnknownTag(tag))?;
    let got = buf.len() - HEADER_LEN;
    if got != expected {
        warn!(tag, got, expected, "record length disagrees with tag");
        return Err(DecodeError::InvalidField {
            tag,
            field: "record_length",
            raw: got as u8,
        });
    }

    let body = match tag {
        b'S' => Body::SystemEvent(SystemEvent {
            event: f.coded("event_code", EventCode::from_byte)?,
        }),
        b'R' => Body::StockDirectory(parse_stock_directory(&mut f)?),
        b'H' => {
            let stock = f.symbol();
            let trading_state = f.coded("trading_state", TradingState::from_byte)?;
            let _reserved = f.u8();
            let reason = f.mpid();
            Body::TradingAction(TradingAction {
                stock,
                trading_state,
                reason,
            })
        }
        b'Y' => Body::RegShoRestriction(RegShoRestriction {
            stock: f.symbol(),
            action: f.coded("reg_sho_action", RegShoAction::from_byte)?,
        }),
        b'L' => Body::ParticipantPosition(MarketParticipantPosition {
            mpid: f.mpid(),
            stock: f.symbol(),
            primary_market_maker: f.flag("primary_market_maker")?,
            market_maker_mode: f.coded("market_maker_mode", MarketMakerMode::from_byte)?,
            market_participant_state: f
                .coded("market_participant_state", MarketParticipantState::from_byte)?,
        }),
        b'A' => Body::AddOrder(parse_add_order(&mut f, false)?),
        b'F' => Body::AddOrder(parse_add_order(&mut f, true)?),
        b'E' => Body::OrderExecuted(OrderExecuted {
            reference: f.u64(),
            executed: f.u32(),
            match_number: f.u64(),
        }),
        b'C' => Body::OrderExecutedWithPrice(OrderExecutedWithPrice {
            reference: f.u64(),
            executed: f.u32(),
            match_number: f.u64(),
            printable: f.flag("printable")?,
            price: f.price4(),
        }),
        b'X' => Body::OrderCancelled(OrderCancelled {
            reference: f.u64(),
            cancelled: f.u32(),
        }),
        b'D' => Body::DeleteOrder(DeleteOrder { reference: f.u64() }),
        b'U' => Body::ReplaceOrder(ReplaceOrder {
            old_reference: f.u64(),
            new_reference: f.u64(),
            shares: f.u32(),
            price: f.price4(),
        }),
        b'P' => Body::NonCrossTrade(NonCrossTrade {
            reference: f.u64(),
            side: f.coded("side", Side::from_byte)?,
            shares: f.u32(),
            stock: f.symbol(),
            price: f.price4(),
            match_number: f.u64(),
        }),
        b'Q' => Body::CrossTrade(CrossTrade {
            shares: f.u64(),
            stock: f.symbol(),
            cross_price: f.price4(),
            match_number: f.u64(),
            cross_type: f.coded("cross_type", CrossType::from_byte)?,
        }),
        b'B' => Body::BrokenTrade(BrokenTrade {
            match_number: f.u64(),
        }),
        b'I' => Body::Imbalance(ImbalanceIndicator {
            paired_shares: f.u64(),
            imbalance_shares: f.u64(),
            imbalance_direction: f.coded("imbalance_direction", ImbalanceDirection::from_byte)?,
            stock: f.symbol(),
            far_price: f.price4(),
            near_price: f.price4(),
            current_ref_price: f.price4(),
            // The NOII cross set excludes the intraday cross.
            cross_type: f.coded("cross_type", |b| {
                CrossType::from_byte(b).filter(|c| *c != CrossType::Intraday)
            })?,
            price_variation_indicator: f.u8(),
        }),
        b'N' => Body::RetailPriceImprovement(RetailPriceImprovementIndicator {
            stock: f.symbol(),
            interest_flag: f.coded("interest_flag", InterestFlag::from_byte)?,
        }),
        b'K' => Body::IpoQuotingPeriod(IpoQuotingPeriod {
            stock: f.symbol(),
            release_time: f.u32(),
            release_qualifier: f.coded("release_qualifier", IpoReleaseQualifier::from_byte)?,
            price: f.price4(),
        }),
        b'J' => Body::LuldAuctionCollar(LuldAuctionCollar {
            stock: f.symbol(),
            ref_price: f.price4(),
            upper_price: f.price4(),
            lower_price: f.price4(),
            extension: f.u32(),
        }),
        b'V' => Body::MwcbDeclineLevel(MwcbDeclineLevel {
            level1: f.price8(),
            level2: f.price8(),
            level3: f.price8(),
        }),
        b'W' => Body::MwcbBreach(MwcbBreach {
            level: f.coded("level_breached", LevelBreached::from_byte)?,
        }),
        _ => return Err(DecodeError::UnknownTag(tag)),
    };

    Ok(Message {
        tag,
        stock_locate,
        tracking_number,
        timestamp,
        body,
    })
}

fn parse_add_order(f: &mut Fields<'_>, with_mpid: bool) -> Result<AddOrder, DecodeError> {
    let reference = f.u64();
    let side = f.coded("side", Side::from_byte)?;
    let shares = f.u32();
    let stock = f.symbol();
    let price = f.price4();
    let mpid = if with_mpid { Some(f.mpid()) } else { None };
    Ok(AddOrder {
        reference,
        side,
        shares,
        stock,
        price,
        mpid,
    })
}

fn parse_stock_directory(f: &mut Fields<'_>) -> Result<StockDirectory, DecodeError> {
    let stock = f.symbol();
    let market_category = f.coded("market_category", MarketCategory::from_byte)?;
    let financial_status = f.coded("financial_status", FinancialStatus::from_byte)?;
    let round_lot_size = f.u32();
    let round_lots_only = f.flag("round_lots_only")?;
    let issue_classification = f.coded("issue_classification", IssueClassification::from_byte)?;
    let subtype_code: [u8; 2] = f.array();
    let issue_subtype = IssueSubType::from_bytes(subtype_code).ok_or(DecodeError::InvalidField {
        tag: f.tag,
        field: "issue_subtype",
        raw: subtype_code[0],
    })?;
    let authenticity = f.coded("authenticity", |b| match b {
        b'P' => Some(true),
        b'T' => Some(false),
        _ => None,
    })?;
    let short_sale_threshold = f.maybe_flag("short_sale_threshold")?;
    let ipo_flag = f.maybe_flag("ipo_flag")?;
    let luld_ref_price_tier = f.coded("luld_ref_price_tier", LuldRefPriceTier::from_byte)?;
    let etp_flag = f.maybe_flag("etp_flag")?;
    let etp_leverage_factor = f.u32();
    let inverse_indicator = f.flag("inverse_indicator")?;

    Ok(StockDirectory {
        stock,
        market_category,
        financial_status,
        round_lot_size,
        round_lots_only,
        issue_classification,
        issue_subtype,
        authenticity,
        short_sale_threshold,
        ipo_flag,
        luld_ref_price_tier,
        etp_flag,
        etp_leverage_factor,
        inverse_indicator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 2);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn header(tag: u8, locate: u16, tracking: u16, ts: u64) -> Vec<u8> {
        let mut h = vec![tag];
        h.extend_from_slice(&locate.to_be_bytes());
        h.extend_from_slice(&tracking.to_be_bytes());
        h.extend_from_slice(&ts.to_be_bytes()[2..]);
        h
    }

    #[test]
    fn decodes_add_order() {
        let mut payload = header(b'A', 3, 7, 1_000);
        payload.extend_from_slice(&42u64.to_be_bytes());
        payload.push(b'B');
        payload.extend_from_slice(&100u32.to_be_bytes());
        payload.extend_from_slice(b"AAPL    ");
        payload.extend_from_slice(&1_234_500u32.to_be_bytes());

        let mut p = Parser::new(Cursor::new(framed(&payload)));
        let msg = p.next_message().unwrap().unwrap();

        assert_eq!(msg.tag, b'A');
        assert_eq!(msg.stock_locate, 3);
        assert_eq!(msg.tracking_number, 7);
        assert_eq!(msg.timestamp, 1_000);
        match msg.body {
            Body::AddOrder(a) => {
                assert_eq!(a.reference, 42);
                assert_eq!(a.side, Side::Buy);
                assert_eq!(a.shares, 100);
                assert_eq!(a.stock, Symbol::new(b"AAPL"));
                assert_eq!(a.price, Price4::from_raw(1_234_500));
                assert_eq!(a.mpid, None);
            }
            other => panic!("wrong body: {other:?}"),
        }
        assert!(p.next_message().is_none());
    }

    #[test]
    fn decodes_system_event() {
        let mut payload = header(b'S', 0, 0, 5);
        payload.push(b'O');
        let mut p = Parser::new(Cursor::new(framed(&payload)));
        let msg = p.next_message().unwrap().unwrap();
        assert_eq!(
            msg.body,
            Body::SystemEvent(SystemEvent {
                event: EventCode::StartOfMessages
            })
        );
    }

    #[test]
    fn unknown_tag_skips_and_resumes() {
        let mut feed = framed(&header(b'z', 0, 0, 1));
        let mut del = header(b'D', 1, 0, 2);
        del.extend_from_slice(&9u64.to_be_bytes());
        feed.extend_from_slice(&framed(&del));

        let mut p = Parser::new(Cursor::new(feed));
        match p.next_message().unwrap() {
            Err(DecodeError::UnknownTag(b'z')) => {}
            other => panic!("expected unknown tag, got {other:?}"),
        }
        let msg = p.next_message().unwrap().unwrap();
        assert_eq!(msg.body, Body::DeleteOrder(DeleteOrder { reference: 9 }));
        assert!(p.next_message().is_none());
    }

    #[test]
    fn invalid_enum_byte_drops_record_only() {
        let mut payload = header(b'S', 0, 0, 1);
        payload.push(b'x');
        let mut feed = framed(&payload);
        let mut ok = header(b'S', 0, 0, 2);
        ok.push(b'C');
        feed.extend_from_slice(&framed(&ok));

        let mut p = Parser::new(Cursor::new(feed));
        match p.next_message().unwrap() {
            Err(DecodeError::InvalidField {
                tag: b'S',
                field,
                raw: b'x',
            }) => assert_eq!(field, "event_code"),
            other => panic!("expected invalid field, got {other:?}"),
        }
        let msg = p.next_message().unwrap().unwrap();
        assert_eq!(
            msg.body,
            Body::SystemEvent(SystemEvent {
                event: EventCode::EndOfMessages
            })
        );
    }

    #[test]
    fn truncated_record_is_fatal() {
        let mut payload = header(b'D', 0, 0, 1);
        payload.extend_from_slice(&1u64.to_be_bytes());
        let mut feed = framed(&payload);
        feed.truncate(feed.len() - 3);

        let mut p = Parser::new(Cursor::new(feed));
        match p.next_message().unwrap() {
            Err(e @ DecodeError::Truncated) => assert!(e.is_fatal()),
            other => panic!("expected truncation, got {other:?}"),
        }
    }
}
