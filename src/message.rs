// src/message.rs
//! Decoded ITCH 5.0 messages.
//!
//! Every record shares an 11-byte header (tag, stock locate, tracking
//! number, 48-bit timestamp) followed by a fixed-layout body selected by
//! the tag. The body is modelled as a closed tagged union so downstream
//! code dispatches with exhaustive matches.

use serde::Serialize;

use crate::types::{
    CrossType, EventCode, FinancialStatus, ImbalanceDirection, InterestFlag, IpoReleaseQualifier,
    IssueClassification, IssueSubType, LevelBreached, LuldRefPriceTier, MarketCategory,
    MarketMakerMode, MarketParticipantState, Mpid, Price4, Price8, RegShoAction, Side, Symbol,
    TradingState,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SystemEvent {
    pub event: EventCode,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StockDirectory {
    pub stock: Symbol,
    pub market_category: MarketCategory,
    pub financial_status: FinancialStatus,
    pub round_lot_size: u32,
    pub round_lots_only: bool,
    pub issue_classification: IssueClassification,
    pub issue_subtype: IssueSubType,
    pub authenticity: bool,
    pub short_sale_threshold: Option<bool>,
    pub ipo_flag: Option<bool>,
    pub luld_ref_price_tier: LuldRefPriceTier,
    pub etp_flag: Option<bool>,
    pub etp_leverage_factor: u32,
    pub inverse_indicator: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TradingAction {
    pub stock: Symbol,
    pub trading_state: TradingState,
    pub reason: Mpid,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RegShoRestriction {
    pub stock: Symbol,
    pub action: RegShoAction,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MarketParticipantPosition {
    pub mpid: Mpid,
    pub stock: Symbol,
    pub primary_market_maker: bool,
    pub market_maker_mode: MarketMakerMode,
    pub market_participant_state: MarketParticipantState,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AddOrder {
    pub reference: u64,
    pub side: Side,
    pub shares: u32,
    pub stock: Symbol,
    pub price: Price4,
    pub mpid: Option<Mpid>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OrderExecuted {
    pub reference: u64,
    pub executed: u32,
    pub match_number: u64,
}

/// Execution at a price other than the resting price. `price` is the
/// trade print price, not the order's level in the book.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OrderExecutedWithPrice {
    pub reference: u64,
    pub executed: u32,
    pub match_number: u64,
    pub printable: bool,
    pub price: Price4,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OrderCancelled {
    pub reference: u64,
    pub cancelled: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DeleteOrder {
    pub reference: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ReplaceOrder {
    pub old_reference: u64,
    pub new_reference: u64,
    pub shares: u32,
    pub price: Price4,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NonCrossTrade {
    pub reference: u64,
    pub side: Side,
    pub shares: u32,
    pub stock: Symbol,
    pub price: Price4,
    pub match_number: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CrossTrade {
    pub shares: u64,
    pub stock: Symbol,
    pub cross_price: Price4,
    pub match_number: u64,
    pub cross_type: CrossType,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BrokenTrade {
    pub match_number: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ImbalanceIndicator {
    pub paired_shares: u64,
    pub imbalance_shares: u64,
    pub imbalance_direction: ImbalanceDirection,
    pub stock: Symbol,
    pub far_price: Price4,
    pub near_price: Price4,
    pub current_ref_price: Price4,
    pub cross_type: CrossType,
    pub price_variation_indicator: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RetailPriceImprovementIndicator {
    pub stock: Symbol,
    pub interest_flag: InterestFlag,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IpoQuotingPeriod {
    pub stock: Symbol,
    pub release_time: u32,
    pub release_qualifier: IpoReleaseQualifier,
    pub price: Price4,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LuldAuctionCollar {
    pub stock: Symbol,
    pub ref_price: Price4,
    pub upper_price: Price4,
    pub lower_price: Price4,
    pub extension: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MwcbDeclineLevel {
    pub level1: Price8,
    pub level2: Price8,
    pub level3: Price8,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MwcbBreach {
    pub level: LevelBreached,
}

/// Message body, one variant per ITCH tag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Body {
    SystemEvent(SystemEvent),
    StockDirectory(StockDirectory),
    TradingAction(TradingAction),
    RegShoRestriction(RegShoRestriction),
    ParticipantPosition(MarketParticipantPosition),
    AddOrder(AddOrder),
    OrderExecuted(OrderExecuted),
    OrderExecutedWithPrice(OrderExecutedWithPrice),
    OrderCancelled(OrderCancelled),
    DeleteOrder(DeleteOrder),
    ReplaceOrder(ReplaceOrder),
    NonCrossTrade(NonCrossTrade),
    CrossTrade(CrossTrade),
    BrokenTrade(BrokenTrade),
    Imbalance(ImbalanceIndicator),
    RetailPriceImprovement(RetailPriceImprovementIndicator),
    IpoQuotingPeriod(IpoQuotingPeriod),
    LuldAuctionCollar(LuldAuctionCollar),
    MwcbDeclineLevel(MwcbDeclineLevel),
    MwcbBreach(MwcbBreach),
}

impl Body {
    /// Wire tag byte for this body.
    pub fn tag(&self) -> u8 {
        match self {
            Body::SystemEvent(_) => b'S',
            Body::StockDirectory(_) => b'R',
            Body::TradingAction(_) => b'H',
            Body::RegShoRestriction(_) => b'Y',
            Body::ParticipantPosition(_) => b'L',
            Body::AddOrder(a) => {
                if a.mpid.is_some() {
                    b'F'
                } else {
                    b'A'
                }
            }
            Body::OrderExecuted(_) => b'E',
            Body::OrderExecutedWithPrice(_) => b'C',
            Body::OrderCancelled(_) => b'X',
            Body::DeleteOrder(_) => b'D',
            Body::ReplaceOrder(_) => b'U',
            Body::NonCrossTrade(_) => b'P',
            Body::CrossTrade(_) => b'Q',
            Body::BrokenTrade(_) => b'B',
            Body::Imbalance(_) => b'I',
            Body::RetailPriceImprovement(_) => b'N',
            Body::IpoQuotingPeriod(_) => b'K',
            Body::LuldAuctionCollar(_) => b'J',
            Body::MwcbDeclineLevel(_) => b'V',
            Body::MwcbBreach(_) => b'W',
        }
    }
}

/// One decoded ITCH record: the shared header plus the tag-specific body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Message {
    pub tag: u8,
    pub stock_locate: u16,
    pub tracking_number: u16,
    /// Nanoseconds since midnight, 48 bits on the wire.
    pub timestamp: u64,
    pub body: Body,
}

impl Message {
    /// Convenience constructor used by tests and tools; fills the header
    /// tag from the body.
    pub fn new(stock_locate: u16, tracking_number: u16, timestamp: u64, body: Body) -> Self {
        Message {
            tag: body.tag(),
            stock_locate,
            tracking_number,
            timestamp,
            body,
        }
    }
}
