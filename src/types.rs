// src/types.rs
//! Fixed-width identifiers, fixed-point prices and the ITCH 5.0 enum
//! taxonomies. Byte mappings follow the NASDAQ TotalView-ITCH 5.0
//! specification.

use serde::{Serialize, Serializer};
use std::fmt;

/// 8-character space-padded stock symbol.
///
/// Equality and ordering are over the raw bytes, trailing spaces included.
/// Display and serialization trim trailing spaces.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol([u8; 8]);

impl Symbol {
    pub fn new(s: &[u8]) -> Self {
        let mut buf = [b' '; 8];
        let n = s.len().min(8);
        buf[..n].copy_from_slice(&s[..n]);
        Symbol(buf)
    }

    #[inline]
    pub const fn from_raw(raw: [u8; 8]) -> Self {
        Symbol(raw)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Symbol text with trailing spaces removed.
    pub fn trimmed(&self) -> &str {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != b' ')
            .map_or(0, |i| i + 1);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trimmed())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.trimmed())
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(self.trimmed())
    }
}

/// 4-character space-padded market participant identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mpid([u8; 4]);

impl Mpid {
    pub fn new(s: &[u8]) -> Self {
        let mut buf = [b' '; 4];
        let n = s.len().min(4);
        buf[..n].copy_from_slice(&s[..n]);
        Mpid(buf)
    }

    #[inline]
    pub const fn from_raw(raw: [u8; 4]) -> Self {
        Mpid(raw)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn trimmed(&self) -> &str {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != b' ')
            .map_or(0, |i| i + 1);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl fmt::Display for Mpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trimmed())
    }
}

impl fmt::Debug for Mpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mpid({:?})", self.trimmed())
    }
}

impl Serialize for Mpid {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(self.trimmed())
    }
}

/// Unsigned price with four implicit decimal places (wire 1234567 = 123.4567).
///
/// All book arithmetic stays on the raw integer; the decimal form exists
/// only for display and serialization.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Price4(u32);

impl Price4 {
    pub const ZERO: Price4 = Price4(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Price4(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Price4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / 10_000, self.0 % 10_000)
    }
}

impl fmt::Debug for Price4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price4({self})")
    }
}

impl Serialize for Price4 {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

/// Unsigned price with eight implicit decimal places; used by MWCB levels.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Price8(u64);

impl Price8 {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Price8(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Price8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08}", self.0 / 100_000_000, self.0 % 100_000_000)
    }
}

impl fmt::Debug for Price8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price8({self})")
    }
}

impl Serialize for Price8 {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

macro_rules! byte_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $byte:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn from_byte(b: u8) -> Option<Self> {
                match b {
                    $($byte => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn byte(self) -> u8 {
                match self {
                    $(Self::$variant => $byte),+
                }
            }
        }
    };
}

byte_enum! {
    /// Order side.
    Side {
        Buy = b'B',
        Sell = b'S',
    }
}

byte_enum! {
    /// System event codes carried by the 'S' message.
    EventCode {
        StartOfMessages = b'O',
        StartOfSystemHours = b'S',
        StartOfMarketHours = b'Q',
        EndOfMarketHours = b'M',
        EndOfSystemHours = b'E',
        EndOfMessages = b'C',
    }
}

byte_enum! {
    MarketCategory {
        NasdaqGlobalSelect = b'Q',
        NasdaqGlobalMarket = b'G',
        NasdaqCapitalMarket = b'S',
        Nyse = b'N',
        NyseMkt = b'A',
        NyseArca = b'P',
        BatsZExchange = b'Z',
        InvestorsExchange = b'V',
        Unavailable = b' ',
    }
}

byte_enum! {
    FinancialStatus {
        Normal = b'N',
        Deficient = b'D',
        Delinquent = b'E',
        Bankrupt = b'Q',
        Suspended = b'S',
        DeficientBankrupt = b'G',
        DeficientDelinquent = b'H',
        DelinquentBankrupt = b'J',
        DeficientDelinquentBankrupt = b'K',
        EtpSuspended = b'C',
        Unavailable = b' ',
    }
}

byte_enum! {
    IssueClassification {
        AmericanDepositaryShare = b'A',
        Bond = b'B',
        CommonStock = b'C',
        DepositoryReceipt = b'F',
        A144 = b'I',
        LimitedPartnership = b'L',
        Notes = b'N',
        OrdinaryShare = b'O',
        PreferredStock = b'P',
        OtherSecurities = b'Q',
        Right = b'R',
        SharesOfBeneficialInterest = b'S',
        ConvertibleDebenture = b'T',
        Unit = b'U',
        UnitsPerBenifInt = b'V',
        Warrant = b'W',
    }
}

byte_enum! {
    LuldRefPriceTier {
        Tier1 = b'1',
        Tier2 = b'2',
        Na = b' ',
    }
}

byte_enum! {
    MarketMakerMode {
        Normal = b'N',
        Passive = b'P',
        Syndicate = b'S',
        Presyndicate = b'R',
        Penalty = b'L',
    }
}

byte_enum! {
    MarketParticipantState {
        Active = b'A',
        Excused = b'E',
        Withdrawn = b'W',
        Suspended = b'S',
        Deleted = b'D',
    }
}

byte_enum! {
    RegShoAction {
        None = b'0',
        Intraday = b'1',
        Extant = b'2',
    }
}

byte_enum! {
    TradingState {
        Halted = b'H',
        Paused = b'P',
        QuotationOnly = b'Q',
        Trading = b'T',
    }
}

byte_enum! {
    ImbalanceDirection {
        Buy = b'B',
        Sell = b'S',
        NoImbalance = b'N',
        InsufficientOrders = b'O',
    }
}

byte_enum! {
    /// Auction cross classifications. `ExtendedTradingClose` is the 'A'
    /// extended-close cross introduced alongside the closing cross.
    CrossType {
        Opening = b'O',
        Closing = b'C',
        IpoOrHalted = b'H',
        Intraday = b'I',
        ExtendedTradingClose = b'A',
    }
}

byte_enum! {
    IpoReleaseQualifier {
        Anticipated = b'A',
        Cancelled = b'C',
    }
}

byte_enum! {
    LevelBreached {
        L1 = b'1',
        L2 = b'2',
        L3 = b'3',
    }
}

byte_enum! {
    InterestFlag {
        RpiAvailableBuySide = b'B',
        RpiAvailableSellSide = b'S',
        RpiAvailableBothSides = b'A',
        RpiNoneAvailable = b'N',
    }
}

/// Issue subtypes use a two-character code; the table below is the
/// ITCH 5.0 appendix list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IssueSubType {
    PreferredTrustSecurities,
    AlphaIndexEtns,
    IndexBasedDerivative,
    CommonShares,
    CommodityBasedTrustShares,
    CommodityFuturesTrustShares,
    CommodityLinkedSecurities,
    CommodityIndexTrustShares,
    CollateralizedMortgageObligation,
    CurrencyTrustShares,
    CommodityCurrencyLinkedSecurities,
    CurrencyWarrants,
    GlobalDepositaryShares,
    EtfPortfolioDepositaryReceipt,
    EquityGoldShares,
    EtnEquityIndexLinkedSecurities,
    ExchangeTradedManagedFunds,
    ExchangeTradedNotes,
    EquityUnits,
    Holdrs,
    EtnFixedIncomeLinkedSecurities,
    EtnFuturesLinkedSecurities,
    GlobalShares,
    EtfIndexFundShares,
    InterestRate,
    IndexWarrant,
    IndexLinkedExchangeableNotes,
    CorporateBackedTrustSecurity,
    ContingentLitigationRight,
    Llc,
    EquityBasedDerivative,
    ManagedFundShares,
    EtnMultiFactorIndexLinkedSecurities,
    ManagedTrustSecurities,
    NyRegistryShares,
    OpenEndedMutualFund,
    PrivatelyHeldSecurity,
    PoisonPill,
    PartnershipUnits,
    ClosedEndFunds,
    RegS,
    CommodityRedeemableCommodityLinkedSecurities,
    EtnRedeemableFuturesLinkedSecurities,
    Reit,
    CommodityRedeemableCurrencyLinkedSecurities,
    Seed,
    SpotRateClosing,
    SpotRateIntraday,
    TrackingStock,
    TrustCertificates,
    TrustUnits,
    Portal,
    ContingentValueRight,
    TrustIssuedReceipts,
    WorldCurrencyOption,
    Trust,
    Other,
    NotApplicable,
}

const ISSUE_SUBTYPE_CODES: &[(IssueSubType, [u8; 2])] = &[
    (IssueSubType::PreferredTrustSecurities, *b"A "),
    (IssueSubType::AlphaIndexEtns, *b"AI"),
    (IssueSubType::IndexBasedDerivative, *b"B "),
    (IssueSubType::CommonShares, *b"C "),
    (IssueSubType::CommodityBasedTrustShares, *b"CB"),
    (IssueSubType::CommodityFuturesTrustShares, *b"CF"),
    (IssueSubType::CommodityLinkedSecurities, *b"CL"),
    (IssueSubType::CommodityIndexTrustShares, *b"CM"),
    (IssueSubType::CollateralizedMortgageObligation, *b"CO"),
    (IssueSubType::CurrencyTrustShares, *b"CT"),
    (IssueSubType::CommodityCurrencyLinkedSecurities, *b"CU"),
    (IssueSubType::CurrencyWarrants, *b"CW"),
    (IssueSubType::GlobalDepositaryShares, *b"D "),
    (IssueSubType::EtfPortfolioDepositaryReceipt, *b"E "),
    (IssueSubType::EquityGoldShares, *b"EG"),
    (IssueSubType::EtnEquityIndexLinkedSecurities, *b"EI"),
    (IssueSubType::ExchangeTradedManagedFunds, *b"EM"),
    (IssueSubType::ExchangeTradedNotes, *b"EN"),
    (IssueSubType::EquityUnits, *b"EU"),
    (IssueSubType::Holdrs, *b"F "),
    (IssueSubType::EtnFixedIncomeLinkedSecurities, *b"FI"),
    (IssueSubType::EtnFuturesLinkedSecurities, *b"FL"),
    (IssueSubType::GlobalShares, *b"G "),
    (IssueSubType::EtfIndexFundShares, *b"I "),
    (IssueSubType::InterestRate, *b"IR"),
    (IssueSubType::IndexWarrant, *b"IW"),
    (IssueSubType::IndexLinkedExchangeableNotes, *b"IX"),
    (IssueSubType::CorporateBackedTrustSecurity, *b"J "),
    (IssueSubType::ContingentLitigationRight, *b"L "),
    (IssueSubType::Llc, *b"LL"),
    (IssueSubType::EquityBasedDerivative, *b"M "),
    (IssueSubType::ManagedFundShares, *b"MF"),
    (IssueSubType::EtnMultiFactorIndexLinkedSecurities, *b"ML"),
    (IssueSubType::ManagedTrustSecurities, *b"MT"),
    (IssueSubType::NyRegistryShares, *b"N "),
    (IssueSubType::OpenEndedMutualFund, *b"O "),
    (IssueSubType::PrivatelyHeldSecurity, *b"P "),
    (IssueSubType::PoisonPill, *b"PP"),
    (IssueSubType::PartnershipUnits, *b"PU"),
    (IssueSubType::ClosedEndFunds, *b"Q "),
    (IssueSubType::RegS, *b"R "),
    (
        IssueSubType::CommodityRedeemableCommodityLinkedSecurities,
        *b"RC",
    ),
    (IssueSubType::EtnRedeemableFuturesLinkedSecurities, *b"RF"),
    (IssueSubType::Reit, *b"RT"),
    (
        IssueSubType::CommodityRedeemableCurrencyLinkedSecurities,
        *b"RU",
    ),
    (IssueSubType::Seed, *b"S "),
    (IssueSubType::SpotRateClosing, *b"SC"),
    (IssueSubType::SpotRateIntraday, *b"SI"),
    (IssueSubType::TrackingStock, *b"T "),
    (IssueSubType::TrustCertificates, *b"TC"),
    (IssueSubType::TrustUnits, *b"TU"),
    (IssueSubType::Portal, *b"U "),
    (IssueSubType::ContingentValueRight, *b"V "),
    (IssueSubType::TrustIssuedReceipts, *b"W "),
    (IssueSubType::WorldCurrencyOption, *b"WC"),
    (IssueSubType::Trust, *b"X "),
    (IssueSubType::Other, *b"Y "),
    (IssueSubType::NotApplicable, *b"Z "),
];

impl IssueSubType {
    /// Cold path (directory records only), so a table scan is fine.
    pub fn from_bytes(code: [u8; 2]) -> Option<Self> {
        ISSUE_SUBTYPE_CODES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(v, _)| *v)
    }

    pub fn bytes(self) -> [u8; 2] {
        ISSUE_SUBTYPE_CODES
            .iter()
            .find(|(v, _)| *v == self)
            .map(|(_, c)| *c)
            .unwrap_or(*b"Z ")
    }
}
