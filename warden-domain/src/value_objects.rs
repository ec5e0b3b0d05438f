//! Value Objects for the Warden Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Lot count must be positive
    #[error("Invalid lots: {0}")]
    InvalidLots(String),

    /// Symbol must be a non-empty instrument name
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Owner tag must be non-empty
    #[error("Invalid owner tag: {0}")]
    InvalidOwnerTag(String),

    /// Instrument definition error (pip size, pip value, lot units)
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    /// Sizing inputs were non-positive
    #[error("Invalid risk input: {0}")]
    InvalidRiskInput(String),
}

// =============================================================================
// Price
// =============================================================================

/// Price represents a positive decimal price
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidPrice(format!("Price must be positive, got {}", value)));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Protective-level arithmetic builds prices from already-validated inputs
impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

// =============================================================================
// Lots
// =============================================================================

/// Lots represents a positive trade volume expressed in standard lots
///
/// Conversion to broker units (e.g. 100,000 units per FX lot) is the
/// broker's concern; the engine only reasons in lots.
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lots(Decimal);

impl Lots {
    /// Create a new Lots value with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLots` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidLots(format!("Lots must be positive, got {}", value)));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Lots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// Symbol names a single tradable instrument (e.g., EURUSD, XAUUSD, US500)
///
/// # Invariants
/// - Non-empty
/// - ASCII alphanumeric (plus `.` and `_` used by some brokers for suffixes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Create a Symbol from an instrument name
    ///
    /// # Examples
    /// ```
    /// # use warden_domain::value_objects::Symbol;
    /// let symbol = Symbol::new("eurusd").unwrap();
    /// assert_eq!(symbol.as_str(), "EURUSD");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` if the name is empty or malformed
    pub fn new(name: &str) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidSymbol("Symbol must be non-empty".to_string()));
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_') {
            return Err(DomainError::InvalidSymbol(format!("Unexpected characters in {}", name)));
        }

        Ok(Self(name.to_ascii_uppercase()))
    }

    /// Get the instrument name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// OwnerTag
// =============================================================================

/// OwnerTag marks positions opened by this engine
///
/// Positions on a shared account without the engine's tag belong to other
/// strategies and are never modified or closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerTag(String);

impl OwnerTag {
    /// Create an OwnerTag with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidOwnerTag` if the tag is blank
    pub fn new(tag: &str) -> Result<Self, DomainError> {
        if tag.trim().is_empty() {
            return Err(DomainError::InvalidOwnerTag("Owner tag must be non-empty".to_string()));
        }
        Ok(Self(tag.to_string()))
    }

    /// Get the tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Side
// =============================================================================

/// Side represents the position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Long position (buy low, sell high)
    Long,
    /// Short position (sell high, buy low)
    Short,
}

impl Side {
    /// Both sides, in the order bar-close evaluation visits them
    pub const ALL: [Side; 2] = [Side::Long, Side::Short];

    /// Get the opposite direction
    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Get the entry action for this side
    ///
    /// Long → Buy, Short → Sell
    pub fn entry_action(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Get the exit action for this side
    ///
    /// Long → Sell, Short → Buy
    pub fn exit_action(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }

    /// Whether `candidate` is a strictly more protective stop than `current`
    ///
    /// Long stops improve upward, Short stops improve downward. A position
    /// without a stop accepts any candidate.
    pub fn improves_stop(&self, candidate: Decimal, current: Option<Decimal>) -> bool {
        match (self, current) {
            (_, None) => true,
            (Side::Long, Some(current)) => candidate > current,
            (Side::Short, Some(current)) => candidate < current,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buy order (fills at ask)
    Buy,
    /// Sell order (fills at bid)
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
