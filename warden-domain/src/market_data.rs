//! Market Data Types
//!
//! Read-only views of the market supplied by the host each cycle.
//! The engine never caches these between events.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{DomainError, Side, Symbol};

// =============================================================================
// Instrument
// =============================================================================

/// Static description of the traded instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Instrument name
    pub symbol: Symbol,
    /// Smallest standard price increment (0.0001 for most FX pairs)
    pub pip_size: Decimal,
    /// Account-currency value of one pip for one lot
    pub pip_value: Decimal,
    /// Broker units per lot (100,000 for FX)
    pub lot_units: Decimal,
}

impl Instrument {
    /// Create an instrument definition with validation.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidInstrument` if any scale is non-positive.
    pub fn new(
        symbol: Symbol,
        pip_size: Decimal,
        pip_value: Decimal,
        lot_units: Decimal,
    ) -> Result<Self, DomainError> {
        if pip_size <= Decimal::ZERO {
            return Err(DomainError::InvalidInstrument("Pip size must be positive".to_string()));
        }
        if pip_value <= Decimal::ZERO {
            return Err(DomainError::InvalidInstrument("Pip value must be positive".to_string()));
        }
        if lot_units <= Decimal::ZERO {
            return Err(DomainError::InvalidInstrument("Lot units must be positive".to_string()));
        }

        Ok(Self {
            symbol,
            pip_size,
            pip_value,
            lot_units,
        })
    }

    /// Convert a price distance into pips.
    pub fn to_pips(&self, distance: Decimal) -> Decimal {
        distance / self.pip_size
    }
}

// =============================================================================
// MarketSnapshot
// =============================================================================

/// Quote and clock view of the instrument at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Instrument this quote belongs to
    pub symbol: Symbol,
    /// Best bid
    pub bid: Decimal,
    /// Best ask
    pub ask: Decimal,
    /// Pip size of the instrument
    pub pip_size: Decimal,
    /// Broker server time (UTC)
    pub server_time: DateTime<Utc>,
    /// Seconds until the current trading session closes, if the market is open
    pub time_till_close_secs: Option<i64>,
}

impl MarketSnapshot {
    /// Spread in pips: `(ask - bid) / pip_size`.
    pub fn spread_pips(&self) -> Decimal {
        (self.ask - self.bid) / self.pip_size
    }

    /// Spread as a price distance.
    pub fn spread_price(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Time left in the current session.
    pub fn time_till_close(&self) -> Option<Duration> {
        self.time_till_close_secs.map(Duration::seconds)
    }

    /// Price an existing position of `side` is valued (and closed) at.
    ///
    /// Long exits sell at the bid, Short exits buy at the ask.
    pub fn exit_price(&self, side: Side) -> Decimal {
        match side {
            Side::Long => self.bid,
            Side::Short => self.ask,
        }
    }

    /// Price a new market order of `side` fills at.
    pub fn entry_price(&self, side: Side) -> Decimal {
        match side {
            Side::Long => self.ask,
            Side::Short => self.bid,
        }
    }
}

// =============================================================================
// BarClose
// =============================================================================

/// Bar-close event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarClose {
    /// Instrument the bar belongs to
    pub symbol: Symbol,
    /// Open time of the bar that starts with this event
    pub current_bar_open: DateTime<Utc>,
    /// Close price of the bar that just completed
    pub close: Decimal,
    /// Close price of the bar before that
    pub prev_close: Decimal,
}

// =============================================================================
// Tests
// =============================================================================
