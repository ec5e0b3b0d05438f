//! Domain Entities for Warden
//!
//! Positions and closed trades as reported by the broker. The engine owns no
//! position state of its own: these are rebuilt from the broker every cycle.

use crate::market_data::MarketSnapshot;
use crate::value_objects::{Lots, OwnerTag, Price, Side, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a Position (broker-assigned)
pub type PositionId = Uuid;

// =============================================================================
// Position
// =============================================================================

/// An open trade on the broker account.
///
/// Key concepts:
/// - `stop_loss` only ever moves in the favorable direction once set
/// - `owner_tag` separates the engine's positions from other strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: Symbol,
    pub owner_tag: OwnerTag,
    pub side: Side,

    pub entry_price: Price,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,

    pub volume: Lots,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Whether this position was opened under `tag`
    pub fn is_owned_by(&self, tag: &OwnerTag) -> bool {
        &self.owner_tag == tag
    }

    /// Current stop as a raw decimal, if any
    pub fn stop_decimal(&self) -> Option<Decimal> {
        self.stop_loss.map(|p| p.as_decimal())
    }

    /// Unrealized loss in pips relative to the current quote.
    ///
    /// ```text
    /// Long:  (entry - bid) / pip_size
    /// Short: (ask - entry) / pip_size
    /// ```
    ///
    /// Positive means the position is under water.
    pub fn deficit_pips(&self, snapshot: &MarketSnapshot) -> Decimal {
        let entry = self.entry_price.as_decimal();
        let distance = match self.side {
            Side::Long => entry - snapshot.bid,
            Side::Short => snapshot.ask - entry,
        };
        distance / snapshot.pip_size
    }

    /// Unrealized result in pips (the negation of the deficit)
    pub fn unrealized_pips(&self, snapshot: &MarketSnapshot) -> Decimal {
        -self.deficit_pips(snapshot)
    }

    /// Whether the position would close in profit at the current quote
    pub fn is_profitable(&self, snapshot: &MarketSnapshot) -> bool {
        self.unrealized_pips(snapshot) > Decimal::ZERO
    }
}

// =============================================================================
// Closed trades
// =============================================================================

/// Why a position left the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Stop-loss price reached
    StopLoss,
    /// Take-profit price reached
    TakeProfit,
    /// Closed by an explicit close request
    Manual,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::Manual => write!(f, "manual"),
        }
    }
}

/// A position from the broker's closed history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position_id: PositionId,
    pub symbol: Symbol,
    pub owner_tag: OwnerTag,
    pub side: Side,
    /// Realized result in account currency, net of costs
    pub net_profit: Decimal,
    pub closed_at: DateTime<Utc>,
    pub reason: ExitReason,
}

/// Most recently closed trade for `tag` on `symbol`
pub fn last_closed<'a>(
    history: &'a [ClosedTrade],
    tag: &OwnerTag,
    symbol: &Symbol,
) -> Option<&'a ClosedTrade> {
    history
        .iter()
        .filter(|t| &t.owner_tag == tag && &t.symbol == symbol)
        .max_by_key(|t| t.closed_at)
}

// =============================================================================
// Order request
// =============================================================================

/// Market order the engine asks the broker to execute.
///
/// Stop and target are expressed as pip distances from the fill, the way
/// the broker API takes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub volume: Lots,
    pub owner_tag: OwnerTag,
    pub stop_loss_pips: Decimal,
    pub take_profit_pips: Decimal,
}

// =============================================================================
// Tests
// =============================================================================
