//! Realized-loss ceiling
//!
//! Tracks cumulative realized P&L of owned positions and halts the engine
//! once the loss reaches the configured ceiling. Halting is one-way.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use warden_domain::{ClosedTrade, OwnerTag};

/// Whether the engine may still open positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    /// Trading normally
    Active,
    /// Loss ceiling reached; no further opens, ever
    Halted,
}

/// Snapshot of the monitor after the last check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Sum of owned realized results, floored to cents
    pub cumulative_realized_pnl: Decimal,
    /// Current status
    pub status: RiskStatus,
}

/// Monitor for the realized-loss ceiling.
#[derive(Debug, Clone)]
pub struct RiskCeilingMonitor {
    owner_tag: OwnerTag,
    max_loss: Decimal,
    state: RiskState,
}

impl RiskCeilingMonitor {
    /// New monitor in the `Active` state
    pub fn new(owner_tag: OwnerTag, max_loss: Decimal) -> Self {
        Self {
            owner_tag,
            max_loss,
            state: RiskState {
                cumulative_realized_pnl: Decimal::ZERO,
                status: RiskStatus::Active,
            },
        }
    }

    /// Recompute realized P&L from the closed history and update the status.
    ///
    /// Only trades stamped with the owner tag count, on whatever symbols
    /// `history` covers; feed it the owner's history across all symbols.
    /// The sum is floored to two decimals before comparison; a loss equal to
    /// the ceiling halts.
    pub fn check(&mut self, history: &[ClosedTrade]) -> RiskStatus {
        let pnl = realized_pnl(history, &self.owner_tag);
        self.state.cumulative_realized_pnl = pnl;

        if pnl <= -self.max_loss {
            self.state.status = RiskStatus::Halted;
        }

        self.state.status
    }

    /// Current state
    pub fn state(&self) -> RiskState {
        self.state
    }

    /// Whether the ceiling has been hit
    pub fn is_halted(&self) -> bool {
        self.state.status == RiskStatus::Halted
    }

    /// Configured ceiling
    pub fn max_loss(&self) -> Decimal {
        self.max_loss
    }
}

/// Owned realized P&L, floored to cents.
pub fn realized_pnl(history: &[ClosedTrade], owner_tag: &OwnerTag) -> Decimal {
    history
        .iter()
        .filter(|t| &t.owner_tag == owner_tag)
        .map(|t| t.net_profit)
        .sum::<Decimal>()
        .round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity)
}

// =============================================================================
// Tests
// =============================================================================
