//! Warden Engine: pure position-management decisions
//!
//! The engine takes the broker's view (positions, history, quote) and
//! returns actions. It never talks to the broker itself.

use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

use warden_domain::{
    adjust_stop, compute_volume, fixed_volume, MarketSnapshot, OrderRequest, Position, PositionId,
    Price, Side, Sizing, StopAdjustment,
};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::guards::{DenyReason, GuardChain, GuardContext, GuardResult};
use crate::session::{SessionRules, SessionWindow};

/// Decimal places for stop and target distances sent to the broker
const ORDER_PIPS_DECIMALS: u32 = 1;

// =============================================================================
// Actions
// =============================================================================

/// Why the engine closes a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A signal fired in the other direction
    OppositeSignal,
    /// A session deadline is about to pass
    SessionEnd(SessionWindow),
    /// Explicit request to bank open profit
    TakeProfitNow,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::OppositeSignal => write!(f, "opposite signal"),
            CloseReason::SessionEnd(window) => write!(f, "{}", window),
            CloseReason::TakeProfitNow => write!(f, "profit taking"),
        }
    }
}

/// One broker-facing step decided by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// Close a position at market
    ClosePosition {
        /// Position to close
        position_id: PositionId,
        /// Why
        reason: CloseReason,
    },
    /// Move a position's stop
    ModifyStopLoss {
        /// Position to modify
        position_id: PositionId,
        /// The move
        adjustment: StopAdjustment,
    },
    /// Open a position at market
    SubmitMarketOrder(OrderRequest),
}

/// Result of deciding an open
#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    /// A guard refused
    Denied(DenyReason),
    /// Open with this order
    Submit(EntryPlan),
}

/// A fully computed open
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPlan {
    /// Order to submit
    pub order: OrderRequest,
    /// Volume computation behind `order.volume`
    pub sizing: Sizing,
    /// Absolute stop price relative to the signal price
    pub stop_loss: Price,
    /// Absolute target price relative to the signal price
    pub take_profit: Price,
}

// =============================================================================
// Engine
// =============================================================================

/// Position-management decision core.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    guards: GuardChain,
    session: SessionRules,
}

impl Engine {
    /// Create an engine; fails if the configuration is invalid.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let guards = GuardChain::from_config(&config);
        let session = SessionRules {
            rollover_hour: config.rollover_hour,
            close_before_weekend_hours: config.close_before_weekend_hours,
        };
        Ok(Self {
            config,
            guards,
            session,
        })
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Positions on the instrument carrying the owner tag
    pub fn owned<'a>(&self, positions: &'a [Position]) -> Vec<&'a Position> {
        positions
            .iter()
            .filter(|p| p.is_owned_by(&self.config.owner_tag) && &p.symbol == self.config.symbol())
            .collect()
    }

    /// Session window currently forcing owned positions flat, if any
    pub fn forced_close_window(&self, snapshot: &MarketSnapshot) -> Option<SessionWindow> {
        self.session.forced_close(snapshot)
    }

    /// Close every owned position when a session deadline is near.
    pub fn forced_close(
        &self,
        snapshot: &MarketSnapshot,
        positions: &[Position],
    ) -> Vec<EngineAction> {
        let Some(window) = self.forced_close_window(snapshot) else {
            return Vec::new();
        };

        self.owned(positions)
            .into_iter()
            .map(|p| EngineAction::ClosePosition {
                position_id: p.id,
                reason: CloseReason::SessionEnd(window),
            })
            .collect()
    }

    /// Break-even and trailing moves for every owned position.
    pub fn protective(
        &self,
        snapshot: &MarketSnapshot,
        positions: &[Position],
    ) -> Vec<EngineAction> {
        let params = self.config.protective_params();

        self.owned(positions)
            .into_iter()
            .flat_map(|p| {
                adjust_stop(p.side, p.entry_price.as_decimal(), p.stop_loss, snapshot, &params)
                    .into_iter()
                    .map(move |adjustment| EngineAction::ModifyStopLoss {
                        position_id: p.id,
                        adjustment,
                    })
            })
            .collect()
    }

    /// Close owned positions facing away from `side`.
    pub fn close_opposite(&self, side: Side, positions: &[Position]) -> Vec<EngineAction> {
        self.owned(positions)
            .into_iter()
            .filter(|p| p.side == side.opposite())
            .map(|p| EngineAction::ClosePosition {
                position_id: p.id,
                reason: CloseReason::OppositeSignal,
            })
            .collect()
    }

    /// Close owned positions currently in profit.
    pub fn close_profitable(
        &self,
        snapshot: &MarketSnapshot,
        positions: &[Position],
    ) -> Vec<EngineAction> {
        self.owned(positions)
            .into_iter()
            .filter(|p| p.is_profitable(snapshot))
            .map(|p| EngineAction::ClosePosition {
                position_id: p.id,
                reason: CloseReason::TakeProfitNow,
            })
            .collect()
    }

    /// Run the guard chain
    pub fn may_open(&self, ctx: &GuardContext<'_>, side: Side) -> GuardResult {
        self.guards.may_open(ctx, side)
    }

    /// Whether sizing needs the account balance
    pub fn needs_balance(&self) -> bool {
        self.config.use_dynamic_lot
    }

    /// Volume for the next order. `balance` is ignored with fixed sizing.
    pub fn size(&self, balance: Decimal) -> EngineResult<Sizing> {
        let sizing = if self.config.use_dynamic_lot {
            compute_volume(
                balance,
                self.config.risk_percent,
                self.config.stop_loss_pips,
                self.config.instrument.pip_value,
                self.config.min_lot,
            )?
        } else {
            fixed_volume(self.config.fixed_lot)?
        };
        Ok(sizing)
    }

    /// Absolute stop and target for an open on `side` at `price`.
    ///
    /// ```text
    /// Long:  stop = price - sl × pip, target = price + tp × pip
    /// Short: stop = price + sl × pip, target = price - tp × pip
    /// ```
    pub fn protective_levels(&self, side: Side, price: Decimal) -> EngineResult<(Price, Price)> {
        let pip = self.config.instrument.pip_size;
        let sl = self.config.stop_loss_pips * pip;
        let tp = self.config.take_profit_pips * pip;

        let (stop, target) = match side {
            Side::Long => (price - sl, price + tp),
            Side::Short => (price + sl, price - tp),
        };

        Ok((Price::new(stop)?, Price::new(target)?))
    }

    /// Decide an open on `side` at the signal `price`.
    ///
    /// Guards run against `ctx`, which must reflect the book after any
    /// opposite-side closes. A denial is a normal outcome, not an error;
    /// sizing or level failures are errors that abort only this attempt.
    pub fn decide_entry(
        &self,
        side: Side,
        price: Decimal,
        ctx: &GuardContext<'_>,
        balance: Decimal,
    ) -> EngineResult<EntryDecision> {
        if let GuardResult::Denied(reason) = self.may_open(ctx, side) {
            debug!(%side, %reason, "Open denied");
            return Ok(EntryDecision::Denied(reason));
        }

        let (stop_loss, take_profit) = self.protective_levels(side, price)?;
        let sizing = self.size(balance)?;

        let pip = self.config.instrument.pip_size;
        let order = OrderRequest {
            symbol: self.config.symbol().clone(),
            side,
            volume: sizing.lots,
            owner_tag: self.config.owner_tag.clone(),
            stop_loss_pips: ((price - stop_loss.as_decimal()).abs() / pip)
                .round_dp(ORDER_PIPS_DECIMALS),
            take_profit_pips: ((take_profit.as_decimal() - price).abs() / pip)
                .round_dp(ORDER_PIPS_DECIMALS),
        };

        Ok(EntryDecision::Submit(EntryPlan {
            order,
            sizing,
            stop_loss,
            take_profit,
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================
