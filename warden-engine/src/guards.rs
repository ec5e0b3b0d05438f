//! Open guards
//!
//! Ordered checks that may veto a new position. Evaluation stops at the
//! first denial; the denial carries enough detail for the log line.
//!
//! Order:
//! 1. position count (all positions on the instrument, any owner)
//! 2. one trade per bar (owned history)
//! 3. spread
//! 4. session windows
//! 5. same-side deficit (owned positions)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;

use warden_domain::{last_closed, ClosedTrade, MarketSnapshot, OwnerTag, Position, Side, Symbol};

use crate::config::EngineConfig;
use crate::session::{SessionRules, SessionWindow};

/// An owned same-side position this many pips under water blocks new opens
pub const DEFICIT_LIMIT_PIPS: Decimal = dec!(5);

/// Outcome of running the guard chain
#[derive(Debug, Clone, PartialEq)]
pub enum GuardResult {
    /// Every guard passed
    Allowed,
    /// The first guard that refused
    Denied(DenyReason),
}

impl GuardResult {
    /// Whether an open may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardResult::Allowed)
    }
}

/// Why an open was refused
#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    /// Instrument already carries the maximum number of positions
    TooManyPositions {
        /// Positions currently open on the instrument
        open: usize,
        /// Configured limit
        max: u32,
    },
    /// An owned position already closed during the current bar
    AlreadyTradedThisBar {
        /// Side of the closed position
        side: Side,
        /// Its realized result
        net_profit: Decimal,
        /// When it closed
        closed_at: DateTime<Utc>,
    },
    /// Quoted spread wider than allowed
    SpreadTooWide {
        /// Current spread in pips
        spread_pips: Decimal,
        /// Configured maximum
        max_pips: Decimal,
    },
    /// Inside a session window
    SessionWindow(SessionWindow),
    /// An owned position on the same side is losing
    SameSideDeficit {
        /// Side of the losing position
        side: Side,
        /// How far under water it is
        deficit_pips: Decimal,
    },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::TooManyPositions { open, max } => {
                write!(f, "Maximum open positions reached ({}/{})", open, max)
            }
            DenyReason::AlreadyTradedThisBar {
                side,
                net_profit,
                closed_at,
            } => write!(
                f,
                "A {} position already closed on this bar at {} with net profit {}",
                side, closed_at, net_profit
            ),
            DenyReason::SpreadTooWide {
                spread_pips,
                max_pips,
            } => write!(
                f,
                "Spread {} pips exceeds maximum allowed {} pips",
                spread_pips.round_dp(2),
                max_pips
            ),
            DenyReason::SessionWindow(window) => {
                write!(f, "Too close to {} to open positions", window)
            }
            DenyReason::SameSideDeficit { side, deficit_pips } => write!(
                f,
                "A {} position is already {} pips in deficit",
                side,
                deficit_pips.round_dp(1)
            ),
        }
    }
}

/// What the guards look at. Positions and history are the broker's view
/// at evaluation time.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    /// Current quote
    pub snapshot: &'a MarketSnapshot,
    /// Every open position on the account, any owner
    pub positions: &'a [Position],
    /// Closed positions history
    pub history: &'a [ClosedTrade],
    /// Open time of the bar being traded
    pub current_bar_open: DateTime<Utc>,
}

/// The ordered guard sequence, built once from configuration.
#[derive(Debug, Clone)]
pub struct GuardChain {
    symbol: Symbol,
    owner_tag: OwnerTag,
    max_open_positions: u32,
    max_spread_pips: Decimal,
    session: SessionRules,
}

impl GuardChain {
    /// Build the chain from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            symbol: config.symbol().clone(),
            owner_tag: config.owner_tag.clone(),
            max_open_positions: config.max_open_positions,
            max_spread_pips: config.max_spread_pips,
            session: SessionRules {
                rollover_hour: config.rollover_hour,
                close_before_weekend_hours: config.close_before_weekend_hours,
            },
        }
    }

    /// Run every guard for an open on `side`.
    pub fn may_open(&self, ctx: &GuardContext<'_>, side: Side) -> GuardResult {
        match self.evaluate(ctx, side) {
            Ok(()) => GuardResult::Allowed,
            Err(reason) => GuardResult::Denied(reason),
        }
    }

    fn evaluate(&self, ctx: &GuardContext<'_>, side: Side) -> Result<(), DenyReason> {
        self.check_position_count(ctx)?;
        self.check_bar(ctx)?;
        self.check_spread(ctx)?;
        self.check_session(ctx)?;
        self.check_deficit(ctx, side)
    }

    fn check_position_count(&self, ctx: &GuardContext<'_>) -> Result<(), DenyReason> {
        let open = ctx.positions.iter().filter(|p| p.symbol == self.symbol).count();
        if open >= self.max_open_positions as usize {
            return Err(DenyReason::TooManyPositions {
                open,
                max: self.max_open_positions,
            });
        }
        Ok(())
    }

    fn check_bar(&self, ctx: &GuardContext<'_>) -> Result<(), DenyReason> {
        match last_closed(ctx.history, &self.owner_tag, &self.symbol) {
            Some(trade) if trade.closed_at >= ctx.current_bar_open => {
                Err(DenyReason::AlreadyTradedThisBar {
                    side: trade.side,
                    net_profit: trade.net_profit,
                    closed_at: trade.closed_at,
                })
            }
            _ => Ok(()),
        }
    }

    fn check_spread(&self, ctx: &GuardContext<'_>) -> Result<(), DenyReason> {
        let spread_pips = ctx.snapshot.spread_pips();
        if spread_pips > self.max_spread_pips {
            return Err(DenyReason::SpreadTooWide {
                spread_pips,
                max_pips: self.max_spread_pips,
            });
        }
        Ok(())
    }

    fn check_session(&self, ctx: &GuardContext<'_>) -> Result<(), DenyReason> {
        match self.session.open_block(ctx.snapshot) {
            Some(window) => Err(DenyReason::SessionWindow(window)),
            None => Ok(()),
        }
    }

    fn check_deficit(&self, ctx: &GuardContext<'_>, side: Side) -> Result<(), DenyReason> {
        let losing = ctx
            .positions
            .iter()
            .filter(|p| {
                p.is_owned_by(&self.owner_tag) && p.symbol == self.symbol && p.side == side
            })
            .map(|p| p.deficit_pips(ctx.snapshot))
            .find(|deficit| *deficit >= DEFICIT_LIMIT_PIPS);

        match losing {
            Some(deficit_pips) => Err(DenyReason::SameSideDeficit { side, deficit_pips }),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;
    use warden_domain::{ExitReason, Instrument, Lots, Price};

    fn config() -> EngineConfig {
        let instrument = Instrument::new(
            Symbol::new("EURUSD").unwrap(),
            dec!(0.0001),
            dec!(10),
            dec!(100000),
        )
        .unwrap();
        let mut cfg = EngineConfig::with_instrument(instrument, OwnerTag::new("Warden").unwrap());
        cfg.max_open_positions = 2;
        cfg.max_spread_pips = dec!(0.4);
        cfg.rollover_hour = 20;
        cfg.close_before_weekend_hours = 0;
        cfg
    }

    fn bar_open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()
    }

    fn snapshot(bid: Decimal, ask: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: Symbol::new("EURUSD").unwrap(),
            bid,
            ask,
            pip_size: dec!(0.0001),
            server_time: bar_open() + Duration::minutes(1),
            time_till_close_secs: Some(8 * 60 * 60),
        }
    }

    fn position(owner: &str, side: Side, entry: Decimal) -> Position {
        Position {
            id: Uuid::now_v7(),
            symbol: Symbol::new("EURUSD").unwrap(),
            owner_tag: OwnerTag::new(owner).unwrap(),
            side,
            entry_price: Price::new(entry).unwrap(),
            stop_loss: None,
            take_profit: None,
            volume: Lots::new(dec!(1)).unwrap(),
            opened_at: bar_open() - Duration::hours(1),
        }
    }

    fn closed(owner: &str, closed_at: DateTime<Utc>) -> ClosedTrade {
        ClosedTrade {
            position_id: Uuid::now_v7(),
            symbol: Symbol::new("EURUSD").unwrap(),
            owner_tag: OwnerTag::new(owner).unwrap(),
            side: Side::Short,
            net_profit: dec!(-9),
            closed_at,
            reason: ExitReason::StopLoss,
        }
    }

    fn run(
        chain: &GuardChain,
        snap: &MarketSnapshot,
        positions: &[Position],
        history: &[ClosedTrade],
        side: Side,
    ) -> GuardResult {
        let ctx = GuardContext {
            snapshot: snap,
            positions,
            history,
            current_bar_open: bar_open(),
        };
        chain.may_open(&ctx, side)
    }

    #[test]
    fn test_clean_book_is_allowed() {
        let chain = GuardChain::from_config(&config());
        let snap = snapshot(dec!(1.1000), dec!(1.1000));
        assert!(run(&chain, &snap, &[], &[], Side::Long).is_allowed());
    }

    #[test]
    fn test_position_count_includes_foreign_positions() {
        let chain = GuardChain::from_config(&config());
        let snap = snapshot(dec!(1.1000), dec!(1.1000));
        let positions = vec![
            position("Warden", Side::Long, dec!(1.1000)),
            position("Manual", Side::Short, dec!(1.1000)),
        ];

        let result = run(&chain, &snap, &positions, &[], Side::Long);
        assert_eq!(
            result,
            GuardResult::Denied(DenyReason::TooManyPositions { open: 2, max: 2 })
        );
    }

    #[test]
    fn test_closed_on_current_bar_blocks() {
        let chain = GuardChain::from_config(&config());
        let snap = snapshot(dec!(1.1000), dec!(1.1000));
        let history = vec![closed("Warden", bar_open() + Duration::seconds(30))];

        let result = run(&chain, &snap, &[], &history, Side::Long);
        assert!(matches!(
            result,
            GuardResult::Denied(DenyReason::AlreadyTradedThisBar { side: Side::Short, .. })
        ));
    }

    #[test]
    fn test_closed_on_previous_bar_or_by_other_owner_allows() {
        let chain = GuardChain::from_config(&config());
        let snap = snapshot(dec!(1.1000), dec!(1.1000));
        let history = vec![
            closed("Warden", bar_open() - Duration::seconds(1)),
            closed("Manual", bar_open() + Duration::seconds(10)),
        ];

        assert!(run(&chain, &snap, &[], &history, Side::Long).is_allowed());
    }

    #[test]
    fn test_wide_spread_blocks() {
        let chain = GuardChain::from_config(&config());
        let snap = snapshot(dec!(1.10000), dec!(1.10005));

        let result = run(&chain, &snap, &[], &[], Side::Short);
        assert_eq!(
            result,
            GuardResult::Denied(DenyReason::SpreadTooWide {
                spread_pips: dec!(0.5),
                max_pips: dec!(0.4),
            })
        );
    }

    #[test]
    fn test_rollover_window_blocks() {
        let chain = GuardChain::from_config(&config());
        let mut snap = snapshot(dec!(1.1000), dec!(1.1000));
        snap.server_time = Utc.with_ymd_and_hms(2024, 3, 5, 19, 45, 0).unwrap();

        let result = run(&chain, &snap, &[], &[], Side::Long);
        assert_eq!(
            result,
            GuardResult::Denied(DenyReason::SessionWindow(SessionWindow::Rollover))
        );
    }

    #[test]
    fn test_same_side_deficit_blocks_only_that_side() {
        let chain = GuardChain::from_config(&config());
        // long entered at 1.1000, bid 1.0994 → 6 pips under water
        let snap = snapshot(dec!(1.0994), dec!(1.0994));
        let positions = vec![position("Warden", Side::Long, dec!(1.1000))];

        let result = run(&chain, &snap, &positions, &[], Side::Long);
        assert_eq!(
            result,
            GuardResult::Denied(DenyReason::SameSideDeficit {
                side: Side::Long,
                deficit_pips: dec!(6),
            })
        );
        assert!(run(&chain, &snap, &positions, &[], Side::Short).is_allowed());
    }

    #[test]
    fn test_deficit_limit_is_inclusive() {
        let chain = GuardChain::from_config(&config());
        let positions = vec![position("Warden", Side::Long, dec!(1.1000))];

        // exactly 5 pips under water
        let at_limit = snapshot(dec!(1.0995), dec!(1.0995));
        assert_eq!(
            run(&chain, &at_limit, &positions, &[], Side::Long),
            GuardResult::Denied(DenyReason::SameSideDeficit {
                side: Side::Long,
                deficit_pips: dec!(5),
            })
        );

        // 4.9 pips
        let below = snapshot(dec!(1.09951), dec!(1.09951));
        assert!(run(&chain, &below, &positions, &[], Side::Long).is_allowed());
    }

    #[test]
    fn test_same_context_same_result() {
        let chain = GuardChain::from_config(&config());
        let positions = vec![position("Warden", Side::Short, dec!(1.1000))];
        let history = vec![closed("Warden", bar_open() - Duration::minutes(20))];

        let allowed = snapshot(dec!(1.1000), dec!(1.1000));
        let first = run(&chain, &allowed, &positions, &history, Side::Short);
        assert!(first.is_allowed());
        assert_eq!(run(&chain, &allowed, &positions, &history, Side::Short), first);

        let denied = snapshot(dec!(1.1006), dec!(1.1006));
        let ctx = GuardContext {
            snapshot: &denied,
            positions: &positions,
            history: &history,
            current_bar_open: bar_open(),
        };
        let first = chain.may_open(&ctx, Side::Short);
        assert!(!first.is_allowed());
        assert_eq!(chain.may_open(&ctx, Side::Short), first);
    }

    #[test]
    fn test_deficit_ignores_foreign_positions() {
        let chain = GuardChain::from_config(&config());
        let snap = snapshot(dec!(1.0990), dec!(1.0990));
        let positions = vec![position("Manual", Side::Long, dec!(1.1000))];

        assert!(run(&chain, &snap, &positions, &[], Side::Long).is_allowed());
    }

    #[test]
    fn test_first_denial_wins() {
        let chain = GuardChain::from_config(&config());
        // wide spread and full book: the count guard reports first
        let snap = snapshot(dec!(1.1000), dec!(1.1010));
        let positions = vec![
            position("Warden", Side::Long, dec!(1.1000)),
            position("Warden", Side::Long, dec!(1.1000)),
        ];

        let result = run(&chain, &snap, &positions, &[], Side::Long);
        assert!(matches!(
            result,
            GuardResult::Denied(DenyReason::TooManyPositions { .. })
        ));
    }

    #[test]
    fn test_deny_reason_messages() {
        let reason = DenyReason::SpreadTooWide {
            spread_pips: dec!(0.512),
            max_pips: dec!(0.4),
        };
        assert_eq!(reason.to_string(), "Spread 0.51 pips exceeds maximum allowed 0.4 pips");
    }
}
