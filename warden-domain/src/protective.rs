//! Protective Stop Logic (Pure Functions)
//!
//! Break-even and trailing-stop calculations. All functions are
//! deterministic and have no side effects.
//!
//! # Algorithm
//!
//! Per position, per tick, two adjustments run in order:
//!
//! 1. **Break-even**: once price has moved `trigger` pips in favor, the stop
//!    goes to `entry ± margin` (Short also clears the spread).
//! 2. **Trailing**: once price is beyond that break-even level, the stop
//!    follows price at `trailing` pips, never behind the break-even level.
//!
//! Key invariants:
//! - Stop is monotonic (never moves against the position)
//! - Trailing is gated against the stop left by break-even in the same tick,
//!   so it can supersede break-even but never regress it

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::market_data::MarketSnapshot;
use crate::value_objects::{Price, Side};

/// Pip distances driving both adjustments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveParams {
    /// Favorable move (pips) that arms break-even
    pub break_even_trigger_pips: Decimal,
    /// Profit (pips) locked in by the break-even stop
    pub break_even_margin_pips: Decimal,
    /// Distance (pips) the trailing stop keeps from price
    pub trailing_stop_pips: Decimal,
}

/// Which rule produced an adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopAdjustmentKind {
    /// Stop moved to entry plus margin
    BreakEven,
    /// Stop following price
    Trailing,
}

impl fmt::Display for StopAdjustmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopAdjustmentKind::BreakEven => write!(f, "break-even"),
            StopAdjustmentKind::Trailing => write!(f, "trailing"),
        }
    }
}

/// A stop move decided for one position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopAdjustment {
    /// Rule that produced the move
    pub kind: StopAdjustmentKind,
    /// Stop before the move
    pub previous_stop: Option<Price>,
    /// Stop after the move
    pub new_stop: Price,
}

/// Break-even level for a position.
///
/// ```text
/// Long:  entry + margin × pip
/// Short: entry - margin × pip - spread
/// ```
pub fn break_even_level(
    side: Side,
    entry: Decimal,
    snapshot: &MarketSnapshot,
    params: &ProtectiveParams,
) -> Decimal {
    let margin = params.break_even_margin_pips * snapshot.pip_size;
    match side {
        Side::Long => entry + margin,
        Side::Short => entry - margin - snapshot.spread_price(),
    }
}

/// Break-even candidate, if the trigger distance has been reached.
///
/// # Examples
///
/// ```
/// # use warden_domain::protective::{break_even_candidate, ProtectiveParams};
/// # use warden_domain::market_data::MarketSnapshot;
/// # use warden_domain::value_objects::{Side, Symbol};
/// # use rust_decimal_macros::dec;
/// # use chrono::Utc;
/// let params = ProtectiveParams {
///     break_even_trigger_pips: dec!(7),
///     break_even_margin_pips: dec!(1),
///     trailing_stop_pips: dec!(12),
/// };
/// let snapshot = MarketSnapshot {
///     symbol: Symbol::new("EURUSD").unwrap(),
///     bid: dec!(1.1010),
///     ask: dec!(1.1011),
///     pip_size: dec!(0.0001),
///     server_time: Utc::now(),
///     time_till_close_secs: None,
/// };
///
/// // 10 pips in favor ≥ 7 pip trigger: stop to entry + 1 pip
/// let candidate = break_even_candidate(Side::Long, dec!(1.1000), &snapshot, &params);
/// assert_eq!(candidate, Some(dec!(1.1001)));
/// ```
pub fn break_even_candidate(
    side: Side,
    entry: Decimal,
    snapshot: &MarketSnapshot,
    params: &ProtectiveParams,
) -> Option<Decimal> {
    let distance = match side {
        Side::Long => snapshot.bid - entry,
        Side::Short => entry - snapshot.ask,
    };

    if distance >= params.break_even_trigger_pips * snapshot.pip_size {
        Some(break_even_level(side, entry, snapshot, params))
    } else {
        None
    }
}

/// Trailing candidate and the break-even floor it must stay beyond.
///
/// Returns `None` until price has crossed the break-even level.
pub fn trailing_candidate(
    side: Side,
    entry: Decimal,
    snapshot: &MarketSnapshot,
    params: &ProtectiveParams,
) -> Option<(Decimal, Decimal)> {
    let current = snapshot.exit_price(side);
    let floor = break_even_level(side, entry, snapshot, params);
    let offset = params.trailing_stop_pips * snapshot.pip_size;

    match side {
        Side::Long if current > floor => Some((current - offset, floor)),
        Side::Short if current < floor => Some((current + offset, floor)),
        _ => None,
    }
}

/// Decide this tick's stop moves for one position.
///
/// Break-even is evaluated first; trailing is then gated against the stop
/// break-even left behind. Returns zero, one or two adjustments, each
/// strictly improving on the one before.
pub fn adjust_stop(
    side: Side,
    entry: Decimal,
    current_stop: Option<Price>,
    snapshot: &MarketSnapshot,
    params: &ProtectiveParams,
) -> Vec<StopAdjustment> {
    let mut adjustments = Vec::with_capacity(2);
    let mut stop = current_stop;

    if let Some(candidate) = break_even_candidate(side, entry, snapshot, params) {
        if side.improves_stop(candidate, stop.map(|p| p.as_decimal())) {
            let new_stop = Price::from(candidate);
            adjustments.push(StopAdjustment {
                kind: StopAdjustmentKind::BreakEven,
                previous_stop: stop,
                new_stop,
            });
            stop = Some(new_stop);
        }
    }

    if let Some((candidate, floor)) = trailing_candidate(side, entry, snapshot, params) {
        if side.improves_stop(candidate, stop.map(|p| p.as_decimal()))
            && side.improves_stop(candidate, Some(floor))
        {
            adjustments.push(StopAdjustment {
                kind: StopAdjustmentKind::Trailing,
                previous_stop: stop,
                new_stop: Price::from(candidate),
            });
        }
    }

    adjustments
}

// =============================================================================
// Tests
// =============================================================================
