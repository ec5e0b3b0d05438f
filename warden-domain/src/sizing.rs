//! Position Sizing
//!
//! Converts a risk budget into a lot count.
//!
//! ```text
//! risk_amount = balance × risk% / 100
//! lots        = round(risk_amount / (stop_loss_pips × pip_value), 2)
//! ```
//!
//! A wide stop yields a small position and a tight stop a large one; the
//! amount at risk stays at the configured percentage. Results below the
//! broker minimum are lifted to the minimum and flagged, never rejected.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::value_objects::{DomainError, Lots};

/// Decimal places lot counts are rounded to
pub const LOT_DECIMALS: u32 = 2;

/// Outcome of a sizing computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    /// Lots to trade
    pub lots: Lots,
    /// Lot count produced by the risk formula before clamping
    pub computed: Decimal,
    /// True when `computed` fell below the minimum and `lots` was lifted to it
    pub clamped_to_min: bool,
}

/// Compute the order volume for a risk budget.
///
/// # Example
///
/// ```
/// # use warden_domain::sizing::compute_volume;
/// # use rust_decimal_macros::dec;
/// let sizing = compute_volume(dec!(10000), dec!(1.8), dec!(9), dec!(10), dec!(0.01)).unwrap();
///
/// // Risk = $10,000 × 1.8% = $180
/// // Per-lot risk = 9 pips × $10 = $90
/// // Lots = 180 / 90 = 2.00
/// assert_eq!(sizing.lots.as_decimal(), dec!(2.00));
/// assert!(!sizing.clamped_to_min);
/// ```
///
/// # Errors
///
/// Returns `DomainError::InvalidRiskInput` if `stop_loss_pips`, `pip_value`
/// or `min_lot` is not positive.
pub fn compute_volume(
    balance: Decimal,
    risk_percent: Decimal,
    stop_loss_pips: Decimal,
    pip_value: Decimal,
    min_lot: Decimal,
) -> Result<Sizing, DomainError> {
    if stop_loss_pips <= Decimal::ZERO || pip_value <= Decimal::ZERO || min_lot <= Decimal::ZERO {
        return Err(DomainError::InvalidRiskInput(format!(
            "stop_loss_pips={}, pip_value={}, min_lot={} must all be positive",
            stop_loss_pips, pip_value, min_lot
        )));
    }

    let risk_amount = balance * risk_percent / Decimal::from(100);
    let computed = (risk_amount / (stop_loss_pips * pip_value))
        .round_dp_with_strategy(LOT_DECIMALS, RoundingStrategy::MidpointNearestEven);

    let (lots, clamped_to_min) = if computed < min_lot {
        (min_lot, true)
    } else {
        (computed, false)
    };

    Ok(Sizing {
        lots: Lots::new(lots)?,
        computed,
        clamped_to_min,
    })
}

/// Fixed-lot sizing: the configured lot size, unmodified.
///
/// # Errors
///
/// Returns `DomainError::InvalidLots` if the configured size is not positive.
pub fn fixed_volume(lot_size: Decimal) -> Result<Sizing, DomainError> {
    Ok(Sizing {
        lots: Lots::new(lot_size)?,
        computed: lot_size,
        clamped_to_min: false,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_risk_amount_divided_by_stop_value() {
        let sizing = compute_volume(dec!(10000), dec!(1.8), dec!(9), dec!(10), dec!(0.01)).unwrap();
        assert_eq!(sizing.lots.as_decimal(), dec!(2));
        assert_eq!(sizing.computed, dec!(2));
        assert!(!sizing.clamped_to_min);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        // 10000 × 1% = 100; 100 / (15 × 10) = 0.6666…
        let sizing = compute_volume(dec!(10000), dec!(1), dec!(15), dec!(10), dec!(0.01)).unwrap();
        assert_eq!(sizing.lots.as_decimal(), dec!(0.67));
    }

    #[test]
    fn test_midpoint_rounds_to_even() {
        // 100 × 1% = 1; 1 / (1 × 8) = 0.125 → 0.12
        let sizing = compute_volume(dec!(100), dec!(1), dec!(1), dec!(8), dec!(0.01)).unwrap();
        assert_eq!(sizing.lots.as_decimal(), dec!(0.12));
    }

    #[test]
    fn test_clamps_to_min_lot() {
        // 1000 × 0.1% = 1; 1 / (9 × 10) = 0.011 → 0.01 < 1
        let sizing = compute_volume(dec!(1000), dec!(0.1), dec!(9), dec!(10), dec!(1)).unwrap();
        assert_eq!(sizing.lots.as_decimal(), dec!(1));
        assert_eq!(sizing.computed, dec!(0.01));
        assert!(sizing.clamped_to_min);
    }

    #[test]
    fn test_negative_balance_still_trades_min_lot() {
        let sizing = compute_volume(dec!(-500), dec!(1), dec!(9), dec!(10), dec!(0.01)).unwrap();
        assert_eq!(sizing.lots.as_decimal(), dec!(0.01));
        assert!(sizing.clamped_to_min);
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        for (sl, pv, min) in [
            (dec!(0), dec!(10), dec!(0.01)),
            (dec!(-9), dec!(10), dec!(0.01)),
            (dec!(9), dec!(0), dec!(0.01)),
            (dec!(9), dec!(10), dec!(0)),
        ] {
            let err = compute_volume(dec!(10000), dec!(1), sl, pv, min).unwrap_err();
            assert!(matches!(err, DomainError::InvalidRiskInput(_)));
        }
    }

    #[test]
    fn test_never_below_min_and_exact_above_it() {
        let min_lot = dec!(0.5);
        for balance in [dec!(100), dec!(2500), dec!(10000), dec!(250000)] {
            for risk in [dec!(0.1), dec!(1), dec!(1.8), dec!(5)] {
                for sl in [dec!(1), dec!(9), dec!(40)] {
                    let sizing = compute_volume(balance, risk, sl, dec!(10), min_lot).unwrap();
                    let expected = (balance * risk / dec!(100) / (sl * dec!(10))).round_dp(2);

                    assert!(sizing.lots.as_decimal() >= min_lot);
                    if expected >= min_lot {
                        assert_eq!(sizing.lots.as_decimal(), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_fixed_volume_is_unmodified() {
        let sizing = fixed_volume(dec!(0.37)).unwrap();
        assert_eq!(sizing.lots.as_decimal(), dec!(0.37));
        assert!(fixed_volume(dec!(0)).is_err());
    }
}
