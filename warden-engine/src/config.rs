//! Engine configuration.
//!
//! All knobs are supplied once at startup and never re-read mid-run.
//! `validate` fails fast on anything out of bounds; nothing is clamped.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use warden_domain::{Instrument, OwnerTag, ProtectiveParams, Symbol};

use crate::error::{EngineError, EngineResult};

/// Upper bound for `max_open_positions`
pub const MAX_OPEN_POSITIONS_LIMIT: u32 = 10;

/// Latest accepted `close_before_weekend_hours`
pub const MAX_WEEKEND_HOURS: u32 = 24;

/// Position-management configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Instrument the engine trades
    pub instrument: Instrument,
    /// Tag stamped on every order the engine submits
    pub owner_tag: OwnerTag,

    // Money management
    /// Smallest lot count the engine will submit
    pub min_lot: Decimal,
    /// Lot count used when dynamic sizing is off
    pub fixed_lot: Decimal,
    /// Size from balance and risk percent instead of `fixed_lot`
    pub use_dynamic_lot: bool,
    /// Balance percentage risked per trade, in (0, 100]
    pub risk_percent: Decimal,

    // Stops and targets (pips)
    /// Concurrent positions allowed on the instrument, in [1, 10]
    pub max_open_positions: u32,
    /// Initial stop distance
    pub stop_loss_pips: Decimal,
    /// Target distance
    pub take_profit_pips: Decimal,
    /// Trailing distance once past break-even
    pub trailing_stop_pips: Decimal,
    /// Favorable move that arms break-even
    pub break_even_trigger_pips: Decimal,
    /// Profit locked in at break-even
    pub break_even_margin_pips: Decimal,

    // Risk and session
    /// Realized loss (account currency) that halts the engine
    pub max_loss: Decimal,
    /// Widest spread (pips) at which opens are allowed
    pub max_spread_pips: Decimal,
    /// Daily rollover hour, UTC, in [0, 23]
    pub rollover_hour: u32,
    /// Hours before the Friday session close to go flat; 0 disables
    pub close_before_weekend_hours: u32,
}

impl EngineConfig {
    /// Validate every knob.
    ///
    /// # Errors
    /// Returns `EngineError::Validation` naming the first offending knob.
    pub fn validate(&self) -> EngineResult<()> {
        if self.stop_loss_pips <= Decimal::ZERO || self.take_profit_pips <= Decimal::ZERO {
            return Err(invalid("Stop loss and take profit must be greater than 0"));
        }

        if self.max_open_positions == 0 {
            return Err(invalid("The maximum number of open positions must be greater than 0"));
        }

        if self.max_open_positions > MAX_OPEN_POSITIONS_LIMIT {
            return Err(invalid(format!(
                "The maximum number of open positions cannot exceed {}",
                MAX_OPEN_POSITIONS_LIMIT
            )));
        }

        if self.risk_percent <= Decimal::ZERO || self.risk_percent > Decimal::ONE_HUNDRED {
            return Err(invalid("Risk percent must be between 0 (exclusive) and 100"));
        }

        if self.min_lot <= Decimal::ZERO || self.fixed_lot <= Decimal::ZERO {
            return Err(invalid("Min lot and fixed lot must be greater than 0"));
        }

        if self.trailing_stop_pips <= Decimal::ZERO
            || self.break_even_trigger_pips <= Decimal::ZERO
        {
            return Err(invalid("Trailing stop and break-even trigger must be greater than 0"));
        }

        if self.break_even_margin_pips < Decimal::ZERO {
            return Err(invalid("Break-even margin cannot be negative"));
        }

        if self.max_loss < Decimal::ZERO {
            return Err(invalid("Total loss cannot be negative"));
        }

        if self.max_spread_pips < Decimal::ZERO {
            return Err(invalid("Max allowed spread cannot be negative"));
        }

        if self.rollover_hour > 23 {
            return Err(invalid(format!(
                "Rollover hour must be in 0..=23, got {}",
                self.rollover_hour
            )));
        }

        if self.close_before_weekend_hours > MAX_WEEKEND_HOURS {
            return Err(invalid(format!(
                "Close-before-weekend hours cannot exceed {}",
                MAX_WEEKEND_HOURS
            )));
        }

        Ok(())
    }

    /// Traded instrument name
    pub fn symbol(&self) -> &Symbol {
        &self.instrument.symbol
    }

    /// Break-even and trailing distances
    pub fn protective_params(&self) -> ProtectiveParams {
        ProtectiveParams {
            break_even_trigger_pips: self.break_even_trigger_pips,
            break_even_margin_pips: self.break_even_margin_pips,
            trailing_stop_pips: self.trailing_stop_pips,
        }
    }

    /// Defaults for `instrument` (the reference bot's parameter defaults).
    pub fn with_instrument(instrument: Instrument, owner_tag: OwnerTag) -> Self {
        Self {
            instrument,
            owner_tag,
            min_lot: dec!(1),
            fixed_lot: dec!(1),
            use_dynamic_lot: true,
            risk_percent: dec!(1.8),
            max_open_positions: 4,
            stop_loss_pips: dec!(9),
            take_profit_pips: dec!(26),
            trailing_stop_pips: dec!(12),
            break_even_trigger_pips: dec!(7),
            break_even_margin_pips: dec!(1),
            max_loss: dec!(200),
            max_spread_pips: dec!(0.4),
            rollover_hour: 20,
            close_before_weekend_hours: 1,
        }
    }
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::Validation(message.into())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        let instrument = Instrument::new(
            Symbol::new("EURUSD").unwrap(),
            dec!(0.0001),
            dec!(10),
            dec!(100000),
        )
        .unwrap();
        EngineConfig::with_instrument(instrument, OwnerTag::new("Warden").unwrap())
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_stop_or_target() {
        let mut cfg = config();
        cfg.stop_loss_pips = dec!(0);
        assert!(matches!(cfg.validate(), Err(EngineError::Validation(_))));

        let mut cfg = config();
        cfg.take_profit_pips = dec!(-1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_position_limit_out_of_range() {
        let mut cfg = config();
        cfg.max_open_positions = 0;
        assert!(cfg.validate().is_err());

        cfg.max_open_positions = 11;
        assert!(cfg.validate().is_err());

        cfg.max_open_positions = 10;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_risk_percent_bounds() {
        let mut cfg = config();
        cfg.risk_percent = dec!(0);
        assert!(cfg.validate().is_err());

        cfg.risk_percent = dec!(100.01);
        assert!(cfg.validate().is_err());

        cfg.risk_percent = dec!(100);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rollover_hour_bounds() {
        let mut cfg = config();
        cfg.rollover_hour = 24;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Rollover hour"));

        cfg.rollover_hour = 0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_protective_params_mirror_config() {
        let params = config().protective_params();
        assert_eq!(params.break_even_trigger_pips, dec!(7));
        assert_eq!(params.break_even_margin_pips, dec!(1));
        assert_eq!(params.trailing_stop_pips, dec!(12));
    }
}
