//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Everything is read once at startup; the engine validates its knobs
//! before the daemon starts.

use crate::error::{DaemonError, DaemonResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use warden_domain::{Instrument, OwnerTag, Symbol};
use warden_engine::EngineConfig;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine configuration
    pub engine: EngineConfig,

    /// Replay feed and paper account
    pub replay: ReplayConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Replay feed and paper account configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// JSON-lines market data file; `None` waits for shutdown
    pub file: Option<PathBuf>,
    /// Paper account starting balance
    pub starting_balance: Decimal,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DaemonResult<Self> {
        let vars = Vars { lookup: &lookup };

        let environment = vars.environment()?;
        let engine = vars.engine_config()?;
        let replay = vars.replay_config()?;

        engine.validate()?;

        Ok(Self {
            engine,
            replay,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            environment: Environment::Test,
            ..Self::default()
        }
    }
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    fn environment(&self) -> DaemonResult<Environment> {
        let env_str = (self.lookup)("WARDEN_ENV").unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid WARDEN_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn engine_config(&self) -> DaemonResult<EngineConfig> {
        let symbol = (self.lookup)("WARDEN_SYMBOL").unwrap_or_else(|| "EURUSD".to_string());
        let symbol = Symbol::new(&symbol)?;

        let instrument = Instrument::new(
            symbol,
            self.decimal("WARDEN_PIP_SIZE", dec!(0.0001))?,
            self.decimal("WARDEN_PIP_VALUE", dec!(10))?,
            self.decimal("WARDEN_LOT_UNITS", dec!(100000))?,
        )?;

        let owner_tag = (self.lookup)("WARDEN_OWNER_TAG").unwrap_or_else(|| "Warden".to_string());
        let owner_tag = OwnerTag::new(&owner_tag)?;

        let defaults = EngineConfig::with_instrument(instrument, owner_tag);

        Ok(EngineConfig {
            min_lot: self.decimal("WARDEN_MIN_LOT", defaults.min_lot)?,
            fixed_lot: self.decimal("WARDEN_FIXED_LOT", defaults.fixed_lot)?,
            use_dynamic_lot: self.bool("WARDEN_USE_DYNAMIC_LOT", defaults.use_dynamic_lot)?,
            risk_percent: self.decimal("WARDEN_RISK_PERCENT", defaults.risk_percent)?,
            max_open_positions: self.u32("WARDEN_MAX_OPEN_POSITIONS", defaults.max_open_positions)?,
            stop_loss_pips: self.decimal("WARDEN_STOP_LOSS_PIPS", defaults.stop_loss_pips)?,
            take_profit_pips: self.decimal("WARDEN_TAKE_PROFIT_PIPS", defaults.take_profit_pips)?,
            trailing_stop_pips: self
                .decimal("WARDEN_TRAILING_STOP_PIPS", defaults.trailing_stop_pips)?,
            break_even_trigger_pips: self
                .decimal("WARDEN_BREAK_EVEN_TRIGGER_PIPS", defaults.break_even_trigger_pips)?,
            break_even_margin_pips: self
                .decimal("WARDEN_BREAK_EVEN_MARGIN_PIPS", defaults.break_even_margin_pips)?,
            max_loss: self.decimal("WARDEN_MAX_LOSS", defaults.max_loss)?,
            max_spread_pips: self.decimal("WARDEN_MAX_SPREAD_PIPS", defaults.max_spread_pips)?,
            rollover_hour: self.u32("WARDEN_ROLLOVER_HOUR", defaults.rollover_hour)?,
            close_before_weekend_hours: self
                .u32("WARDEN_CLOSE_BEFORE_WEEKEND_HOURS", defaults.close_before_weekend_hours)?,
            ..defaults
        })
    }

    fn replay_config(&self) -> DaemonResult<ReplayConfig> {
        Ok(ReplayConfig {
            file: (self.lookup)("WARDEN_REPLAY_FILE")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            starting_balance: self.decimal("WARDEN_STARTING_BALANCE", dec!(10000))?,
        })
    }

    fn decimal(&self, key: &str, default: Decimal) -> DaemonResult<Decimal> {
        match (self.lookup)(key) {
            Some(val) => Decimal::from_str(val.trim())
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn u32(&self, key: &str, default: u32) -> DaemonResult<u32> {
        match (self.lookup)(key) {
            Some(val) => val
                .trim()
                .parse::<u32>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn bool(&self, key: &str, default: bool) -> DaemonResult<bool> {
        match (self.lookup)(key).map(|v| v.trim().to_lowercase()) {
            Some(val) => match val.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            },
            None => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let instrument = Instrument {
            symbol: Symbol::new("EURUSD").expect("EURUSD is a valid symbol"),
            pip_size: dec!(0.0001),
            pip_value: dec!(10),
            lot_units: dec!(100000),
        };
        let owner_tag = OwnerTag::new("Warden").expect("Warden is a valid owner tag");

        Self {
            engine: EngineConfig::with_instrument(instrument, owner_tag),
            replay: ReplayConfig {
                file: None,
                starting_balance: dec!(10000),
            },
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
