//! Warden Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes the broker's view of the book → returns actions to execute.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod guards;
pub mod risk;
pub mod session;
pub mod signal;

pub use config::EngineConfig;
pub use engine::{CloseReason, Engine, EngineAction, EntryDecision, EntryPlan};
pub use error::{EngineError, EngineResult};
pub use guards::{DenyReason, GuardChain, GuardContext, GuardResult, DEFICIT_LIMIT_PIPS};
pub use risk::{RiskCeilingMonitor, RiskState, RiskStatus};
pub use session::{SessionRules, SessionWindow};
pub use signal::{EntrySignal, Momentum, SignalFilter, SignalSet};
