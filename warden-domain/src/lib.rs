//! Warden Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains value objects, broker-reported entities, market views,
//! position sizing and protective-stop rules.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
#[allow(missing_docs)]
pub mod entities;
pub mod market_data;
pub mod protective;
pub mod sizing;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{last_closed, ClosedTrade, ExitReason, OrderRequest, Position, PositionId};
pub use market_data::{BarClose, Instrument, MarketSnapshot};
pub use protective::{adjust_stop, ProtectiveParams, StopAdjustment, StopAdjustmentKind};
pub use sizing::{compute_volume, fixed_volume, Sizing};
pub use value_objects::{DomainError, Lots, OrderSide, OwnerTag, Price, Side, Symbol};
