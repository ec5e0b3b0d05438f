//! Broker port definition.
//!
//! The engine never caches broker state: positions, history and balance are
//! queried on demand. Mutating calls are fire-and-forget; their effect is
//! observed on a later event.
//!
//! Implementations:
//! - `StubBroker` - paper broker for tests and replays

use rust_decimal::Decimal;

use warden_domain::{
    ClosedTrade, MarketSnapshot, OrderRequest, OwnerTag, Position, PositionId, Price, Symbol,
};

use crate::error::BrokerResult;

/// Port for account and order operations.
pub trait BrokerPort: Send + Sync {
    /// Every open position on `symbol`, any owner.
    fn open_positions(&self, symbol: &Symbol) -> BrokerResult<Vec<Position>>;

    /// Closed positions for `tag` on `symbol`.
    fn closed_history(&self, tag: &OwnerTag, symbol: &Symbol) -> BrokerResult<Vec<ClosedTrade>>;

    /// Closed positions for `tag` on every symbol.
    fn owner_history(&self, tag: &OwnerTag) -> BrokerResult<Vec<ClosedTrade>>;

    /// Open a position at market.
    ///
    /// Stop and target travel as pip distances from the fill.
    fn submit_market_order(&self, request: &OrderRequest) -> BrokerResult<PositionId>;

    /// Move the stop of an open position.
    fn modify_stop_loss(&self, position_id: PositionId, stop_loss: Price) -> BrokerResult<()>;

    /// Close an open position at market.
    fn close_position(&self, position_id: PositionId) -> BrokerResult<()>;

    /// Current account balance in account currency.
    fn account_balance(&self) -> BrokerResult<Decimal>;

    /// Quote notification, delivered before the engine handles each tick.
    ///
    /// Live brokers fill and stop out on their own; simulated brokers use
    /// this to mark positions to market.
    fn observe_quote(&self, _snapshot: &MarketSnapshot) {}
}
