//! Paper broker for tests and replays.
//!
//! Fills market orders at the last observed quote, holds positions in
//! memory and settles them when a quote crosses their stop or target.

use rust_decimal::Decimal;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use tracing::{debug, info};
use uuid::Uuid;

use warden_domain::{
    ClosedTrade, ExitReason, Instrument, Lots, MarketSnapshot, OrderRequest, OwnerTag, Position,
    PositionId, Price, Side, Symbol,
};

use crate::error::{BrokerError, BrokerResult};
use crate::ports::BrokerPort;

// =============================================================================
// Call log
// =============================================================================

/// A mutating call received by the stub, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    /// `submit_market_order`
    SubmitMarketOrder {
        /// Requested side
        side: Side,
        /// Requested lots
        lots: Decimal,
        /// Lots converted to order units
        units: Decimal,
    },
    /// `modify_stop_loss`
    ModifyStopLoss {
        /// Target position
        position_id: PositionId,
        /// Requested stop
        stop_loss: Decimal,
    },
    /// `close_position`
    ClosePosition {
        /// Target position
        position_id: PositionId,
    },
}

// =============================================================================
// Stub Broker
// =============================================================================

#[derive(Debug)]
struct Book {
    positions: Vec<Position>,
    history: Vec<ClosedTrade>,
    balance: Decimal,
    quote: Option<MarketSnapshot>,
    calls: Vec<BrokerCall>,
    fail_next: bool,
}

impl Book {
    /// Whether to fail this call; resets the flag
    fn should_fail(&mut self) -> bool {
        std::mem::take(&mut self.fail_next)
    }

    fn quote(&self) -> BrokerResult<&MarketSnapshot> {
        self.quote
            .as_ref()
            .ok_or_else(|| BrokerError::Unavailable("No quote received yet".to_string()))
    }
}

/// In-memory broker.
///
/// Net profit of a closed position is `pips × pip_value × lots`, rounded to
/// cents. No commission or swap is charged.
#[derive(Debug)]
pub struct StubBroker {
    instrument: Instrument,
    book: RwLock<Book>,
}

impl StubBroker {
    /// Create a paper account on `instrument` with a starting balance.
    pub fn new(instrument: Instrument, balance: Decimal) -> Self {
        Self {
            instrument,
            book: RwLock::new(Book {
                positions: Vec::new(),
                history: Vec::new(),
                balance,
                quote: None,
                calls: Vec::new(),
                fail_next: false,
            }),
        }
    }

    fn book(&self) -> RwLockWriteGuard<'_, Book> {
        self.book.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configure the next mutating call to fail.
    pub fn set_fail_next(&self, fail: bool) {
        self.book().fail_next = fail;
    }

    /// Mutating calls received so far
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.book().calls.clone()
    }

    /// Place an existing position on the book (another strategy's, or one
    /// opened before startup).
    pub fn insert_position(&self, position: Position) {
        self.book().positions.push(position);
    }

    /// Add a trade to the closed history.
    pub fn insert_closed(&self, trade: ClosedTrade) {
        let mut book = self.book();
        book.balance += trade.net_profit;
        book.history.push(trade);
    }

    /// Lots expressed in order units
    pub fn units(&self, lots: Lots) -> Decimal {
        lots.as_decimal() * self.instrument.lot_units
    }

    /// Record `snapshot` as the current quote and settle every position
    /// whose stop or target it crosses. Stops are checked first.
    pub fn mark_to_market(&self, snapshot: &MarketSnapshot) -> Vec<ClosedTrade> {
        let mut book = self.book();
        book.quote = Some(snapshot.clone());

        if snapshot.symbol != self.instrument.symbol {
            return Vec::new();
        }

        let (hit, open): (Vec<Position>, Vec<Position>) = std::mem::take(&mut book.positions)
            .into_iter()
            .partition(|p| exit_hit(p, snapshot).is_some());
        book.positions = open;

        let mut settled = Vec::with_capacity(hit.len());
        for position in hit {
            if let Some((price, reason)) = exit_hit(&position, snapshot) {
                let trade = self.settle(&mut book, &position, price, reason, snapshot);
                settled.push(trade);
            }
        }
        settled
    }

    /// Current balance
    pub fn balance(&self) -> Decimal {
        self.book().balance
    }

    fn settle(
        &self,
        book: &mut Book,
        position: &Position,
        exit: Decimal,
        reason: ExitReason,
        snapshot: &MarketSnapshot,
    ) -> ClosedTrade {
        let entry = position.entry_price.as_decimal();
        let pips = match position.side {
            Side::Long => exit - entry,
            Side::Short => entry - exit,
        } / self.instrument.pip_size;
        let net_profit =
            (pips * self.instrument.pip_value * position.volume.as_decimal()).round_dp(2);

        info!(
            position_id = %position.id,
            side = %position.side,
            %exit,
            %reason,
            %net_profit,
            "Stub: position settled"
        );

        let trade = ClosedTrade {
            position_id: position.id,
            symbol: position.symbol.clone(),
            owner_tag: position.owner_tag.clone(),
            side: position.side,
            net_profit,
            closed_at: snapshot.server_time,
            reason,
        };
        book.balance += net_profit;
        book.history.push(trade.clone());
        trade
    }
}

/// Exit price and reason if `snapshot` crosses the position's stop or target
fn exit_hit(position: &Position, snapshot: &MarketSnapshot) -> Option<(Decimal, ExitReason)> {
    let price = snapshot.exit_price(position.side);
    let stop = position.stop_decimal();
    let target = position.take_profit.map(|p| p.as_decimal());

    let (stop_hit, target_hit) = match position.side {
        Side::Long => (stop.filter(|s| price <= *s), target.filter(|t| price >= *t)),
        Side::Short => (stop.filter(|s| price >= *s), target.filter(|t| price <= *t)),
    };

    stop_hit
        .map(|s| (s, ExitReason::StopLoss))
        .or_else(|| target_hit.map(|t| (t, ExitReason::TakeProfit)))
}

impl BrokerPort for StubBroker {
    fn open_positions(&self, symbol: &Symbol) -> BrokerResult<Vec<Position>> {
        Ok(self
            .book()
            .positions
            .iter()
            .filter(|p| &p.symbol == symbol)
            .cloned()
            .collect())
    }

    fn closed_history(&self, tag: &OwnerTag, symbol: &Symbol) -> BrokerResult<Vec<ClosedTrade>> {
        Ok(self
            .book()
            .history
            .iter()
            .filter(|t| &t.owner_tag == tag && &t.symbol == symbol)
            .cloned()
            .collect())
    }

    fn owner_history(&self, tag: &OwnerTag) -> BrokerResult<Vec<ClosedTrade>> {
        Ok(self
            .book()
            .history
            .iter()
            .filter(|t| &t.owner_tag == tag)
            .cloned()
            .collect())
    }

    fn submit_market_order(&self, request: &OrderRequest) -> BrokerResult<PositionId> {
        let mut book = self.book();
        book.calls.push(BrokerCall::SubmitMarketOrder {
            side: request.side,
            lots: request.volume.as_decimal(),
            units: self.units(request.volume),
        });

        if book.should_fail() {
            return Err(BrokerError::Rejected("Simulated broker rejection".to_string()));
        }

        if request.symbol != self.instrument.symbol {
            return Err(BrokerError::Rejected(format!("Unknown symbol {}", request.symbol)));
        }

        let quote = book.quote()?;
        let fill = quote.entry_price(request.side);
        let opened_at = quote.server_time;
        let pip = self.instrument.pip_size;

        let (stop, target) = match request.side {
            Side::Long => (
                fill - request.stop_loss_pips * pip,
                fill + request.take_profit_pips * pip,
            ),
            Side::Short => (
                fill + request.stop_loss_pips * pip,
                fill - request.take_profit_pips * pip,
            ),
        };

        let position = Position {
            id: Uuid::now_v7(),
            symbol: request.symbol.clone(),
            owner_tag: request.owner_tag.clone(),
            side: request.side,
            entry_price: Price::new(fill)?,
            stop_loss: Some(Price::new(stop)?),
            take_profit: Some(Price::new(target)?),
            volume: request.volume,
            opened_at,
        };

        debug!(position_id = %position.id, %fill, "Stub: order filled");
        let id = position.id;
        book.positions.push(position);
        Ok(id)
    }

    fn modify_stop_loss(&self, position_id: PositionId, stop_loss: Price) -> BrokerResult<()> {
        let mut book = self.book();
        book.calls.push(BrokerCall::ModifyStopLoss {
            position_id,
            stop_loss: stop_loss.as_decimal(),
        });

        if book.should_fail() {
            return Err(BrokerError::Rejected("Simulated modify failure".to_string()));
        }

        let position = book
            .positions
            .iter_mut()
            .find(|p| p.id == position_id)
            .ok_or(BrokerError::PositionNotFound(position_id))?;
        position.stop_loss = Some(stop_loss);
        Ok(())
    }

    fn close_position(&self, position_id: PositionId) -> BrokerResult<()> {
        let mut book = self.book();
        book.calls.push(BrokerCall::ClosePosition { position_id });

        if book.should_fail() {
            return Err(BrokerError::Rejected("Simulated close failure".to_string()));
        }

        let quote = book.quote()?.clone();
        let index = book
            .positions
            .iter()
            .position(|p| p.id == position_id)
            .ok_or(BrokerError::PositionNotFound(position_id))?;
        let position = book.positions.remove(index);

        let exit = quote.exit_price(position.side);
        self.settle(&mut book, &position, exit, ExitReason::Manual, &quote);
        Ok(())
    }

    fn account_balance(&self) -> BrokerResult<Decimal> {
        Ok(self.balance())
    }

    fn observe_quote(&self, snapshot: &MarketSnapshot) {
        self.mark_to_market(snapshot);
    }
}

// =============================================================================
// Tests
// =============================================================================
