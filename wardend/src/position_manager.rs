//! Position Manager: runs the engine against a broker, one event at a time.
//!
//! The Position Manager is responsible for:
//! - Tick cycle: session closes, then break-even and trailing moves
//! - Bar-close cycle: loss ceiling check, then signal-driven opens
//! - Halting and self-termination once the loss ceiling is hit
//!
//! # Architecture
//!
//! ```text
//! EventBus (ticks, bar closes) → PositionManager → Engine → Executor → Broker
//!                                      ↓
//!                            RiskCeilingMonitor, Reporter
//! ```
//!
//! All broker state (positions, history, balance) is re-read on every use.

use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use warden_domain::{BarClose, MarketSnapshot, PositionId, Side};
use warden_engine::{
    Engine, EngineAction, EntryDecision, EntrySignal, GuardContext, RiskCeilingMonitor, RiskState,
    RiskStatus,
};
use warden_exec::{ActionResult, BrokerPort, Executor, Reporter};

use crate::error::DaemonResult;

// =============================================================================
// Engine status
// =============================================================================

/// Lifecycle of one engine run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Trading normally
    Active,
    /// Loss ceiling reached; waiting for owned positions to close
    Halted,
    /// Halted and flat; the run is over
    Terminated,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Active => write!(f, "active"),
            EngineStatus::Halted => write!(f, "halted"),
            EngineStatus::Terminated => write!(f, "terminated"),
        }
    }
}

// =============================================================================
// Position Manager
// =============================================================================

/// Drives one engine instance.
pub struct PositionManager<B: BrokerPort> {
    /// Decision core
    engine: Engine,
    /// Broker, for queries
    broker: Arc<B>,
    /// Broker, for actions
    executor: Executor<B>,
    /// Realized-loss ceiling
    risk: RiskCeilingMonitor,
    /// Entry signal evaluated on bar close
    signal: Box<dyn EntrySignal>,
    /// Operator log
    reporter: Reporter,
    status: EngineStatus,
    market_hours_reported: bool,
}

impl<B: BrokerPort> PositionManager<B> {
    /// Create a manager for `engine` trading through `broker`.
    pub fn new(engine: Engine, broker: Arc<B>, signal: impl EntrySignal + 'static) -> Self {
        let config = engine.config();
        let risk = RiskCeilingMonitor::new(config.owner_tag.clone(), config.max_loss);

        Self {
            executor: Executor::new(broker.clone()),
            engine,
            broker,
            risk,
            signal: Box::new(signal),
            reporter: Reporter::new(),
            status: EngineStatus::Active,
            market_hours_reported: false,
        }
    }

    /// Current lifecycle status
    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Loss-ceiling state after the last bar close
    pub fn risk_state(&self) -> RiskState {
        self.risk.state()
    }

    /// Operator log
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Decision core
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    // =========================================================================
    // Event handlers
    // =========================================================================

    /// Tick cycle.
    ///
    /// Session closes run before stop adjustments: a position closed for the
    /// session must not be modified afterwards.
    pub fn on_tick(&mut self, snapshot: &MarketSnapshot) -> DaemonResult<EngineStatus> {
        if self.status == EngineStatus::Terminated {
            return Ok(self.status);
        }

        self.broker.observe_quote(snapshot);
        self.report_market_hours(snapshot);

        self.close_before_session_end(snapshot)?;
        self.manage_protective_levels(snapshot)?;

        if self.risk.is_halted() {
            self.terminate_if_flat()?;
        }

        Ok(self.status)
    }

    /// Bar-close cycle.
    ///
    /// The loss ceiling is checked before any open attempt. Each side whose
    /// signal fires gets one open attempt.
    pub fn on_bar_closed(
        &mut self,
        bar: &BarClose,
        snapshot: &MarketSnapshot,
    ) -> DaemonResult<EngineStatus> {
        if self.status == EngineStatus::Terminated {
            return Ok(self.status);
        }

        self.broker.observe_quote(snapshot);

        if self.check_risk_ceiling()? == RiskStatus::Halted {
            self.terminate_if_flat()?;
            return Ok(self.status);
        }

        for side in Side::ALL {
            if self.signal.evaluate(side, bar.close, bar.prev_close) {
                debug!(%side, close = %bar.close, prev_close = %bar.prev_close, "Signal fired");
                self.on_signal(side, bar.close, bar.current_bar_open, snapshot)?;
            }
        }

        Ok(self.status)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Open a position on `side` at the signal `price`.
    ///
    /// 1. Read the book once; the guard chain judges this view
    /// 2. Close owned positions on the opposite side
    /// 3. Run the guard chain, compute levels and volume, then submit
    ///
    /// Closes issued in step 2 are seen by the guards on later events only,
    /// so a direction flip goes flat and reverses within the same bar.
    ///
    /// Returns the new position, or `None` when the attempt was denied or
    /// failed. A failed attempt is reported and never retried.
    pub fn on_signal(
        &mut self,
        side: Side,
        price: Decimal,
        current_bar_open: DateTime<Utc>,
        snapshot: &MarketSnapshot,
    ) -> DaemonResult<Option<PositionId>> {
        if self.risk.is_halted() {
            return Ok(None);
        }

        let symbol = self.engine.config().symbol().clone();
        let owner_tag = self.engine.config().owner_tag.clone();

        let positions = self.broker.open_positions(&symbol)?;
        let history = self.broker.closed_history(&owner_tag, &symbol)?;

        let closes = self.engine.close_opposite(side, &positions);
        if !closes.is_empty() {
            info!(%side, count = closes.len(), "Closing opposite positions");
            self.executor.execute(closes, &mut self.reporter);
        }

        let ctx = GuardContext {
            snapshot,
            positions: &positions,
            history: &history,
            current_bar_open,
        };

        let balance = if self.engine.needs_balance() {
            self.broker.account_balance()?
        } else {
            Decimal::ZERO
        };

        let plan = match self.engine.decide_entry(side, price, &ctx, balance) {
            Ok(EntryDecision::Submit(plan)) => plan,
            Ok(EntryDecision::Denied(reason)) => {
                self.reporter.warning(format!("Not opening {} position: {}", side, reason));
                return Ok(None);
            }
            Err(e) => {
                self.reporter.error(format!("Cannot open {} position: {}", side, e));
                return Ok(None);
            }
        };

        if plan.sizing.clamped_to_min {
            self.reporter.warning(format!(
                "Computed volume {} lots is below the minimum, using {} lots",
                plan.sizing.computed, plan.sizing.lots
            ));
        }

        info!(
            %side,
            %price,
            stop_loss = %plan.stop_loss,
            take_profit = %plan.take_profit,
            lots = %plan.sizing.lots,
            "Opening position"
        );

        let results = self
            .executor
            .execute(vec![EngineAction::SubmitMarketOrder(plan.order)], &mut self.reporter);

        Ok(results.into_iter().find_map(|r| match r {
            ActionResult::OrderPlaced { position_id, .. } => Some(position_id),
            _ => None,
        }))
    }

    /// Close every owned position if a session deadline (rollover, session
    /// close, weekend) is within the forced-close window.
    ///
    /// Returns the number of positions closed.
    pub fn close_before_session_end(&mut self, snapshot: &MarketSnapshot) -> DaemonResult<usize> {
        let Some(window) = self.engine.forced_close_window(snapshot) else {
            return Ok(0);
        };

        let positions = self.broker.open_positions(self.engine.config().symbol())?;
        let actions = self.engine.forced_close(snapshot, &positions);
        if actions.is_empty() {
            return Ok(0);
        }

        self.reporter
            .warning(format!("Closing {} positions before {}", actions.len(), window));
        Ok(self.run(actions))
    }

    /// Apply break-even and trailing moves to every owned position.
    ///
    /// Returns the number of stop moves applied.
    pub fn manage_protective_levels(&mut self, snapshot: &MarketSnapshot) -> DaemonResult<usize> {
        let positions = self.broker.open_positions(self.engine.config().symbol())?;
        let actions = self.engine.protective(snapshot, &positions);
        Ok(self.run(actions))
    }

    /// Close every owned position currently in profit.
    ///
    /// Returns the number of positions closed.
    pub fn close_profitable(&mut self, snapshot: &MarketSnapshot) -> DaemonResult<usize> {
        let positions = self.broker.open_positions(self.engine.config().symbol())?;
        let actions = self.engine.close_profitable(snapshot, &positions);
        Ok(self.run(actions))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn run(&mut self, actions: Vec<EngineAction>) -> usize {
        if actions.is_empty() {
            return 0;
        }
        self.executor
            .execute(actions, &mut self.reporter)
            .iter()
            .filter(|r| r.is_success())
            .count()
    }

    fn check_risk_ceiling(&mut self) -> DaemonResult<RiskStatus> {
        let history = self.broker.owner_history(&self.engine.config().owner_tag)?;

        let was_halted = self.risk.is_halted();
        let status = self.risk.check(&history);

        if status == RiskStatus::Halted && !was_halted {
            self.status = EngineStatus::Halted;
            self.reporter.warning(format!(
                "Maximum loss reached ({} <= -{}). No more positions will be opened",
                self.risk.state().cumulative_realized_pnl,
                self.risk.max_loss()
            ));
        }

        Ok(status)
    }

    fn terminate_if_flat(&mut self) -> DaemonResult<()> {
        let positions = self.broker.open_positions(self.engine.config().symbol())?;
        if self.engine.owned(&positions).is_empty() {
            self.status = EngineStatus::Terminated;
            self.reporter
                .warning("Engine stopped: maximum loss reached and no positions left open");
        }
        Ok(())
    }

    fn report_market_hours(&mut self, snapshot: &MarketSnapshot) {
        if self.market_hours_reported {
            return;
        }
        self.market_hours_reported = true;

        let message = match snapshot.time_till_close() {
            Some(left) if left > chrono::Duration::zero() => format!(
                "Market open at {}, session closes in {}h {}m",
                snapshot.server_time.format("%Y-%m-%d %H:%M UTC"),
                left.num_hours(),
                left.num_minutes() % 60
            ),
            _ => format!(
                "Market closed at {}",
                snapshot.server_time.format("%Y-%m-%d %H:%M UTC")
            ),
        };
        self.reporter.info(message);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use warden_domain::{Instrument, OwnerTag, Symbol};
    use warden_engine::{EngineConfig, Momentum};
    use warden_exec::StubBroker;

    fn config() -> EngineConfig {
        let instrument = Instrument::new(
            Symbol::new("EURUSD").unwrap(),
            dec!(0.0001),
            dec!(10),
            dec!(100000),
        )
        .unwrap();
        let mut cfg = EngineConfig::with_instrument(instrument, OwnerTag::new("Warden").unwrap());
        cfg.min_lot = dec!(0.01);
        cfg.close_before_weekend_hours = 0;
        cfg
    }

    fn snapshot(bid: Decimal, ask: Decimal, at: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            symbol: Symbol::new("EURUSD").unwrap(),
            bid,
            ask,
            pip_size: dec!(0.0001),
            server_time: at,
            time_till_close_secs: Some(8 * 60 * 60),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()
    }

    fn manager() -> (PositionManager<StubBroker>, Arc<StubBroker>) {
        let cfg = config();
        let broker = Arc::new(StubBroker::new(cfg.instrument.clone(), dec!(10000)));
        let manager = PositionManager::new(Engine::new(cfg).unwrap(), broker.clone(), Momentum);
        (manager, broker)
    }

    #[test]
    fn test_signal_opens_sized_position() {
        let (mut manager, broker) = manager();
        let snap = snapshot(dec!(1.1000), dec!(1.1000), t0());
        manager.on_tick(&snap).unwrap();

        let id = manager.on_signal(Side::Long, dec!(1.1000), t0(), &snap).unwrap();
        assert!(id.is_some());

        let positions = broker.open_positions(&Symbol::new("EURUSD").unwrap()).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].volume.as_decimal(), dec!(2));
    }

    #[test]
    fn test_signal_flips_direction() {
        let (mut manager, broker) = manager();
        let snap = snapshot(dec!(1.1000), dec!(1.1000), t0());
        manager.on_tick(&snap).unwrap();
        manager.on_signal(Side::Short, dec!(1.1000), t0(), &snap).unwrap();

        // next bar: long signal closes the short, then reverses
        let bar_open = t0() + Duration::minutes(15);
        let later = snapshot(dec!(1.0998), dec!(1.0998), bar_open);
        manager.on_tick(&later).unwrap();
        let id = manager
            .on_signal(Side::Long, dec!(1.0998), bar_open, &later)
            .unwrap();

        assert!(id.is_some());
        let sides: Vec<Side> = broker
            .open_positions(&Symbol::new("EURUSD").unwrap())
            .unwrap()
            .iter()
            .map(|p| p.side)
            .collect();
        assert_eq!(sides, vec![Side::Long]);

        let history = broker
            .closed_history(&OwnerTag::new("Warden").unwrap(), &Symbol::new("EURUSD").unwrap())
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].side, Side::Short);
    }

    #[test]
    fn test_no_second_open_after_flip_in_same_bar() {
        let (mut manager, broker) = manager();
        let snap = snapshot(dec!(1.1000), dec!(1.1000), t0());
        manager.on_tick(&snap).unwrap();
        manager.on_signal(Side::Short, dec!(1.1000), t0(), &snap).unwrap();
        manager.on_signal(Side::Long, dec!(1.1000), t0(), &snap).unwrap();

        // the short closed in this bar: further opens wait for the next bar
        let id = manager.on_signal(Side::Long, dec!(1.1000), t0(), &snap).unwrap();
        assert!(id.is_none());
        assert_eq!(broker.open_positions(&Symbol::new("EURUSD").unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn test_no_opens_after_halt() {
        let (mut manager, broker) = manager();
        let snap = snapshot(dec!(1.1000), dec!(1.1000), t0());
        manager.on_tick(&snap).unwrap();

        broker.insert_closed(warden_domain::ClosedTrade {
            position_id: uuid::Uuid::now_v7(),
            symbol: Symbol::new("EURUSD").unwrap(),
            owner_tag: OwnerTag::new("Warden").unwrap(),
            side: Side::Long,
            net_profit: dec!(-205),
            closed_at: t0() - Duration::hours(2),
            reason: warden_domain::ExitReason::StopLoss,
        });

        let bar = BarClose {
            symbol: Symbol::new("EURUSD").unwrap(),
            current_bar_open: t0(),
            close: dec!(1.1000),
            prev_close: dec!(1.0990),
        };
        assert_eq!(manager.on_bar_closed(&bar, &snap).unwrap(), EngineStatus::Terminated);
        assert_eq!(manager.on_signal(Side::Long, dec!(1.1), t0(), &snap).unwrap(), None);
        assert!(broker.calls().is_empty());
    }

    #[test]
    fn test_market_hours_reported_once() {
        let (mut manager, _broker) = manager();
        manager.on_tick(&snapshot(dec!(1.1000), dec!(1.1000), t0())).unwrap();
        manager
            .on_tick(&snapshot(dec!(1.1001), dec!(1.1001), t0() + Duration::seconds(1)))
            .unwrap();
        assert_eq!(manager.reporter().emitted(), 1);
    }
}
