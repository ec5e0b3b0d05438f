//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Position Manager (engine, broker, loss ceiling)
//! - Event Bus (ticks and bar closes, in order)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize components
//! 3. Main event loop, one event at a time
//! 4. Stop on `Shutdown`, SIGINT, a closed bus, or self-termination

use std::sync::Arc;

use tracing::{error, info, warn};

use warden_engine::{Engine, EntrySignal, Momentum};
use warden_exec::{BrokerPort, StubBroker};

use crate::config::Config;
use crate::error::DaemonResult;
use crate::event_bus::{DaemonEvent, EventBus, EventReceiver, DEFAULT_CAPACITY};
use crate::position_manager::{EngineStatus, PositionManager};

// =============================================================================
// Daemon
// =============================================================================

/// The main Warden daemon.
pub struct Daemon<B: BrokerPort + 'static> {
    /// Configuration
    config: Config,
    /// Position manager
    manager: PositionManager<B>,
    /// Incoming market events
    events: EventReceiver,
}

impl Daemon<StubBroker> {
    /// Create a daemon trading the momentum signal against a paper broker.
    ///
    /// Returns the daemon, the bus to feed it, and the paper broker.
    pub fn new_stub(config: Config) -> DaemonResult<(Self, EventBus, Arc<StubBroker>)> {
        Self::new_stub_with_signal(config, Momentum)
    }

    /// Create a paper-trading daemon with a custom entry signal.
    pub fn new_stub_with_signal(
        config: Config,
        signal: impl EntrySignal + 'static,
    ) -> DaemonResult<(Self, EventBus, Arc<StubBroker>)> {
        let broker = Arc::new(StubBroker::new(
            config.engine.instrument.clone(),
            config.replay.starting_balance,
        ));
        let engine = Engine::new(config.engine.clone())?;
        let manager = PositionManager::new(engine, broker.clone(), signal);
        let (bus, events) = EventBus::new(DEFAULT_CAPACITY);

        Ok((Self::new(config, manager, events), bus, broker))
    }
}

impl<B: BrokerPort + 'static> Daemon<B> {
    /// Create a new daemon with provided components.
    pub fn new(config: Config, manager: PositionManager<B>, events: EventReceiver) -> Self {
        Self {
            config,
            manager,
            events,
        }
    }

    /// Run the daemon.
    ///
    /// Blocks until shutdown is requested, the bus closes, or the engine
    /// terminates itself. Returns the final engine status.
    pub async fn run(mut self) -> DaemonResult<EngineStatus> {
        let config = self.manager.engine().config();
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            symbol = %config.symbol(),
            owner_tag = %config.owner_tag,
            "Starting Warden daemon"
        );

        info!("Entering main event loop");
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        warn!("Event bus closed");
                        break;
                    };
                    if event == DaemonEvent::Shutdown {
                        info!("Shutdown requested");
                        break;
                    }
                    if let Err(e) = self.handle_event(&event) {
                        error!(error = %e, kind = event.kind(), "Error handling event");
                    }
                    if self.manager.status() == EngineStatus::Terminated {
                        info!("Engine terminated");
                        break;
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        let status = self.manager.status();
        let risk = self.manager.risk_state();
        info!(
            %status,
            realized_pnl = %risk.cumulative_realized_pnl,
            reports = self.manager.reporter().emitted(),
            "Daemon stopped"
        );
        Ok(status)
    }

    fn handle_event(&mut self, event: &DaemonEvent) -> DaemonResult<EngineStatus> {
        match event {
            DaemonEvent::Tick(snapshot) => self.manager.on_tick(snapshot),
            DaemonEvent::BarClosed { bar, snapshot } => self.manager.on_bar_closed(bar, snapshot),
            DaemonEvent::Shutdown => Ok(self.manager.status()),
        }
    }

    /// Position manager
    pub fn manager(&self) -> &PositionManager<B> {
        &self.manager
    }
}

// =============================================================================
// Tests
// =============================================================================
