//! Warden Daemon
//!
//! Runs the risk-management engine against a paper broker, fed by a
//! JSON-lines market data replay.
//!
//! # Usage
//!
//! ```bash
//! # Replay a recorded session
//! WARDEN_REPLAY_FILE=session.jsonl cargo run -p wardend
//!
//! # Tighter ceiling, fixed volume
//! WARDEN_MAX_LOSS=100 WARDEN_USE_DYNAMIC_LOT=false cargo run -p wardend
//! ```
//!
//! # Environment Variables
//!
//! - `WARDEN_ENV`: Environment (test, development, production)
//! - `WARDEN_SYMBOL`: Instrument (default: EURUSD)
//! - `WARDEN_OWNER_TAG`: Tag on every order (default: Warden)
//! - `WARDEN_RISK_PERCENT`: Balance percent risked per trade (default: 1.8)
//! - `WARDEN_MAX_LOSS`: Realized loss ceiling (default: 200)
//! - `WARDEN_REPLAY_FILE`: Market data to replay
//! - `WARDEN_STARTING_BALANCE`: Paper account balance (default: 10000)

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wardend::{replay, Config, Daemon};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("wardend=info".parse()?)
                .add_directive("warden=info".parse()?),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        symbol = %config.engine.symbol(),
        max_loss = %config.engine.max_loss,
        "Warden Daemon"
    );

    let replay_file = config.replay.file.clone();
    let (daemon, bus, broker) = Daemon::new_stub(config)?;

    // Feed market data; without a feed, run until interrupted
    let _idle_bus = match replay_file {
        Some(path) => {
            let events = replay::load(&path).await?;
            tokio::spawn(async move {
                if let Err(e) = replay::publish(events, bus).await {
                    error!(error = %e, "Replay stopped");
                }
            });
            None
        }
        None => {
            warn!("No WARDEN_REPLAY_FILE set, waiting for shutdown signal");
            Some(bus)
        }
    };

    let status = daemon.run().await?;
    info!(%status, balance = %broker.balance(), "Warden stopped");

    Ok(())
}
