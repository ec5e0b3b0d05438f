//! Warden Daemon Library
//!
//! Runtime host for the Warden risk-management engine.
//!
//! # Architecture
//!
//! ```text
//! Replay / Feed → Event Bus → Position Manager → Engine → Executor → Broker
//!                                   ↓
//!                      RiskCeilingMonitor, Reporter
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main event loop
//! - **Position Manager**: Tick and bar-close cycles, halting
//! - **Event Bus**: Ordered market events
//! - **Replay**: JSON-lines market data feed
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use wardend::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let (daemon, bus, _broker) = Daemon::new_stub(config)?;
//!     // feed `bus` from a market data source
//!     daemon.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod event_bus;
pub mod position_manager;
pub mod replay;

// Re-exports for convenience
pub use config::{Config, Environment, ReplayConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use event_bus::{DaemonEvent, EventBus, EventReceiver, DEFAULT_CAPACITY};
pub use position_manager::{EngineStatus, PositionManager};
