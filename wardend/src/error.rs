//! Daemon error types.

use thiserror::Error;
use warden_domain::DomainError;
use warden_engine::EngineError;
use warden_exec::BrokerError;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Engine error (invalid configuration is fatal at startup)
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Broker query or call failed
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Event bus error
    #[error("Event bus error: {0}")]
    EventBus(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Replay feed could not be read or parsed
    #[error("Replay error: {0}")]
    Replay(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
