//! Execution layer error types.

use thiserror::Error;
use warden_domain::{DomainError, PositionId};

/// Errors reported by a broker collaborator.
///
/// None of these stop the engine: a failed call abandons the current
/// attempt and the next eligible event re-evaluates from scratch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    /// Broker refused the request (insufficient margin, invalid stop, ...)
    #[error("Order rejected: {0}")]
    Rejected(String),

    /// Position no longer exists on the broker
    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),

    /// Broker could not be reached or has no quote yet
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// Broker data violated a domain rule
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
