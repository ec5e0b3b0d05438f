//! Engine error types.

use thiserror::Error;
use warden_domain::DomainError;

/// Errors raised by engine decisions and configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Configuration rejected at startup; the engine must not start
    #[error("Validation error: {0}")]
    Validation(String),

    /// Domain rule violated while building a decision
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Whether this is a sizing failure that only aborts the current open attempt
    pub fn is_invalid_risk_input(&self) -> bool {
        matches!(self, EngineError::Domain(DomainError::InvalidRiskInput(_)))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
