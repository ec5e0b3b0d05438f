//! Warden Execution Layer
//!
//! Carries engine decisions to a broker and reports the outcome.
//!
//! # Architecture
//!
//! ```text
//! Engine Decision → Executor → BrokerPort → ActionResult
//!                       ↓
//!                   Reporter
//! ```
//!
//! # Components
//!
//! - **Ports**: the broker interface the engine depends on
//! - **Executor**: runs engine actions, one attempt each
//! - **Reporter**: severity-tagged operator log with duplicate suppression
//! - **Stub**: in-memory paper broker
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_exec::{Executor, Reporter, StubBroker};
//! use std::sync::Arc;
//!
//! let broker = Arc::new(StubBroker::new(instrument, dec!(10000)));
//! let executor = Executor::new(broker);
//! let mut reporter = Reporter::new();
//!
//! let results = executor.execute(actions, &mut reporter);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod ports;
pub mod report;
pub mod stub;

// Re-exports for convenience
pub use error::{BrokerError, BrokerResult};
pub use executor::{ActionResult, Executor};
pub use ports::BrokerPort;
pub use report::{Reporter, Severity};
pub use stub::{BrokerCall, StubBroker};
