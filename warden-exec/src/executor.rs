//! Executor: carries engine actions to the broker.
//!
//! The Executor is the bridge between the pure Engine (decisions) and
//! the broker (I/O). Each action is attempted once; a failure is reported
//! and the remaining actions still run.
//!
//! # Flow
//!
//! ```text
//! Engine Decision → Executor → Broker → ActionResult
//! ```

use std::sync::Arc;
use tracing::{debug, info, warn};

use warden_domain::{OrderRequest, PositionId, StopAdjustment};
use warden_engine::{CloseReason, EngineAction};

use crate::error::BrokerError;
use crate::ports::BrokerPort;
use crate::report::Reporter;

// =============================================================================
// Execution Result
// =============================================================================

/// Result of executing one engine action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Position closed
    Closed {
        /// Closed position
        position_id: PositionId,
        /// Why it was closed
        reason: CloseReason,
    },
    /// Stop moved
    StopModified {
        /// Modified position
        position_id: PositionId,
        /// Applied move
        adjustment: StopAdjustment,
    },
    /// Order accepted and position opened
    OrderPlaced {
        /// New position
        position_id: PositionId,
        /// Submitted order
        order: OrderRequest,
    },
    /// Broker refused; attempt abandoned
    Failed {
        /// Action that failed
        action: EngineAction,
        /// Broker's answer
        error: BrokerError,
    },
}

impl ActionResult {
    /// Whether the broker accepted the action
    pub fn is_success(&self) -> bool {
        !matches!(self, ActionResult::Failed { .. })
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Executes engine actions against a broker.
pub struct Executor<B: BrokerPort> {
    broker: Arc<B>,
}

impl<B: BrokerPort> Executor<B> {
    /// Create a new executor.
    pub fn new(broker: Arc<B>) -> Self {
        Self { broker }
    }

    /// Execute actions in order.
    ///
    /// Broker failures never abort the batch and are never retried.
    pub fn execute(
        &self,
        actions: Vec<EngineAction>,
        reporter: &mut Reporter,
    ) -> Vec<ActionResult> {
        actions
            .into_iter()
            .map(|action| self.execute_action(action, reporter))
            .collect()
    }

    fn execute_action(&self, action: EngineAction, reporter: &mut Reporter) -> ActionResult {
        match &action {
            EngineAction::ClosePosition {
                position_id,
                reason,
            } => {
                info!(%position_id, %reason, "Closing position");
                match self.broker.close_position(*position_id) {
                    Ok(()) => {
                        reporter.info(format!("Closed position {} ({})", position_id, reason));
                        ActionResult::Closed {
                            position_id: *position_id,
                            reason: *reason,
                        }
                    }
                    Err(error) => {
                        reporter.error(format!(
                            "Failed to close position {}: {}",
                            position_id, error
                        ));
                        ActionResult::Failed {
                            action: action.clone(),
                            error,
                        }
                    }
                }
            }

            EngineAction::ModifyStopLoss {
                position_id,
                adjustment,
            } => {
                debug!(
                    %position_id,
                    kind = %adjustment.kind,
                    previous = ?adjustment.previous_stop.map(|p| p.as_decimal()),
                    new = %adjustment.new_stop,
                    "Moving stop"
                );
                match self.broker.modify_stop_loss(*position_id, adjustment.new_stop) {
                    Ok(()) => ActionResult::StopModified {
                        position_id: *position_id,
                        adjustment: *adjustment,
                    },
                    Err(error) => {
                        reporter.error(format!(
                            "Failed to move {} stop of position {} to {}: {}",
                            adjustment.kind, position_id, adjustment.new_stop, error
                        ));
                        ActionResult::Failed {
                            action: action.clone(),
                            error,
                        }
                    }
                }
            }

            EngineAction::SubmitMarketOrder(order) => {
                info!(
                    symbol = %order.symbol,
                    side = %order.side,
                    volume = %order.volume,
                    stop_pips = %order.stop_loss_pips,
                    target_pips = %order.take_profit_pips,
                    "Submitting market order"
                );
                match self.broker.submit_market_order(order) {
                    Ok(position_id) => {
                        reporter.info(format!(
                            "Opened {} {} lots on {} ({})",
                            order.side, order.volume, order.symbol, position_id
                        ));
                        ActionResult::OrderPlaced {
                            position_id,
                            order: order.clone(),
                        }
                    }
                    Err(error) => {
                        warn!(error = %error, "Market order failed");
                        reporter
                            .error(format!("Failed to open {} position: {}", order.side, error));
                        ActionResult::Failed {
                            action: action.clone(),
                            error,
                        }
                    }
                }
            }
        }
    }

    /// The broker this executor talks to
    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }
}

// =============================================================================
// Tests
// =============================================================================
