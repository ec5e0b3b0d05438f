//! Event bus for internal daemon communication.
//!
//! Market data producers (live feed or replay) publish ticks and bar
//! closes; the daemon loop consumes them one at a time, in order.
//!
//! Uses a bounded tokio mpsc channel: a single consumer, and producers wait
//! when the consumer falls behind instead of dropping events.

use tokio::sync::mpsc;

use warden_domain::{BarClose, MarketSnapshot};

use crate::error::{DaemonError, DaemonResult};

/// Default number of buffered events
pub const DEFAULT_CAPACITY: usize = 1000;

// =============================================================================
// Event Types
// =============================================================================

/// Events that flow through the daemon event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum DaemonEvent {
    /// Quote update
    Tick(MarketSnapshot),

    /// A bar closed and a new one opened
    BarClosed {
        /// Closed bar
        bar: BarClose,
        /// Quote at the bar boundary
        snapshot: MarketSnapshot,
    },

    /// Stop the daemon loop
    Shutdown,
}

impl DaemonEvent {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            DaemonEvent::Tick(_) => "tick",
            DaemonEvent::BarClosed { .. } => "bar_closed",
            DaemonEvent::Shutdown => "shutdown",
        }
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Sending half of the event bus. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: mpsc::Sender<DaemonEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events, and its receiver.
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, EventReceiver { receiver })
    }

    /// Send an event, waiting for buffer space.
    ///
    /// Fails once the receiver has been dropped.
    pub async fn send(&self, event: DaemonEvent) -> DaemonResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|e| DaemonError::EventBus(format!("Receiver closed, dropped {}", e.0.kind())))
    }

    /// Whether the receiving side is gone
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiver for daemon events.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: mpsc::Receiver<DaemonEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` once every sender has been dropped and the buffer is empty.
    pub async fn recv(&mut self) -> Option<DaemonEvent> {
        self.receiver.recv().await
    }

    /// Receive an event without waiting.
    pub fn try_recv(&mut self) -> Option<DaemonEvent> {
        self.receiver.try_recv().ok()
    }
}

// =============================================================================
// Tests
// =============================================================================
