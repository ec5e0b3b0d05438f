//! Session windows
//!
//! Time-based rules around the daily rollover and the end of the trading
//! session. Two windows share the same shape but differ in width:
//!
//! - open-block window (30 min): no new positions
//! - forced-close window (5 min): owned positions are closed
//!
//! Rollover distance is computed modulo 24 h, so a rollover hour of 0 is
//! handled the same way as any other.

use chrono::{Datelike, Duration, NaiveTime, Timelike, Weekday};
use std::fmt;

use warden_domain::MarketSnapshot;

/// Width of the window before rollover or session close where opens are refused
pub const OPEN_BLOCK_WINDOW_MINUTES: i64 = 30;

/// Width of the window before rollover or session close where positions are closed
pub const FORCED_CLOSE_WINDOW_MINUTES: i64 = 5;

/// Which clock rule matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionWindow {
    /// Approaching the configured daily rollover hour
    Rollover,
    /// Approaching the end of the current trading session
    SessionClose,
    /// Friday, inside the close-before-weekend period
    Weekend,
}

impl fmt::Display for SessionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionWindow::Rollover => write!(f, "rollover"),
            SessionWindow::SessionClose => write!(f, "session close"),
            SessionWindow::Weekend => write!(f, "weekend close"),
        }
    }
}

/// Clock knobs consulted by the window checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRules {
    /// Daily rollover hour, UTC
    pub rollover_hour: u32,
    /// Hours before the Friday close to go flat; 0 disables
    pub close_before_weekend_hours: u32,
}

impl SessionRules {
    /// Window that forbids opening a position right now, if any.
    pub fn open_block(&self, snapshot: &MarketSnapshot) -> Option<SessionWindow> {
        let window = Duration::minutes(OPEN_BLOCK_WINDOW_MINUTES);

        if let Some(until) = until_rollover(snapshot, self.rollover_hour) {
            if until > Duration::zero() && until <= window {
                return Some(SessionWindow::Rollover);
            }
        }

        if closes_within(snapshot, window) {
            return Some(SessionWindow::SessionClose);
        }

        self.weekend(snapshot)
    }

    /// Window that requires closing owned positions right now, if any.
    ///
    /// The exact rollover instant is inside the window.
    pub fn forced_close(&self, snapshot: &MarketSnapshot) -> Option<SessionWindow> {
        let window = Duration::minutes(FORCED_CLOSE_WINDOW_MINUTES);

        if let Some(until) = until_rollover(snapshot, self.rollover_hour) {
            if until <= window {
                return Some(SessionWindow::Rollover);
            }
        }

        if closes_within(snapshot, window) {
            return Some(SessionWindow::SessionClose);
        }

        self.weekend(snapshot)
    }

    fn weekend(&self, snapshot: &MarketSnapshot) -> Option<SessionWindow> {
        if self.close_before_weekend_hours == 0 || snapshot.server_time.weekday() != Weekday::Fri {
            return None;
        }

        let window = Duration::hours(i64::from(self.close_before_weekend_hours));
        closes_within(snapshot, window).then_some(SessionWindow::Weekend)
    }
}

/// Time from the snapshot's server clock to the next rollover, in `[0, 24h)`.
///
/// `None` only for an hour that is not a valid time of day.
pub fn until_rollover(snapshot: &MarketSnapshot, rollover_hour: u32) -> Option<Duration> {
    let rollover = NaiveTime::from_hms_opt(rollover_hour, 0, 0)?;
    let now = snapshot.server_time.time();
    let now = NaiveTime::from_hms_opt(now.hour(), now.minute(), now.second())?;

    let mut until = rollover.signed_duration_since(now);
    if until < Duration::zero() {
        until += Duration::days(1);
    }
    Some(until)
}

/// True when the session is open and ends within `window`.
fn closes_within(snapshot: &MarketSnapshot, window: Duration) -> bool {
    match snapshot.time_till_close() {
        Some(left) => left > Duration::zero() && left <= window,
        None => false,
    }
}

// =============================================================================
// Tests
// =============================================================================
