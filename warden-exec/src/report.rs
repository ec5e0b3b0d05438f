//! Operator reporting with adjacent-duplicate suppression.
//!
//! Every engine outcome worth an operator's attention goes through
//! [`Reporter`]. A message whose severity and text (with numbers removed)
//! match the previous one is dropped, so a guard that denies on every bar
//! logs once until something else happens. Suppression never changes what
//! the engine does.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// Report severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Normal operation
    Info,
    /// Denied opens, clamped sizes, halts
    Warning,
    /// Broker failures and rejected inputs
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Deduplicating report sink, owned by the single engine instance.
#[derive(Debug, Default)]
pub struct Reporter {
    last_key: Option<(Severity, String)>,
    emitted: u64,
    suppressed: u64,
}

impl Reporter {
    /// Fresh reporter with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `message`; returns false when it was suppressed as a duplicate.
    pub fn report(&mut self, severity: Severity, message: impl AsRef<str>) -> bool {
        let message = message.as_ref();
        let key = (severity, strip_numbers(message));

        if self.last_key.as_ref() == Some(&key) {
            self.suppressed += 1;
            return false;
        }
        self.last_key = Some(key);
        self.emitted += 1;

        match severity {
            Severity::Info => info!(target: "warden::report", "{}", message),
            Severity::Warning => warn!(target: "warden::report", "{}", message),
            Severity::Error => error!(target: "warden::report", "{}", message),
        }
        true
    }

    /// Shorthand for `Severity::Info`
    pub fn info(&mut self, message: impl AsRef<str>) -> bool {
        self.report(Severity::Info, message)
    }

    /// Shorthand for `Severity::Warning`
    pub fn warning(&mut self, message: impl AsRef<str>) -> bool {
        self.report(Severity::Warning, message)
    }

    /// Shorthand for `Severity::Error`
    pub fn error(&mut self, message: impl AsRef<str>) -> bool {
        self.report(Severity::Error, message)
    }

    /// Messages written so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Messages dropped as duplicates so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

/// Message text with numeric values removed.
///
/// Digits go, and so do `.`, `,` and `-` when they belong to a number.
fn strip_numbers(message: &str) -> String {
    let chars: Vec<char> = message.chars().collect();
    let mut key = String::with_capacity(message.len());

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_digit() {
            continue;
        }

        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        let numeric_punct = match c {
            '.' | ',' => prev_digit && next_digit,
            '-' => next_digit,
            _ => false,
        };

        if !numeric_punct {
            key.push(c);
        }
    }

    key
}
