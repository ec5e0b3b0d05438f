//! Entry signals
//!
//! The signal decides only *whether* a direction is wanted on a bar close;
//! everything after that (flattening, guards, sizing) belongs to the engine.
//! Any `Fn(Side, Decimal, Decimal) -> bool` is a signal.

use rust_decimal::Decimal;

use warden_domain::Side;

/// Directional entry predicate, evaluated once per side on every bar close.
pub trait EntrySignal: Send + Sync {
    /// Whether an open on `side` is wanted, given the latest close and the one before it
    fn evaluate(&self, side: Side, price: Decimal, price_prev: Decimal) -> bool;
}

impl<F> EntrySignal for F
where
    F: Fn(Side, Decimal, Decimal) -> bool + Send + Sync,
{
    fn evaluate(&self, side: Side, price: Decimal, price_prev: Decimal) -> bool {
        self(side, price, price_prev)
    }
}

/// Follows the last bar: Long after an up-close, Short after a down-close.
#[derive(Debug, Clone, Copy, Default)]
pub struct Momentum;

impl EntrySignal for Momentum {
    fn evaluate(&self, side: Side, price: Decimal, price_prev: Decimal) -> bool {
        match side {
            Side::Long => price > price_prev,
            Side::Short => price < price_prev,
        }
    }
}

/// One optional confirmation attached to a [`SignalSet`]
pub struct SignalFilter {
    name: String,
    enabled: bool,
    signal: Box<dyn EntrySignal>,
}

impl SignalFilter {
    /// Filter named `name`, initially enabled
    pub fn new(name: impl Into<String>, signal: impl EntrySignal + 'static) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            signal: Box::new(signal),
        }
    }

    /// Filter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the filter currently takes part
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Primary signal plus confluence filters.
///
/// A direction fires only when the primary and every enabled filter agree.
/// Disabled filters are skipped entirely.
pub struct SignalSet {
    primary: Box<dyn EntrySignal>,
    filters: Vec<SignalFilter>,
}

impl SignalSet {
    /// Set with only the primary signal
    pub fn new(primary: impl EntrySignal + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            filters: Vec::new(),
        }
    }

    /// Add a confirmation filter
    pub fn with_filter(mut self, filter: SignalFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Enable or disable a filter by name; returns false if no filter has that name
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.filters.iter_mut().find(|f| f.name == name) {
            Some(filter) => {
                filter.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Registered filters
    pub fn filters(&self) -> &[SignalFilter] {
        &self.filters
    }
}

impl EntrySignal for SignalSet {
    fn evaluate(&self, side: Side, price: Decimal, price_prev: Decimal) -> bool {
        self.primary.evaluate(side, price, price_prev)
            && self
                .filters
                .iter()
                .filter(|f| f.enabled)
                .all(|f| f.signal.evaluate(side, price, price_prev))
    }
}

impl std::fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSet")
            .field(
                "filters",
                &self
                    .filters
                    .iter()
                    .map(|filter| (filter.name.as_str(), filter.enabled))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
