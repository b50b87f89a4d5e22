use super::Packet;
use crate::runtime;
use fxhash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, fmt::Debug, rc::Rc};

/// A shared handle to a receive error model.
pub type ErrorModelRef = Rc<RefCell<dyn ErrorModel>>;

///
/// A model deciding whether a received packet was corrupted
/// on the medium.
///
pub trait ErrorModel: Debug {
    /// Whether the given packet should be considered corrupt.
    ///
    /// Disabled models never corrupt packets.
    fn is_corrupt(&mut self, packet: &Packet) -> bool;

    /// Enables the model.
    fn enable(&mut self);

    /// Disables the model.
    fn disable(&mut self);

    /// Whether the model is enabled.
    fn is_enabled(&self) -> bool;

    /// Resets any internal state.
    fn reset(&mut self) {}
}

/// The unit an error rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorUnit {
    /// The rate is the probability of a packet being corrupt.
    #[default]
    Packet,
    /// The rate is the probability of a single byte being corrupt.
    Byte,
    /// The rate is the probability of a single bit being corrupt.
    Bit,
}

///
/// Corrupts packets randomly, with a fixed rate per unit.
///
/// Randomness is drawn from the runtime RNG, so seeded runtimes
/// produce reproducible losses.
///
#[derive(Debug, Clone, PartialEq)]
pub struct RateErrorModel {
    rate: f64,
    unit: ErrorUnit,
    enabled: bool,
}

impl RateErrorModel {
    /// Creates a new, enabled error model.
    ///
    /// # Panics
    ///
    /// Panics if the rate is not within `[0, 1]`.
    #[must_use]
    pub fn new(rate: f64, unit: ErrorUnit) -> Self {
        assert!(
            (0.0..=1.0).contains(&rate),
            "error rate must be within [0, 1], got {rate}"
        );
        Self {
            rate,
            unit,
            enabled: true,
        }
    }

    /// Creates a new error model as a shared [`ErrorModelRef`].
    #[must_use]
    pub fn shared(rate: f64, unit: ErrorUnit) -> ErrorModelRef {
        Rc::new(RefCell::new(Self::new(rate, unit)))
    }

    /// The configured rate.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl ErrorModel for RateErrorModel {
    fn is_corrupt(&mut self, packet: &Packet) -> bool {
        if !self.enabled || self.rate <= 0.0 {
            return false;
        }
        if self.rate >= 1.0 {
            return true;
        }

        let units = match self.unit {
            ErrorUnit::Packet => 1,
            ErrorUnit::Byte => packet.len(),
            ErrorUnit::Bit => packet.len() * 8,
        };

        runtime::random::<f64>() < corrupt_probability(self.rate, units)
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// The probability that at least one of `units` units is corrupt.
fn corrupt_probability(rate: f64, units: usize) -> f64 {
    let exp = i32::try_from(units).unwrap_or(i32::MAX);
    1.0 - (1.0 - rate).powi(exp)
}

///
/// Corrupts exactly the packets whose ids are listed.
///
#[derive(Debug, Clone, Default)]
pub struct ListErrorModel {
    uids: FxHashSet<u64>,
    enabled: bool,
}

impl ListErrorModel {
    /// Creates a new, enabled error model that corrupts the given packets.
    #[must_use]
    pub fn new(uids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            uids: uids.into_iter().collect(),
            enabled: true,
        }
    }

    /// Creates a new error model as a shared [`ErrorModelRef`].
    #[must_use]
    pub fn shared(uids: impl IntoIterator<Item = u64>) -> ErrorModelRef {
        Rc::new(RefCell::new(Self::new(uids)))
    }

    /// Replaces the list of packets to corrupt.
    pub fn set_list(&mut self, uids: impl IntoIterator<Item = u64>) {
        self.uids = uids.into_iter().collect();
    }
}

impl ErrorModel for ListErrorModel {
    fn is_corrupt(&mut self, packet: &Packet) -> bool {
        self.enabled && self.uids.contains(&packet.uid())
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn reset(&mut self) {
        self.uids.clear();
    }
}
