use crate::{runtime, time::Duration};
use rand::distr::Uniform;

///
/// Truncated binary exponential back-off, used by a device that
/// finds its channel busy.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    /// The length of one back-off slot.
    pub slot_time: Duration,
    /// The minimum number of slots to wait.
    pub min_slots: u32,
    /// The maximum number of slots to wait.
    pub max_slots: u32,
    /// The retry count at which the slot window stops growing.
    pub ceiling: u32,
    /// The number of retries after which a frame is dropped.
    pub max_retries: u32,

    retries: u32,
}

impl Backoff {
    /// Creates a new back-off with the given parameters.
    #[must_use]
    pub fn new(
        slot_time: Duration,
        min_slots: u32,
        max_slots: u32,
        ceiling: u32,
        max_retries: u32,
    ) -> Self {
        Self {
            slot_time,
            min_slots,
            max_slots,
            ceiling,
            max_retries,
            retries: 0,
        }
    }

    /// The number of retries of the current frame.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Whether the current frame may not be retried again.
    #[must_use]
    pub fn max_retries_reached(&self) -> bool {
        self.retries >= self.max_retries
    }

    /// Counts a retry of the current frame.
    pub fn incr_retries(&mut self) {
        self.retries += 1;
    }

    /// Resets the retry count, once a frame made it onto the channel.
    pub fn reset(&mut self) {
        self.retries = 0;
    }

    ///
    /// Draws the time to wait before the next attempt.
    ///
    /// The number of slots is uniform within
    /// `[min_slots, min(2^retries - 1, max_slots)]`, where `retries`
    /// is capped at `ceiling`.
    ///
    #[must_use]
    pub fn backoff_time(&self) -> Duration {
        let exp = if self.ceiling > 0 && self.retries > self.ceiling {
            self.ceiling
        } else {
            self.retries
        };

        let max_slot = 2u32
            .checked_pow(exp)
            .map_or(u32::MAX, |v| v - 1)
            .min(self.max_slots);

        let slots = match Uniform::new_inclusive(self.min_slots, max_slot) {
            Ok(distr) => runtime::sample(distr),
            Err(_) => self.min_slots,
        };

        self.slot_time * slots
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_micros(1), 1, 1000, 10, 1000)
    }
}
