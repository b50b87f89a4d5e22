//!
//! Temporal quantification in a simulation context.
//!
//! Frames are timestamped in [`SimTime`], the simulated clock advanced by
//! the runtime. Transmission and propagation delays are [`Duration`]s.
//!
//! ```rust
//! # use des_ethernet::time::*;
//! let start = SimTime::from(1.5);
//! let end = start + Duration::from_millis(500);
//! assert_eq!(end, SimTime::from(2.0));
//! assert_eq!(end - start, Duration::from_millis(500));
//! ```

mod duration;
pub use duration::*;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    cell::Cell,
    fmt::{Debug, Display},
    ops::{Deref, Sub},
};

// Simulations are single threaded, every thread owns its own clock.
thread_local! {
    static SIMTIME: Cell<SimTime> = const { Cell::new(SimTime::ZERO) };
}

///
/// A specific point of time in the simulation.
///
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    /// The start of every simulation clock.
    pub const ZERO: SimTime = SimTime(Duration::ZERO);
    /// The latest representable point of time.
    pub const MAX: SimTime = SimTime(Duration::MAX);

    /// The current simulation time of this thread.
    #[must_use]
    pub fn now() -> Self {
        SIMTIME.with(Cell::get)
    }

    pub(crate) fn set_now(time: SimTime) {
        SIMTIME.with(|cell| cell.set(time));
    }

    /// The point of time `duration` after [`SimTime::ZERO`].
    #[must_use]
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    /// The time elapsed since `earlier`, or `None` if `earlier` is later.
    #[must_use]
    pub fn checked_duration_since(&self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// `self + duration`, or `None` on overflow.
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_add(duration).map(SimTime)
    }
}

// Times are written as fractional seconds.

impl Serialize for SimTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map(SimTime)
            .map_err(serde::de::Error::custom)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    ///
    /// # Panics
    ///
    /// Panics if `rhs` is later than `self`.
    ///
    fn sub(self, rhs: SimTime) -> Self::Output {
        let Some(duration) = self.checked_duration_since(rhs) else {
            panic!("cannot subtract {rhs} from the earlier time {self}");
        };
        duration
    }
}

impl Deref for SimTime {
    type Target = Duration;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl From<f64> for SimTime {
    fn from(secs: f64) -> Self {
        SimTime(Duration::from_secs_f64(secs))
    }
}
