/// A span of simulated time.
pub use std::time::Duration;

use super::SimTime;
use std::ops::{Add, AddAssign};

impl Add<Duration> for SimTime {
    type Output = SimTime;

    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    ///
    fn add(self, rhs: Duration) -> Self::Output {
        let Some(time) = self.checked_add(rhs) else {
            panic!("adding {rhs:?} to {self} overflows the simulation clock");
        };
        time
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}
