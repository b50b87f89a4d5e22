use std::fmt::Debug;

use rand::{rngs::StdRng, SeedableRng};

use crate::time::SimTime;

use super::{Application, FutureEventSet, Profiler, Runtime, RuntimeLimit, State};

/// A builder for a runtime instance.
#[must_use]
pub struct Builder {
    pub(super) quiet: bool,
    pub(super) rng: StdRng,
    pub(super) limit: RuntimeLimit,
    pub(super) start_time: SimTime,
}

impl Builder {
    /// Creates a new unconfigured builder, with an RNG seeded
    /// by the operating system.
    pub fn new() -> Builder {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a `Builder` with a static seeded RNG, making back-off and
    /// error models reproducible.
    pub fn seeded(seed: u64) -> Builder {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Builder {
        Builder {
            quiet: false,
            rng,
            limit: RuntimeLimit::None,
            start_time: SimTime::ZERO,
        }
    }

    ///
    /// Suppressed runtime messages from the simulation framework.
    ///
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    ///
    /// Sets the simulation time the runtime starts at.
    ///
    pub fn start_time(mut self, time: SimTime) -> Self {
        self.start_time = time;
        self
    }

    ///
    /// Changes the maximum iteration number of a runtime.
    ///
    pub fn max_itr(mut self, max_itr: usize) -> Self {
        self.limit.add(RuntimeLimit::EventCount(max_itr));
        self
    }

    ///
    /// Changes the maximum time of the runtime (default: inf).
    ///
    pub fn max_time(mut self, max_time: SimTime) -> Self {
        self.limit.add(RuntimeLimit::SimTime(max_time));
        self
    }

    ///
    /// Adds a custom limit to the runtime.
    ///
    pub fn limit(mut self, limit: RuntimeLimit) -> Self {
        self.limit.add(limit);
        self
    }

    ///
    /// Builds a new [`Runtime`] instance, using an application as core.
    ///
    /// This resets the simulation clock of the current thread to the configured
    /// start time and replaces the runtime RNG.
    ///
    pub fn build<A: Application>(self, app: A) -> Runtime<A> {
        SimTime::set_now(self.start_time);
        super::set_rng(self.rng);

        Runtime {
            app,
            state: State::Ready,

            limit: self.limit,

            event_id: 0,
            itr: 0,

            quiet: self.quiet,
            profiler: Profiler::default(),

            future_event_set: FutureEventSet::new(self.start_time),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("quiet", &self.quiet)
            .field("limit", &self.limit)
            .field("start_time", &self.start_time)
            .finish()
    }
}
