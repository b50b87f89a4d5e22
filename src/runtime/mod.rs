//!
//! Central primitives for running a discrete event simulation.
//!

use crate::time::{Duration, SimTime};
use rand::{distr::StandardUniform, prelude::Distribution, rngs::StdRng, Rng, SeedableRng};
use std::{
    any::type_name,
    cell::RefCell,
    fmt::{Debug, Display},
    mem,
    time::Instant,
};

mod event;
pub use self::event::*;

mod limit;
pub use self::limit::*;

mod builder;
pub use self::builder::*;

mod error;
pub use self::error::*;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(0));
}

pub(crate) fn set_rng(rng: StdRng) {
    RNG.with(|cell| *cell.borrow_mut() = rng);
}

///
/// Generates a random instance of type T with a Standard distribution,
/// using the RNG of the current runtime.
///
#[must_use]
pub fn random<T>() -> T
where
    StandardUniform: Distribution<T>,
{
    RNG.with(|rng| rng.borrow_mut().random::<T>())
}

///
/// Generates a random instance of type T with a distribution
/// of type D, using the RNG of the current runtime.
///
pub fn sample<T, D>(distr: D) -> T
where
    D: Distribution<T>,
{
    RNG.with(|rng| rng.borrow_mut().sample::<T, D>(distr))
}

///
/// Wall-clock statistics of a simulation run.
///
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    /// The number of events handled.
    pub event_count: usize,
    /// The real time the simulation took, once finished.
    pub duration: Duration,

    started: Option<Instant>,
}

impl Profiler {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn finish(&mut self, event_count: usize) {
        self.event_count = event_count;
        self.duration = self.started.map(|t| t.elapsed()).unwrap_or_default();
    }
}

///
/// The central managment point for a generic
/// instance of a discrete event based simulation.
///
/// Create an application that implements [`Application`], define its
/// [`EventSet`] and pass it to [`Builder::build`] to obtain a runnable instance.
/// For network simulations use [`Sim`](crate::net::Sim) as the application.
///
pub struct Runtime<App>
where
    App: Application,
{
    /// The contained runtime application, defining globals and the used event set.
    pub app: App,

    state: State,

    limit: RuntimeLimit,

    event_id: EventId,
    itr: usize,

    quiet: bool,
    profiler: Profiler,

    future_event_set: FutureEventSet<App::EventSet>,
}

#[derive(Debug, PartialEq, Eq)]
enum State {
    Ready,
    Running,
}

impl<A> Runtime<A>
where
    A: Application,
{
    ///
    /// Creates a new runtime with default options.
    ///
    pub fn new(app: A) -> Self {
        Builder::new().build(app)
    }

    ///
    /// Returns the number of events that were dispatched on this [`Runtime`] instance.
    ///
    #[inline]
    pub fn num_events_scheduled(&self) -> usize {
        self.event_id
    }

    ///
    /// Returns the number of events that were recieved & handled on this [`Runtime`] instance.
    ///
    pub fn num_events_dispatched(&self) -> usize {
        self.itr
    }

    ///
    /// Returns the number of events that are still waiting to be handled.
    ///
    pub fn num_events_remaining(&self) -> usize {
        self.future_event_set.len()
    }

    ///
    /// Returns the current simulation time.
    ///
    #[allow(clippy::unused_self)]
    pub fn sim_time(&self) -> SimTime {
        SimTime::now()
    }

    /// Runs the application until it terminates or a breaking condition
    /// is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the application has determined that a simulation critical
    /// failure has occurred.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation was allready started.
    pub fn run(mut self) -> Result<(A, SimTime, Profiler), RuntimeError> {
        assert_eq!(
            self.state,
            State::Ready,
            "Runtime::run can only be used for simulations in the ready state"
        );
        self.start();
        self.dispatch_all();
        self.finish()
    }

    /// Starts the simulation manually. If `Runtime::run` is not used, use the combination
    /// of start, dispatch and finish to complete a full execution cycle.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation was allready started.
    pub fn start(&mut self) {
        assert_eq!(
            self.state,
            State::Ready,
            "only a ready simulation can be started"
        );

        if !self.quiet {
            tracing::info!(
                executor = %self.future_event_set.descriptor(),
                limit = %self.limit,
                "Simulation starting"
            );
        }

        self.profiler.start();
        A::at_sim_start(self);

        self.state = State::Running;
    }

    /// Executes the next n events in the runtime queue.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_n_events(&mut self, n: usize) {
        self.dispatch_with_limit(RuntimeLimit::EventCount(self.num_events_dispatched() + n));
    }

    /// Executes runtime events until the runtime reaches the designated time.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_events_until(&mut self, t: SimTime) {
        self.dispatch_with_limit(RuntimeLimit::SimTime(t));
    }

    fn dispatch_with_limit(&mut self, mut limit: RuntimeLimit) {
        mem::swap(&mut self.limit, &mut limit);
        self.dispatch_all();
        self.limit = limit;
    }

    /// Executes runtime events until no events are left, or the limit applies.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_all(&mut self) {
        assert_eq!(
            self.state,
            State::Running,
            "dispatching is only allowed for running simulations"
        );
        while !self.dispatch_event() {}
    }

    /// Decontructs the runtime and returns the application and the final `sim_time`.
    ///
    /// # Errors
    ///
    /// Returns an error if the application has determined that a simulation critical
    /// failure has occurred.
    ///
    /// # Panics
    ///
    /// This function panics if the runtime is has not yet been started.
    pub fn finish(mut self) -> Result<(A, SimTime, Profiler), RuntimeError> {
        assert_eq!(
            self.state,
            State::Running,
            "only a running simulation can be finished"
        );

        A::at_sim_end(&mut self)?;
        self.profiler.finish(self.itr);

        let time = self.sim_time();
        if !self.quiet {
            if self.future_event_set.is_empty() {
                tracing::info!("Simulation ended at event #{} after {}", self.itr, time);
            } else {
                tracing::info!(
                    "Simulation ended prematurly at event #{} with {} active events after {}",
                    self.itr,
                    self.future_event_set.len(),
                    time
                );
            }
        }

        Ok((self.app, time, self.profiler))
    }

    /// Processes the next event in the future event list by calling its handler.
    /// Returns `true` if the simulation should stop.
    fn dispatch_event(&mut self) -> bool {
        let Some(time) = self.future_event_set.peek_time() else {
            return true;
        };

        if self.limit.applies(self.itr + 1, time) {
            return true;
        }

        let Some(node) = self.future_event_set.fetch_next() else {
            return true;
        };
        self.itr += 1;

        // Let this be the only position where SimTime is changed
        SimTime::set_now(node.time);

        node.event.handle(self);

        false
    }

    ///
    /// Adds and event to the future event heap, that will be handled in 'duration'
    /// time units.
    ///
    pub fn add_event_in(&mut self, event: impl Into<A::EventSet>, duration: impl Into<Duration>) {
        self.add_event(event, self.sim_time() + duration.into());
    }

    ///
    /// Adds and event to the furtue event heap that will be handled at the given time.
    ///
    /// # Panics
    ///
    /// Panics if the time lies before the time of the last handled event.
    ///
    pub fn add_event(&mut self, event: impl Into<A::EventSet>, time: SimTime) {
        self.future_event_set.add(time, self.event_id, event.into());
        self.event_id += 1;
    }
}

impl<A> Debug for Runtime<A>
where
    A: Application,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl<A> Display for Runtime<A>
where
    A: Application,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runtime<{}> {{ sim_time: {} (itr {} / {}) dispached: {} enqueued: {} }}",
            type_name::<A>(),
            self.sim_time(),
            self.num_events_dispatched(),
            self.limit,
            self.num_events_scheduled(),
            self.future_event_set.len()
        )
    }
}
