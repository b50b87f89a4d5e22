use super::{Channel, Node};
use crate::runtime::{Application, Runtime, RuntimeError};
use std::{fmt::Debug, rc::Rc};

mod events;
pub use self::events::*;

mod ctx;
pub(crate) use self::ctx::{buf_process, buf_schedule_at, buf_schedule_in};
pub use self::ctx::{num_buffered_events, schedule_at, schedule_in};

///
/// A runtime application for network simulations.
///
/// Holds the nodes and channels of the simulated topology, so that they
/// live as long as the simulation, and a user defined inner value.
///
pub struct Sim<A = ()> {
    nodes: Vec<Rc<Node>>,
    channels: Vec<Rc<dyn Channel>>,

    ///
    /// A inner container for holding user defined global state.
    ///
    pub inner: A,
}

impl<A> Sim<A> {
    ///
    /// Creates a new instance by wrapping 'inner' into an empty `Sim<A>`.
    ///
    #[must_use]
    pub fn new(inner: A) -> Self {
        Self {
            nodes: Vec::new(),
            channels: Vec::new(),
            inner,
        }
    }

    /// Registers a node with the simulation.
    pub fn add_node(&mut self, node: Rc<Node>) {
        self.nodes.push(node);
    }

    /// Registers a channel with the simulation.
    pub fn add_channel(&mut self, channel: Rc<dyn Channel>) {
        self.channels.push(channel);
    }

    /// The registered nodes.
    #[must_use]
    pub fn nodes(&self) -> &[Rc<Node>] {
        &self.nodes
    }

    /// The registered channels.
    #[must_use]
    pub fn channels(&self) -> &[Rc<dyn Channel>] {
        &self.channels
    }

    ///
    /// Drops all nodes and channels and only returns the inner value.
    ///
    #[must_use]
    pub fn finish(self) -> A {
        self.inner
    }
}

impl Default for Sim<()> {
    fn default() -> Self {
        Self::new(())
    }
}

impl<A> Application for Sim<A> {
    type EventSet = NetEvents;

    fn at_sim_start(rt: &mut Runtime<Self>) {
        tracing::debug!(
            nodes = rt.app.nodes.len(),
            channels = rt.app.channels.len(),
            "starting network simulation"
        );
        buf_process(rt);
    }

    fn at_sim_end(rt: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        tracing::debug!(
            remaining = rt.num_events_remaining(),
            "network simulation ended"
        );
        Ok(())
    }
}

impl<A> Debug for Sim<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sim")
            .field("nodes", &self.nodes.len())
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Builder;
    use crate::time::{Duration, SimTime};
    use std::cell::RefCell;

    #[test]
    fn scheduled_closures_run_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        schedule_in(Duration::from_secs(2), move || l.borrow_mut().push(('b', SimTime::now())));
        let l = log.clone();
        schedule_in(Duration::from_secs(1), move || {
            l.borrow_mut().push(('a', SimTime::now()));
            let l = l.clone();
            schedule_in(Duration::ZERO, move || l.borrow_mut().push(('c', SimTime::now())));
        });
        assert_eq!(num_buffered_events(), 2);

        let rt = Builder::seeded(0).quiet().build(Sim::default());
        let (_, time, _) = rt.run().unwrap();

        assert_eq!(num_buffered_events(), 0);
        assert_eq!(time, SimTime::from(2.0));
        assert_eq!(
            *log.borrow(),
            vec![
                ('a', SimTime::from(1.0)),
                ('c', SimTime::from(1.0)),
                ('b', SimTime::from(2.0))
            ]
        );
    }
}
