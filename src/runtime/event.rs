use crate::runtime::{Runtime, RuntimeError};
use crate::time::SimTime;
use std::{
    cmp,
    collections::{BinaryHeap, VecDeque},
    fmt::Debug,
};

///
/// A trait that defines an runtime application
/// that depends on a event set to be processed by the
/// runtime.
///
pub trait Application: Sized {
    ///
    /// The set of events used in the simulation.
    ///
    type EventSet: EventSet<Self>;

    ///
    /// A function that is called only once at the start of the simulation.
    ///
    fn at_sim_start(_rt: &mut Runtime<Self>) {}

    ///
    /// A function that is called once the simulation reachted its limit.
    ///
    /// # Errors
    ///
    /// Implementations may report a simulation critical failure that
    /// was only detectable once all events were handled.
    ///
    fn at_sim_end(_rt: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        Ok(())
    }
}

///
/// A type that can be used as a wrapper around all events
/// handled by an application A.
///
/// Note that ther is a cyclic dependecy between the event set
/// and the application.
///
pub trait EventSet<App>
where
    App: Application<EventSet = Self>,
{
    ///
    /// A function to handle an upcoming event represented as a instance
    /// of the event set.
    ///
    fn handle(self, rt: &mut Runtime<App>);
}

///
/// A type that can handle an event, specific to the given aplication.
///
/// Events in an event set dont need to implement this trait,
/// but is it advised to use this trait to better isolate different events
/// and their associated data.
///
pub trait Event<App>
where
    App: Application,
{
    ///
    /// A function to handle an upcoming event represented as a specific
    /// instance of a event type.
    ///
    fn handle(self, rt: &mut Runtime<App>);
}

/// A target for newly created events.
pub trait EventSink<E> {
    /// Adds an event to be handled at the given time.
    fn add(&mut self, event: E, time: SimTime);
}

impl<A: Application> EventSink<A::EventSet> for Runtime<A> {
    fn add(&mut self, event: A::EventSet, time: SimTime) {
        self.add_event(event, time);
    }
}

impl<E> EventSink<E> for Vec<(E, SimTime)> {
    fn add(&mut self, event: E, time: SimTime) {
        self.push((event, time));
    }
}

///
/// A runtime unqiue identifier for a event.
///
pub(crate) type EventId = usize;

pub(crate) struct EventNode<E> {
    pub(crate) time: SimTime,
    pub(crate) id: EventId,
    pub(crate) event: E,
}

impl<E> PartialEq for EventNode<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl<E> Eq for EventNode<E> {}

impl<E> PartialOrd for EventNode<E> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed since the heap is a max-heap. Ties are broken by id so that
// events at equal times are handled in insertion order.
impl<E> Ord for EventNode<E> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<E> Debug for EventNode<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNode")
            .field("time", &self.time)
            .field("id", &self.id)
            .finish()
    }
}

pub(crate) struct FutureEventSet<E> {
    heap: BinaryHeap<EventNode<E>>,
    zero_queue: VecDeque<EventNode<E>>,

    last_event_simtime: SimTime,
}

impl<E> FutureEventSet<E> {
    pub(crate) fn new(start_time: SimTime) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(64),
            zero_queue: VecDeque::with_capacity(32),

            last_event_simtime: start_time,
        }
    }

    pub(crate) fn descriptor(&self) -> String {
        "FutureEventSet::BinaryHeap()".to_string()
    }

    pub(crate) fn len(&self) -> usize {
        self.zero_queue.len() + self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty() && self.zero_queue.is_empty()
    }

    /// The time of the next event, if any.
    pub(crate) fn peek_time(&self) -> Option<SimTime> {
        if let Some(node) = self.zero_queue.front() {
            return Some(node.time);
        }
        self.heap.peek().map(|node| node.time)
    }

    pub(crate) fn fetch_next(&mut self) -> Option<EventNode<E>> {
        let node = match self.zero_queue.pop_front() {
            Some(node) => node,
            None => self.heap.pop()?,
        };
        self.last_event_simtime = node.time;
        Some(node)
    }

    pub(crate) fn add(&mut self, time: SimTime, id: EventId, event: E) {
        assert!(
            time >= self.last_event_simtime,
            "Sorry we cannot timetravel yet"
        );

        let node = EventNode { time, id, event };
        if time == self.last_event_simtime && self.heap.peek().is_none_or(|n| n.time > time) {
            self.zero_queue.push_back(node);
        } else {
            self.heap.push(node);
        }
    }
}
