//!
//! Named packet events and their subscriptions.
//!
//! Devices publish what happens to packets through [`TracedCallback`]s,
//! each registered under a well-known name. Observers attach a
//! [`TraceSink`] by name through the [`TraceSource`] trait, optionally
//! binding a context string that is passed along with every firing.
//!

use super::Packet;
use std::{
    cell::RefCell,
    fmt::Debug,
    rc::{Rc, Weak},
};

/// A packet has arrived for transmission by a device.
pub const MAC_TX: &str = "MacTx";
/// A packet was dropped by a device before transmission.
pub const MAC_TX_DROP: &str = "MacTxDrop";
/// A received packet is passed up, promiscuous.
pub const MAC_PROMISC_RX: &str = "MacPromiscRx";
/// A received packet is passed up, non-promiscuous.
pub const MAC_RX: &str = "MacRx";
/// A packet has begun transmitting over the channel.
pub const PHY_TX_BEGIN: &str = "PhyTxBegin";
/// A packet has been completely transmitted over the channel.
pub const PHY_TX_END: &str = "PhyTxEnd";
/// A packet was dropped during transmission.
pub const PHY_TX_DROP: &str = "PhyTxDrop";
/// A packet has been completely received.
pub const PHY_RX_END: &str = "PhyRxEnd";
/// A packet was dropped during reception.
pub const PHY_RX_DROP: &str = "PhyRxDrop";
/// A non-promiscuous packet sniffer attached to a device.
pub const SNIFFER: &str = "Sniffer";
/// A promiscuous packet sniffer attached to a device.
pub const PROMISC_SNIFFER: &str = "PromiscSniffer";

///
/// A handler for packet events.
///
/// The first argument is the context bound at subscription time, if any.
/// Sinks are compared by identity, so the same sink (or a clone of it)
/// must be used to disconnect it again.
///
#[derive(Clone)]
pub struct TraceSink(Rc<dyn Fn(Option<&str>, &Packet)>);

impl TraceSink {
    /// Creates a sink that ignores the context.
    pub fn new(f: impl Fn(&Packet) + 'static) -> Self {
        Self(Rc::new(move |_, packet| f(packet)))
    }

    /// Creates a sink that receives the context.
    pub fn with_context(f: impl Fn(Option<&str>, &Packet) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invokes the sink.
    pub fn call(&self, context: Option<&str>, packet: &Packet) {
        (self.0)(context, packet);
    }
}

impl PartialEq for TraceSink {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl Eq for TraceSink {}

impl Debug for TraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TraceSink({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

///
/// A single named event source with any number of subscribed sinks.
///
#[derive(Debug)]
pub struct TracedCallback {
    name: &'static str,
    sinks: RefCell<Vec<(TraceSink, Option<String>)>>,
}

impl TracedCallback {
    /// Creates a new event source without subscribers.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            sinks: RefCell::new(Vec::new()),
        }
    }

    /// The name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Subscribes a sink, with an optional context.
    pub fn connect(&self, sink: TraceSink, context: Option<&str>) {
        self.sinks
            .borrow_mut()
            .push((sink, context.map(str::to_string)));
    }

    /// Removes all subscriptions of the sink with the same context.
    /// Returns whether any subscription was removed.
    pub fn disconnect(&self, sink: &TraceSink, context: Option<&str>) -> bool {
        let mut sinks = self.sinks.borrow_mut();
        let len = sinks.len();
        sinks.retain(|(s, ctx)| !(s == sink && ctx.as_deref() == context));
        sinks.len() != len
    }

    /// The number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.borrow().len()
    }

    /// Whether no sink is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.borrow().is_empty()
    }

    /// Drops all subscriptions.
    pub fn clear(&self) {
        self.sinks.borrow_mut().clear();
    }

    /// Fires the event, calling every subscribed sink in subscription order.
    ///
    /// Sinks may subscribe or unsubscribe while the event fires, such changes
    /// apply to the next firing.
    pub fn fire(&self, packet: &Packet) {
        let sinks = self.sinks.borrow().clone();
        for (sink, context) in &sinks {
            sink.call(context.as_deref(), packet);
        }
    }
}

///
/// An object publishing named packet events.
///
pub trait TraceSource {
    ///
    /// Subscribes a sink to the event `name`.
    ///
    /// Returns `false` if the object has no event with that name.
    ///
    fn trace_connect(&self, name: &str, context: Option<&str>, sink: TraceSink) -> bool;

    ///
    /// Removes a subscription from the event `name`.
    ///
    /// Returns `false` if the object has no event with that name.
    ///
    fn trace_disconnect(&self, name: &str, context: Option<&str>, sink: &TraceSink) -> bool;
}

///
/// Exposes one named event that originates from one or two underlying
/// trace sources, through a single subscription point.
///
/// Every subscription is applied to each present target under the same
/// name. If both targets fire the event for the same occurrence, a sink
/// observes it twice, in no guaranteed order. A fan-out with a single
/// target never duplicates deliveries.
///
/// Targets are held weakly, a fan-out never keeps its targets alive.
///
pub struct TraceFanout {
    name: &'static str,
    primary: Weak<dyn TraceSource>,
    secondary: Option<Weak<dyn TraceSource>>,
}

impl TraceFanout {
    ///
    /// Creates a new fan-out for the event `name`.
    ///
    /// # Panics
    ///
    /// Panics if no primary target is provided.
    ///
    #[must_use]
    pub fn new(
        name: &'static str,
        primary: Option<Weak<dyn TraceSource>>,
        secondary: Option<Weak<dyn TraceSource>>,
    ) -> Self {
        let Some(primary) = primary else {
            panic!("trace fan-out '{name}' requires a primary target");
        };
        Self {
            name,
            primary,
            secondary,
        }
    }

    /// The name of the multiplexed event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The number of targets.
    #[must_use]
    pub fn num_targets(&self) -> usize {
        1 + usize::from(self.secondary.is_some())
    }

    /// Subscribes a sink without context to every target.
    ///
    /// # Panics
    ///
    /// Panics if the primary target no longer exists.
    pub fn connect_without_context(&self, sink: TraceSink) {
        self.apply(|target| target.trace_connect(self.name, None, sink.clone()));
    }

    /// Subscribes a sink with context to every target.
    ///
    /// # Panics
    ///
    /// Panics if the primary target no longer exists.
    pub fn connect(&self, sink: TraceSink, context: &str) {
        self.apply(|target| target.trace_connect(self.name, Some(context), sink.clone()));
    }

    /// Removes a sink without context from every target.
    ///
    /// # Panics
    ///
    /// Panics if the primary target no longer exists.
    pub fn disconnect_without_context(&self, sink: &TraceSink) {
        self.apply(|target| target.trace_disconnect(self.name, None, sink));
    }

    /// Removes a sink with context from every target.
    ///
    /// # Panics
    ///
    /// Panics if the primary target no longer exists.
    pub fn disconnect(&self, sink: &TraceSink, context: &str) {
        self.apply(|target| target.trace_disconnect(self.name, Some(context), sink));
    }

    fn apply(&self, f: impl Fn(&dyn TraceSource) -> bool) {
        let Some(primary) = self.primary.upgrade() else {
            panic!("trace fan-out '{}' has no primary target", self.name);
        };

        let found = f(&*primary);
        debug_assert!(found, "primary target has no event '{}'", self.name);

        if let Some(secondary) = self.secondary.as_ref().and_then(Weak::upgrade) {
            let found = f(&*secondary);
            debug_assert!(found, "secondary target has no event '{}'", self.name);
        }
    }
}

impl Debug for TraceFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceFanout")
            .field("name", &self.name)
            .field("targets", &self.num_targets())
            .finish()
    }
}
