use super::{NetEvents, ScheduledFn, Sim};
use crate::runtime::Runtime;
use crate::time::{Duration, SimTime};
use std::{cell::RefCell, mem};

type EventBuffer = Vec<(NetEvents, SimTime)>;

thread_local! {
    // Events created by devices and channels, not yet known to the runtime.
    static BUF_CTX: RefCell<EventBuffer> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn buf_schedule_at(event: NetEvents, time: SimTime) {
    BUF_CTX.with(|ctx| ctx.borrow_mut().push((event, time)));
}

pub(crate) fn buf_schedule_in(event: NetEvents, duration: Duration) {
    buf_schedule_at(event, SimTime::now() + duration);
}

pub(crate) fn buf_process<A>(rt: &mut Runtime<Sim<A>>) {
    let events = BUF_CTX.with(|ctx| mem::take(&mut *ctx.borrow_mut()));
    for (event, time) in events {
        rt.add_event(event, time);
    }
}

///
/// The number of events scheduled on this thread that were not yet
/// handed over to a runtime.
///
#[must_use]
pub fn num_buffered_events() -> usize {
    BUF_CTX.with(|ctx| ctx.borrow().len())
}

///
/// Schedules a closure to be executed at the given time.
///
/// Scheduled events are buffered and handed over to the runtime once the
/// current event is handled, or when the simulation starts.
///
pub fn schedule_at(time: SimTime, f: impl FnOnce() + 'static) {
    buf_schedule_at(NetEvents::Scheduled(ScheduledFn(Box::new(f))), time);
}

///
/// Schedules a closure to be executed after the given duration.
///
pub fn schedule_in(duration: Duration, f: impl FnOnce() + 'static) {
    schedule_at(SimTime::now() + duration, f);
}
