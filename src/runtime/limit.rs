use crate::time::SimTime;
use std::{fmt::Display, mem};

///
/// A composed limit that terminates the event execution of
/// a runtime.
///
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RuntimeLimit {
    /// A unbounded runtime. A runtime with this limit will
    /// only finish if the all events are handled and no new
    /// events have been created.
    #[default]
    None,

    /// A bound based on the number of executed events.
    EventCount(usize),

    /// A bound based on the simulation time. Events scheduled
    /// after the given time remain in the future event set.
    SimTime(SimTime),

    /// Both limits must apply to terminate the simulation.
    CombinedAnd(Box<RuntimeLimit>, Box<RuntimeLimit>),

    /// One of the limits must apply to terminate the simulation.
    CombinedOr(Box<RuntimeLimit>, Box<RuntimeLimit>),
}

impl RuntimeLimit {
    pub(crate) fn applies(&self, itr_count: usize, time: SimTime) -> bool {
        match self {
            Self::None => false,

            Self::EventCount(e) => itr_count > *e,
            Self::SimTime(t) => time > *t,

            Self::CombinedAnd(lhs, rhs) => {
                lhs.applies(itr_count, time) && rhs.applies(itr_count, time)
            }
            Self::CombinedOr(lhs, rhs) => {
                lhs.applies(itr_count, time) || rhs.applies(itr_count, time)
            }
        }
    }

    pub(crate) fn add(&mut self, limit: RuntimeLimit) {
        if matches!(self, Self::None) {
            *self = limit;
        } else {
            let other = mem::take(self);
            *self = Self::CombinedOr(Box::new(other), Box::new(limit));
        }
    }
}

impl Display for RuntimeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),

            Self::EventCount(e) => write!(f, "MaxEventCount({e})"),
            Self::SimTime(t) => write!(f, "MaxSimTime({t})"),

            Self::CombinedAnd(lhs, rhs) => write!(f, "{lhs} and {rhs}"),
            Self::CombinedOr(lhs, rhs) => write!(f, "{lhs} or {rhs}"),
        }
    }
}
