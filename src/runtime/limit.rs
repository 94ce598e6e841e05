use crate::time::SimTime;
use std::fmt::Display;

///
/// A condition under which the runtime stops dispatching,
/// even though live events remain.
///
/// The event that would cross the limit stays in the future event set,
/// so a stepped runtime can continue from exactly that point.
///
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RuntimeLimit {
    /// Run until the future event set drains.
    #[default]
    None,
    /// Stop once this many events were dispatched in total.
    EventCount(usize),
    /// Stop before the first event due after this instant.
    SimTime(SimTime),
    /// Stop as soon as either limit is reached.
    Either(Box<RuntimeLimit>, Box<RuntimeLimit>),
}

impl RuntimeLimit {
    /// Whether dispatching the `nth` event (counting from 1), due at `due`,
    /// would cross this limit.
    pub(crate) fn reached(&self, nth: usize, due: SimTime) -> bool {
        match self {
            Self::None => false,
            Self::EventCount(max) => nth > *max,
            Self::SimTime(end) => due > *end,
            Self::Either(a, b) => a.reached(nth, due) || b.reached(nth, due),
        }
    }

    /// Combines two limits, stopping at whichever comes first.
    #[must_use]
    pub fn or(self, other: RuntimeLimit) -> RuntimeLimit {
        match (self, other) {
            (Self::None, limit) | (limit, Self::None) => limit,
            (a, b) => Self::Either(Box::new(a), Box::new(b)),
        }
    }
}

impl Display for RuntimeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("unbounded"),
            Self::EventCount(max) => write!(f, "{max} events"),
            Self::SimTime(end) => write!(f, "t <= {end}"),
            Self::Either(a, b) => write!(f, "{a} or {b}"),
        }
    }
}
