use crate::time::{Duration, SimTime};
use fxhash::FxHashSet;
use rand::{rngs::StdRng, Rng};
use std::{cmp::Ordering, collections::BinaryHeap, fmt::Debug};

///
/// A runtime unqiue identifier for a scheduled event.
///
pub(crate) type EventId = u64;

///
/// An opaque handle to a scheduled event, usable to cancel the
/// event before it is delivered.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(EventId);

struct EventNode<E> {
    time: SimTime,
    id: EventId,
    event: E,
}

impl<E> PartialEq for EventNode<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl<E> Eq for EventNode<E> {}

impl<E> PartialOrd for EventNode<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for EventNode<E> {
    // Reversed, since the BinaryHeap is a max-heap. Ties are resolved by
    // scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

///
/// The future event set of a runtime together with the seeded random
/// source all entities draw from.
///
/// Cancellation is lazy: a cancelled event leaves the live set at once,
/// its queue node is dropped once it reaches the head of the heap.
///
pub struct Scheduler<E> {
    heap: BinaryHeap<EventNode<E>>,
    live: FxHashSet<EventId>,
    next_id: EventId,
    /// The due time of the last delivered event, or the start time.
    now: SimTime,

    rng: StdRng,
}

impl<E> Scheduler<E> {
    pub(crate) fn new(rng: StdRng, start_time: SimTime) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(64),
            live: FxHashSet::default(),
            next_id: 0,
            now: start_time,
            rng,
        }
    }

    pub(crate) fn descriptor(&self) -> String {
        "FutureEventSet::BinaryHeap()".to_string()
    }

    /// Returns the current simulation time, as seen by the event being handled.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The number of live (not cancelled, not yet delivered) events.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no live events remain.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// The total number of events ever scheduled.
    pub fn num_scheduled(&self) -> usize {
        usize::try_from(self.next_id).unwrap_or(usize::MAX)
    }

    ///
    /// Schedules an event at the given point in time.
    ///
    /// # Panics
    ///
    /// Panics if `time` lies before the time of the last delivered event.
    ///
    pub fn schedule_at(&mut self, event: impl Into<E>, time: SimTime) -> TimerHandle {
        assert!(
            time >= self.now,
            "Sorry we cannot timetravel yet"
        );

        let id = self.next_id;
        self.next_id += 1;

        self.live.insert(id);
        self.heap.push(EventNode {
            time,
            id,
            event: event.into(),
        });

        TimerHandle(id)
    }

    ///
    /// Schedules an event `delay` after the current simulation time.
    ///
    pub fn schedule_in(&mut self, event: impl Into<E>, delay: Duration) -> TimerHandle {
        let time = self.now() + delay;
        self.schedule_at(event, time)
    }

    ///
    /// Cancels a pending event. Returns `false` if the event was allready
    /// delivered or cancelled.
    ///
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.live.remove(&handle.0)
    }

    /// Whether the event behind the handle is still to be delivered.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.live.contains(&handle.0)
    }

    /// Iterates over all live events, in no particular order.
    pub fn pending(&self) -> impl Iterator<Item = (SimTime, &E)> {
        self.heap
            .iter()
            .filter(|node| self.live.contains(&node.id))
            .map(|node| (node.time, &node.event))
    }

    /// Samples an integer uniformly from `lo..=hi`.
    pub fn uniform_int(&mut self, lo: u64, hi: u64) -> u64 {
        self.rng.random_range(lo..=hi)
    }

    /// Samples a real number uniformly from `[0, 1)`.
    pub fn uniform_real(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn drop_cancelled_head(&mut self) {
        while let Some(head) = self.heap.peek() {
            if self.live.contains(&head.id) {
                break;
            }
            self.heap.pop();
        }
    }

    pub(crate) fn peek_time(&mut self) -> Option<SimTime> {
        self.drop_cancelled_head();
        self.heap.peek().map(|node| node.time)
    }

    pub(crate) fn fetch_next(&mut self) -> Option<(E, SimTime)> {
        self.drop_cancelled_head();
        let node = self.heap.pop()?;
        self.live.remove(&node.id);
        self.now = node.time;
        Some((node.event, node.time))
    }
}

impl<E> Debug for Scheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("live", &self.live.len())
            .field("queued", &self.heap.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn scheduler() -> Scheduler<usize> {
        Scheduler::new(StdRng::seed_from_u64(123), SimTime::ZERO)
    }

    #[test]
    fn delivers_in_time_then_schedule_order() {
        let mut sched = scheduler();
        sched.schedule_at(3usize, SimTime::from(2.0));
        sched.schedule_at(1usize, SimTime::from(1.0));
        sched.schedule_at(2usize, SimTime::from(1.0));
        sched.schedule_at(0usize, SimTime::ZERO);

        let order = std::iter::from_fn(|| sched.fetch_next().map(|(e, _)| e)).collect::<Vec<_>>();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(sched.is_empty());
        assert_eq!(sched.num_scheduled(), 4);
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let mut sched = scheduler();
        let a = sched.schedule_at(1usize, SimTime::from(1.0));
        let b = sched.schedule_at(2usize, SimTime::from(2.0));
        assert_eq!(sched.len(), 2);

        assert!(sched.cancel(a));
        assert!(!sched.cancel(a));
        assert!(!sched.is_pending(a));
        assert!(sched.is_pending(b));
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.pending().count(), 1);

        assert_eq!(sched.peek_time(), Some(SimTime::from(2.0)));
        assert_eq!(sched.fetch_next().map(|(e, _)| e), Some(2));
        assert!(!sched.is_pending(b));
        assert_eq!(sched.fetch_next().map(|(e, _)| e), None);
    }

    #[test]
    fn clock_follows_delivered_events() {
        let mut sched = Scheduler::new(StdRng::seed_from_u64(123), SimTime::from(3.0));
        assert_eq!(sched.now(), SimTime::from(3.0));

        sched.schedule_in(1usize, Duration::from_secs(1));
        assert_eq!(sched.peek_time(), Some(SimTime::from(4.0)));
        assert_eq!(sched.now(), SimTime::from(3.0));

        assert_eq!(sched.fetch_next(), Some((1, SimTime::from(4.0))));
        assert_eq!(sched.now(), SimTime::from(4.0));
        sched.schedule_in(2usize, Duration::ZERO);
        assert_eq!(sched.peek_time(), Some(SimTime::from(4.0)));
    }

    #[test]
    #[should_panic(expected = "timetravel")]
    fn no_scheduling_into_the_past() {
        let mut sched = scheduler();
        sched.schedule_at(1usize, SimTime::from(5.0));
        let _ = sched.fetch_next();
        sched.schedule_at(2usize, SimTime::from(1.0));
    }

    #[test]
    fn uniform_int_is_inclusive() {
        let mut sched = scheduler();
        let mut seen = [false; 5];
        for _ in 0..1000 {
            let v = sched.uniform_int(0, 4);
            seen[usize::try_from(v).unwrap()] = true;
        }
        assert!(seen.iter().all(|s| *s));

        for _ in 0..1000 {
            let v = sched.uniform_real();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
