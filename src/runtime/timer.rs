use super::{Scheduler, TimerHandle};
use crate::time::{Duration, SimTime};
use fxhash::FxHashMap;
use std::{fmt::Debug, hash::Hash};

///
/// A typed registry of the timers owned by one entity.
///
/// Each slot (usually a variant of a small enum like `Backoff` or `RadioOff`)
/// holds at most one live event. [`TimerSlots::rearm`] cancels the previous
/// occupant before scheduling, [`TimerSlots::arm`] expects the slot to be
/// empty and panics otherwise.
///
/// When a timer event is delivered, the owner must call [`TimerSlots::fired`]
/// before acting on it, so the slot is free to be armed again.
///
#[derive(Debug)]
pub struct TimerSlots<S> {
    slots: FxHashMap<S, TimerHandle>,
}

impl<S> TimerSlots<S>
where
    S: Copy + Eq + Hash + Debug,
{
    /// Creates a registry with all slots empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: FxHashMap::default(),
        }
    }

    ///
    /// Schedules `event` into an empty slot, `delay` from now.
    ///
    /// # Panics
    ///
    /// Panics if the slot still holds a pending event.
    ///
    pub fn arm<E>(
        &mut self,
        sched: &mut Scheduler<E>,
        slot: S,
        event: impl Into<E>,
        delay: Duration,
    ) -> TimerHandle {
        let time = sched.now() + delay;
        self.arm_at(sched, slot, event, time)
    }

    ///
    /// Schedules `event` into an empty slot at an absolute time.
    ///
    /// # Panics
    ///
    /// Panics if the slot still holds a pending event.
    ///
    pub fn arm_at<E>(
        &mut self,
        sched: &mut Scheduler<E>,
        slot: S,
        event: impl Into<E>,
        time: SimTime,
    ) -> TimerHandle {
        if let Some(occupant) = self.slots.get(&slot) {
            assert!(
                !sched.is_pending(*occupant),
                "timer slot {slot:?} armed while still pending ({occupant:?})"
            );
        }

        let handle = sched.schedule_at(event, time);
        self.slots.insert(slot, handle);
        handle
    }

    ///
    /// Cancels the occupant of the slot (if any) and schedules `event`
    /// `delay` from now.
    ///
    pub fn rearm<E>(
        &mut self,
        sched: &mut Scheduler<E>,
        slot: S,
        event: impl Into<E>,
        delay: Duration,
    ) -> TimerHandle {
        self.cancel(sched, slot);
        self.arm(sched, slot, event, delay)
    }

    /// Cancels the pending event of a slot. Returns whether an event was cancelled.
    pub fn cancel<E>(&mut self, sched: &mut Scheduler<E>, slot: S) -> bool {
        match self.slots.remove(&slot) {
            Some(handle) => sched.cancel(handle),
            None => false,
        }
    }

    /// Marks the timer of a slot as delivered.
    pub fn fired(&mut self, slot: S) -> Option<TimerHandle> {
        self.slots.remove(&slot)
    }

    /// Whether the slot currently holds a timer.
    pub fn is_armed(&self, slot: S) -> bool {
        self.slots.contains_key(&slot)
    }

    /// The handle currently stored in a slot.
    pub fn handle(&self, slot: S) -> Option<TimerHandle> {
        self.slots.get(&slot).copied()
    }

    /// Iterates over all armed slots.
    pub fn armed(&self) -> impl Iterator<Item = (S, TimerHandle)> + '_ {
        self.slots.iter().map(|(slot, handle)| (*slot, *handle))
    }
}

impl<S> Default for TimerSlots<S>
where
    S: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
