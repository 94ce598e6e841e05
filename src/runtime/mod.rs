//!
//! Central primitives for running a discrete event simulation.
//!
//! The runtime is the scheduling engine every protocol entity relies on.
//! It owns the application (the entities and their shared environment),
//! a [`Scheduler`] holding the future event set and the seeded random
//! source, and delivers exactly one event at a time in nondecreasing
//! simulation time.
//!

use crate::time::{Duration, SimTime};
use std::{
    any::type_name,
    fmt::{Debug, Display},
    mem,
    sync::MutexGuard,
};

mod event;
pub use self::event::*;

mod scheduler;
pub use self::scheduler::*;

mod timer;
pub use self::timer::*;

mod limit;
pub use self::limit::*;

mod bench;
pub use self::bench::*;

mod builder;
pub use self::builder::*;

mod error;
pub use self::error::*;

///
/// The central managment point for a generic
/// instance of a discrete event based simulation.
///
/// To build a simulation:
///
/// - Create an 'App' struct that implements the trait [`Application`].
///   This struct holds the entities, the shared state and names the event set.
/// - Create your events. Each may implement [`Event`] for your 'App'.
/// - Bind them together in an enum that implements [`EventSet`].
///
/// Event handlers receive the whole runtime. Use [`Runtime::parts`] to borrow
/// the application and the scheduler at the same time.
pub struct Runtime<App>
where
    App: Application,
{
    /// The contained runtime application, defining globals and the used event set.
    pub app: App,

    scheduler: Scheduler<App::EventSet>,
    state: State,

    // Rt limits
    limit: RuntimeLimit,
    itr: usize,

    // Misc
    quiet: bool,
    profiler: Profiler,

    #[allow(dead_code)]
    permit: MutexGuard<'static, ()>,
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
    /// Returns the number of events that were scheduled on this [`Runtime`] instance.
    ///
    #[inline]
    pub fn num_events_scheduled(&self) -> usize {
        self.scheduler.num_scheduled()
    }

    ///
    /// Returns the number of events that were recieved & handled on this [`Runtime`] instance.
    ///
    pub fn num_events_dispatched(&self) -> usize {
        self.itr
    }

    ///
    /// Returns the current simulation time.
    ///
    #[allow(clippy::unused_self)]
    pub fn sim_time(&self) -> SimTime {
        SimTime::now()
    }

    /// Returns a shared reference to the scheduler.
    pub fn scheduler(&self) -> &Scheduler<A::EventSet> {
        &self.scheduler
    }

    /// Returns a mutable reference to the scheduler.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<A::EventSet> {
        &mut self.scheduler
    }

    /// Splits the runtime into the application and the scheduler,
    /// so that entities can be mutated while scheduling new events.
    pub fn parts(&mut self) -> (&mut A, &mut Scheduler<A::EventSet>) {
        (&mut self.app, &mut self.scheduler)
    }
}

impl<A> Runtime<A>
where
    A: Application,
{
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
        // (0) Start sim-start
        self.start();

        // (1) Event main loop
        self.dispatch_all();

        // (2) Finish sim-end
        self.finish()
    }

    /// Starts the simulation manually. If `Runtime::run` is not used, use the combination
    /// of start, dispatch and finish to complete a full execution cycle.
    pub fn start(&mut self) {
        if !self.quiet {
            println!("\u{23A1}");
            println!("\u{23A2} Simulation starting");
            println!("\u{23A2}  Executor := {}", self.scheduler.descriptor());
            println!("\u{23A2}  Event limit := {}", self.limit);
            println!("\u{23A3}");
        }

        self.profiler.start();
        A::Lifecycle::at_sim_start(self);

        self.state = State::Running;
    }

    /// Executes the next n events in the runtime queue.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_n_events(&mut self, n: usize) {
        assert_eq!(
            self.state,
            State::Running,
            "dispatching is only allowed for running simulations"
        );

        let mut limit = RuntimeLimit::EventCount(self.num_events_dispatched() + n);
        mem::swap(&mut self.limit, &mut limit);
        self.dispatch_all();
        self.limit = limit;
    }

    /// Executes runtime events until the runtime reaches the designated time.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_events_until(&mut self, t: SimTime) {
        assert_eq!(
            self.state,
            State::Running,
            "dispatching is only allowed for running simulations"
        );

        let mut limit = RuntimeLimit::SimTime(t);
        mem::swap(&mut self.limit, &mut limit);
        self.dispatch_all();
        self.limit = limit;
    }

    /// Executes runtime events until the event set is empty or the limit applies.
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

        A::Lifecycle::at_sim_end(&mut self)?;
        self.profiler.finish(self.itr);

        let time = self.sim_time();
        if !self.quiet {
            println!("\u{23A1}");
            if self.scheduler.is_empty() {
                println!("\u{23A2} Simulation ended");
                println!("\u{23A2}  Ended at event #{} after {}", self.itr, time);
            } else {
                println!("\u{23A2} Simulation ended prematurly");
                println!(
                    "\u{23A2}  Ended at event #{} with {} active events after {}",
                    self.itr,
                    self.scheduler.len(),
                    time
                );
            }
            println!("\u{23A3}");
        }

        let Runtime { app, profiler, .. } = self;
        Ok((app, time, profiler))
    }

    /// Processes the next event in the future event set by calling its handler.
    /// Returns `true` if the simulation should stop.
    fn dispatch_event(&mut self) -> bool {
        let Some(time) = self.scheduler.peek_time() else {
            return true;
        };

        if self.limit.reached(self.itr + 1, time) {
            return true;
        }

        let Some((event, time)) = self.scheduler.fetch_next() else {
            return true;
        };

        self.itr += 1;

        // Let this be the only position where SimTime is changed
        SimTime::set_now(time);

        event.handle(self);

        false
    }

    ///
    /// Adds and event to the future event set, that will be handled in 'duration'
    /// time units.
    ///
    pub fn add_event_in(
        &mut self,
        event: impl Into<A::EventSet>,
        duration: impl Into<Duration>,
    ) -> TimerHandle {
        self.scheduler.schedule_in(event, duration.into())
    }

    ///
    /// Adds and event to the future event set that will be handled at the given time.
    /// Note that this time must not lie in the past, or this function will panic.
    ///
    pub fn add_event(&mut self, event: impl Into<A::EventSet>, time: SimTime) -> TimerHandle {
        self.scheduler.schedule_at(event, time)
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
            self.scheduler.len()
        )
    }
}
