use crate::runtime::{Runtime, RuntimeError};

///
/// A simulation model: the entities with their shared state, together
/// with the events that drive them.
///
/// The runtime owns the application for the whole run and hands it back
/// from [`Runtime::finish`], so final counters are read from it directly.
///
pub trait Application: Sized {
    /// Everything that can be scheduled in this model.
    type EventSet: EventSet<Self>;
    /// Hooks run before the first and after the last event. Use `()` for none.
    type Lifecycle: EventLifecycle<Self>;
}

///
/// The closed set of events of one application, usually an enum that
/// forwards each variant to its [`Event`] impl.
///
pub trait EventSet<App: Application> {
    /// Delivers the event. The runtime clock already shows its due time.
    fn handle(self, rt: &mut Runtime<App>);
}

///
/// A single kind of event.
///
/// Optional, but keeps each handler next to the data it carries instead of
/// one large match in the event set.
///
pub trait Event<App: Application> {
    /// Delivers the event. The runtime clock already shows its due time.
    fn handle(self, rt: &mut Runtime<App>);
}

/// Start and end hooks of an application.
pub trait EventLifecycle<App: Application> {
    /// Runs once in [`Runtime::start`], usually to arm the first timers.
    fn at_sim_start(_rt: &mut Runtime<App>) {}

    ///
    /// Runs once in [`Runtime::finish`], after the last dispatched event.
    ///
    /// # Errors
    ///
    /// An error here is returned from [`Runtime::finish`] (and [`Runtime::run`])
    /// instead of the application.
    ///
    fn at_sim_end(_rt: &mut Runtime<App>) -> Result<(), RuntimeError> {
        Ok(())
    }
}

impl<App: Application> EventLifecycle<App> for () {}
