use std::{
    fmt::Debug,
    mem,
    sync::{Mutex, TryLockError},
};

use rand::{rngs::StdRng, SeedableRng};

use crate::time::SimTime;

use super::{Application, Profiler, Runtime, RuntimeLimit, Scheduler, State};

/// A lock the ensures only one runtime exits at a time.
static SIMULATION_LOCK: Mutex<()> = Mutex::new(());

/// A builder for a runtime instance.
#[must_use]
pub struct Builder {
    quiet: bool,
    rng: StdRng,
    limit: RuntimeLimit,
    start_time: SimTime,
}

impl Builder {
    /// Creates a new unconfigured builder, seeded from the OS.
    pub fn new() -> Builder {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a `Builder` with a static seeded RNG.
    pub fn seeded(seed: u64) -> Builder {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Builder {
        Builder {
            quiet: false,
            rng,
            limit: RuntimeLimit::None,
            start_time: SimTime::MIN,
        }
    }

    ///
    /// Suppressed runtime messages from the simulation framework.
    ///
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    ///
    /// Changes the point in time where the simulation starts.
    ///
    pub fn start_time(mut self, time: SimTime) -> Self {
        self.start_time = time;
        self
    }

    ///
    /// Changes the maximum iteration number of a runtime.
    ///
    pub fn max_itr(mut self, max_itr: usize) -> Self {
        self.limit = mem::take(&mut self.limit).or(RuntimeLimit::EventCount(max_itr));
        self
    }

    ///
    /// Changes the maximum time of the runtime (default: inf).
    ///
    pub fn max_time(mut self, max_time: SimTime) -> Self {
        self.limit = mem::take(&mut self.limit).or(RuntimeLimit::SimTime(max_time));
        self
    }

    ///
    /// Adds a custom limit to the end of the runtime.
    ///
    pub fn limit(mut self, limit: RuntimeLimit) -> Self {
        self.limit = mem::take(&mut self.limit).or(limit);
        self
    }

    ///
    /// Builds a new [`Runtime`] instance, using an application as core.
    ///
    /// If another runtime still exists, this call blocks until it is dropped,
    /// since the simulation time is global to the process.
    ///
    pub fn build<A: Application>(self, app: A) -> Runtime<A> {
        let permit = match SIMULATION_LOCK.try_lock() {
            Ok(permit) => permit,
            Err(TryLockError::WouldBlock) => {
                tracing::warn!("another runtime allready exists ... waiting for simlock");
                SIMULATION_LOCK
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
            }
            Err(TryLockError::Poisoned(p)) => {
                tracing::warn!("another runtime poisoned the simlock ... cleaning up");
                p.into_inner()
            }
        };

        SimTime::set_now(self.start_time);

        Runtime {
            app,
            scheduler: Scheduler::new(self.rng, self.start_time),
            state: State::Ready,

            limit: self.limit,
            itr: 0,

            quiet: self.quiet,
            profiler: Profiler::default(),

            permit,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("quiet", &self.quiet)
            .field("limit", &self.limit)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}
