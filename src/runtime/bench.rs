use std::time::{Duration, Instant};

/// A run profiler, measuring the real time spent in a simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profiler {
    time_start: Instant,
    /// The wall-clock duration of the simulation.
    pub duration: Duration,
    /// The number of events that where executed.
    pub event_count: usize,
}

impl Profiler {
    /// Starts the profile.
    pub(super) fn start(&mut self) {
        self.time_start = Instant::now();
    }

    /// Finishes the profile.
    pub(super) fn finish(&mut self, event_count: usize) {
        self.event_count = event_count;
        self.duration = self.time_start.elapsed();
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self {
            time_start: Instant::now(),
            duration: Duration::ZERO,
            event_count: 0,
        }
    }
}
