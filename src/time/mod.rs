//!
//! Temporal quantification in a simulation context.
//!
//! All quantities in a simulation are virtual. A [`SimTime`] is a point
//! in simulated time, measured as a [`Duration`] since the simulation
//! started. The current time is only ever advanced by the
//! [`Runtime`](crate::runtime::Runtime) when it dispatches an event.
//!
//! ```rust
//! # use wsnsim::time::*;
//! let backoff_period = Duration::from_micros(320);
//! let t = SimTime::ZERO + backoff_period * 8;
//! assert_eq!(t, 0.00256);
//! ```

/// A span of simulated time.
pub use std::time::Duration;

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Deref, Sub};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

static SIMTIME: (AtomicU64, AtomicU32) = (AtomicU64::new(0), AtomicU32::new(0));

///
/// A specific point of time in the simulation.
///
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    /// The start of every simulation.
    pub const ZERO: SimTime = SimTime(Duration::ZERO);
    /// The smallest valid instance of a [`SimTime`].
    pub const MIN: SimTime = SimTime(Duration::ZERO);
    /// The greatest instance of a [`SimTime`].
    pub const MAX: SimTime = SimTime(Duration::MAX);

    /// Returns an instant corresponding to "now" in the simulation context.
    #[must_use]
    pub fn now() -> Self {
        SimTime(Duration::new(
            SIMTIME.0.load(Ordering::SeqCst),
            SIMTIME.1.load(Ordering::SeqCst),
        ))
    }

    /// Sets the sim time. Only the runtime may do this.
    pub(crate) fn set_now(time: SimTime) {
        SIMTIME.0.store(time.as_secs(), Ordering::SeqCst);
        SIMTIME.1.store(time.subsec_nanos(), Ordering::SeqCst);
    }

    ///
    /// Constructs an instance of `SimTime` from a give duration since `SimTime::ZERO`.
    ///
    #[must_use]
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    /// Returns the amount of time elapsed from another instant to this one.
    ///
    /// # Panics
    ///
    /// Panics if `earlier` is later than `self`.
    #[must_use]
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier)
            .expect("duration subtraction invalid")
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or None if that instant is later than this one.
    #[must_use]
    pub fn checked_duration_since(&self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or zero duration if that instant is later than this one.
    #[must_use]
    pub fn saturating_duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier).unwrap_or_default()
    }

    /// Returns `Some(t)` where `t` is the time `self + duration` if `t` can be represented.
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_add(duration).map(SimTime)
    }

    /// Returns `Some(t)` where `t` is the time `self - duration` if `t` can be represented.
    #[must_use]
    pub fn checked_sub(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_sub(duration).map(SimTime)
    }
}

// Serialize as fractional seconds, the unit every protocol parameter uses.

impl Serialize for SimTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if secs.is_finite() && secs >= 0.0 {
            Ok(SimTime::from(secs))
        } else {
            Err(serde::de::Error::custom(
                "expected a positive, finite number of seconds",
            ))
        }
    }
}

// CMP

impl PartialEq<f64> for SimTime {
    fn eq(&self, other: &f64) -> bool {
        let diff = (self.0.as_secs_f64() - *other).abs();
        diff < 1e-8
    }
}

// OPS

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

// Timers only ever move forward, so running past `SimTime::MAX`
// (or before zero) is a scheduling defect.

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        match self.checked_add(rhs) {
            Some(time) => time,
            None => panic!("simulation time overflow: {self:?} + {rhs:?}"),
        }
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Duration) -> SimTime {
        match self.checked_sub(rhs) {
            Some(time) => time,
            None => panic!("simulation time underflow: {self:?} - {rhs:?}"),
        }
    }
}

// DEREF

impl Deref for SimTime {
    type Target = Duration;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// FMT

impl Debug for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

// FROM

impl From<SimTime> for f64 {
    fn from(this: SimTime) -> Self {
        this.0.as_secs_f64()
    }
}

impl From<f64> for SimTime {
    fn from(value: f64) -> Self {
        SimTime(Duration::from_secs_f64(value))
    }
}

impl From<Duration> for SimTime {
    fn from(value: Duration) -> Self {
        SimTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops() {
        assert_eq!(
            f64::from(SimTime::from_duration(Duration::from_millis(300))),
            0.3
        );

        assert_eq!(
            SimTime::from(30.0) - SimTime::from(10.0),
            Duration::from_secs(20)
        );
        assert_eq!(SimTime::from(30.0) - Duration::from_secs(10), 20.0);

        let mut time = SimTime::from(30.0);
        time += Duration::from_millis(500);
        assert_eq!(time, 30.5);
        assert_eq!(
            SimTime::from(1.0).checked_duration_since(SimTime::from(2.0)),
            None
        );
        assert_eq!(
            SimTime::from(1.0).saturating_duration_since(SimTime::from(2.0)),
            Duration::ZERO
        );
    }

    #[test]
    fn serde_secs() {
        let t: SimTime = serde_yml::from_str("0.004256").unwrap();
        assert_eq!(t, 0.004256);
        assert!(serde_yml::from_str::<SimTime>("-1.0").is_err());
    }
}
