//!
//! Convenience re-export of common members.
//!

pub use crate::runtime::Application;
pub use crate::runtime::Builder;
pub use crate::runtime::Event;
pub use crate::runtime::EventLifecycle;
pub use crate::runtime::EventSet;
pub use crate::runtime::Runtime;
pub use crate::runtime::RuntimeError;
pub use crate::runtime::RuntimeLimit;
pub use crate::runtime::Scheduler;
pub use crate::runtime::TimerHandle;
pub use crate::runtime::TimerSlots;

pub use crate::time::Duration;
pub use crate::time::SimTime;

pub use crate::env::Environment;
pub use crate::env::Key;

pub use crate::config::ChannelLoss;
pub use crate::config::ConfigError;
pub use crate::config::CsmaConfig;
pub use crate::config::DualBeaconConfig;

pub use crate::csma::CsmaApp;
pub use crate::csma::CsmaReport;

pub use crate::dualbeacon::DualBeaconApp;
pub use crate::dualbeacon::DualBeaconReport;
