#![allow(clippy::module_name_repetitions)]
//!
//! A discrete event simulation of two wireless sensor network access protocols.
//!
//! The crate is built from a small simulation [`runtime`] and two protocol
//! models on top of it:
//!
//! - [`csma`]: slotted CSMA/CA with exponential backoff between a set of
//!   sensor nodes and a sink, sharing one channel.
//! - [`dualbeacon`]: a mobile sink that announces itself with long and
//!   short range beacons to a duty-cycled sensor, which then uploads data
//!   with a stop-and-wait ARQ over a lossy channel.
//!
//! # Running a simulation
//!
//! Each protocol is an [`Application`](runtime::Application). Build a
//! [`Runtime`](runtime::Runtime) around it with the [`Builder`](runtime::Builder),
//! run it, and read the report from the returned application.
//!
//! ```
//! use wsnsim::prelude::*;
//!
//! let config = CsmaConfig {
//!     num_nodes: 1,
//!     packets_to_send: 3,
//!     ..CsmaConfig::default()
//! };
//!
//! let rt = Builder::seeded(7).quiet().build(CsmaApp::new(config));
//! let (app, _, _) = rt.run().unwrap();
//!
//! let report = app.report();
//! assert_eq!(report.received, 3);
//! assert_eq!(report.collided, 0);
//! ```
//!
//! All randomness (backoff draws, loss samples, the initial radio state)
//! comes from the seeded generator of the runtime's
//! [`Scheduler`](runtime::Scheduler), so a seed fully determines a run.
//!
//! Entities never share state through globals. The values several entities
//! look at live in one [`Environment`](env::Environment) owned by the
//! application. The only process-wide state is the simulation time, which is
//! why only one runtime may exist at a time.

pub mod config;
pub mod csma;
pub mod dualbeacon;
pub mod env;
pub mod logger;
pub mod prelude;
pub mod runtime;
pub mod time;
