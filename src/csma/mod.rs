//!
//! Slotted CSMA/CA between a set of sensor nodes and one sink.
//!
//! The channel is not modelled explicitly. It is the pair of shared values
//! [`CHANNEL_FREE`] and [`CONCURRENT_TX`] in the [`Environment`]: a node
//! claims the channel after a successful clear channel assessment, and a frame
//! that reaches the sink while more than one transmission is in the air counts
//! as collided.
//!
//! ```no_run
//! use wsnsim::prelude::*;
//!
//! let app = CsmaApp::new(CsmaConfig::default());
//! let rt = Builder::seeded(42).quiet().build(app);
//! let (app, _, _) = rt.run().unwrap();
//! println!("{}", app.report());
//! ```

use crate::{
    config::CsmaConfig,
    env::{Environment, Key},
    runtime::{Application, Event, EventLifecycle, EventSet, Runtime, RuntimeError},
    time::SimTime,
};

mod node;
pub use self::node::*;

mod sink;
pub use self::sink::*;

/// Whether no node currently claims the channel.
pub const CHANNEL_FREE: Key<bool> = Key::new("channelFree");
/// The number of frames currently in the air.
pub const CONCURRENT_TX: Key<i64> = Key::new("concurrentTransmissions");
/// Packets given up after too many busy assessments.
pub const NUM_DROPPED: Key<i64> = Key::new("numDroppedPackets");
/// Frames put on the air.
pub const NUM_TX: Key<i64> = Key::new("numTxPackets");
/// Energy spent by all nodes on assessments and transmissions, in mJ.
pub const ENERGY: Key<f64> = Key::new("energy");
/// Sum of the latencies of all uncontended transmissions, in s.
pub const LATENCY: Key<f64> = Key::new("latency");

/// An untyped data frame, stamped with the creation time of its packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataFrame {
    /// The sending node.
    pub src: usize,
    /// When the packet was created.
    pub created: SimTime,
}

///
/// The network: all sensor nodes, the sink and the shared channel state.
///
#[derive(Debug)]
pub struct CsmaApp {
    /// The shared channel state and the global counters.
    pub env: Environment,
    /// The contending nodes, indexed by their id.
    pub nodes: Vec<SensorNode>,
    pub sink: Sink,
    config: CsmaConfig,
}

impl CsmaApp {
    /// Creates the network and declares the shared channel state.
    #[must_use]
    pub fn new(config: CsmaConfig) -> Self {
        let mut env = Environment::new();
        env.declare(CHANNEL_FREE, true);
        env.declare(CONCURRENT_TX, 0);
        env.declare(NUM_DROPPED, 0);
        env.declare(NUM_TX, 0);
        env.declare(ENERGY, 0.0);
        env.declare(LATENCY, 0.0);

        let nodes = (0..config.num_nodes)
            .map(|id| SensorNode::new(id, config.clone()))
            .collect();

        Self {
            env,
            nodes,
            sink: Sink::new(),
            config,
        }
    }

    /// The parameters this network was built with.
    #[must_use]
    pub fn config(&self) -> &CsmaConfig {
        &self.config
    }

    /// Computes the final statistics from the sink and the shared counters.
    #[must_use]
    pub fn report(&self) -> CsmaReport {
        CsmaReport::new(&self.sink, &self.env)
    }
}

impl Application for CsmaApp {
    type EventSet = CsmaEvents;
    type Lifecycle = Self;
}

impl EventLifecycle<CsmaApp> for CsmaApp {
    fn at_sim_start(rt: &mut Runtime<Self>) {
        let (app, sched) = rt.parts();
        for node in &mut app.nodes {
            node.start(sched);
        }
        tracing::info!(nodes = app.nodes.len(), "csma network initialized");
    }

    fn at_sim_end(rt: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        let report = rt.app.report();
        tracing::info!(
            received = report.received,
            collided = report.collided,
            dropped = report.dropped,
            "csma network finished"
        );
        Ok(())
    }
}

/// All events of the CSMA/CA network.
#[derive(Debug)]
pub enum CsmaEvents {
    /// A timer of a sensor node expired.
    Node(NodeEvent),
    /// A data frame reaches the sink.
    Arrival(DataFrame),
}

impl From<NodeEvent> for CsmaEvents {
    fn from(value: NodeEvent) -> Self {
        Self::Node(value)
    }
}

impl From<DataFrame> for CsmaEvents {
    fn from(value: DataFrame) -> Self {
        Self::Arrival(value)
    }
}

impl EventSet<CsmaApp> for CsmaEvents {
    fn handle(self, rt: &mut Runtime<CsmaApp>) {
        match self {
            Self::Node(event) => event.handle(rt),
            Self::Arrival(frame) => frame.handle(rt),
        }
    }
}

impl Event<CsmaApp> for NodeEvent {
    fn handle(self, rt: &mut Runtime<CsmaApp>) {
        let (app, sched) = rt.parts();
        app.nodes[self.node].handle_timer(self.timer, &mut app.env, sched);
    }
}

impl Event<CsmaApp> for DataFrame {
    fn handle(self, rt: &mut Runtime<CsmaApp>) {
        let (app, sched) = rt.parts();
        app.sink.receive(self, &app.env, sched.now());
    }
}
