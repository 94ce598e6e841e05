//!
//! A mobile sink collecting data from a duty-cycled sensor.
//!
//! The mobile sink drives past the sensor on a straight lane and announces
//! itself with two beacons: a long-range beacon (LRB) heard within the
//! discovery range `R`, and a short-range beacon (SRB) heard within the
//! communication range `r`. The sensor sleeps most of the time. Hearing an
//! LRB makes it wake up more often, hearing an SRB starts a stop-and-wait
//! transfer that lasts until too many acks go missing.
//!
//! All frames pass the [`WirelessChannel`], which drops them depending on
//! the phase of the mobile sink and on the distance between both ends.

use crate::{
    config::DualBeaconConfig,
    env::{Environment, Key},
    runtime::{Application, Event, EventLifecycle, EventSet, Runtime, RuntimeError, Scheduler},
};
use serde::Serialize;
use std::fmt::Display;

mod frame;
pub use self::frame::*;

mod channel;
pub use self::channel::*;

mod sensor;
pub use self::sensor::*;

mod sink;
pub use self::sink::*;

/// Position of the mobile sink along x, in m.
pub const X_MS: Key<f64> = Key::new("x_ms");
/// Position of the mobile sink along y, in m.
pub const Y_MS: Key<f64> = Key::new("y_ms");
/// Whether the mobile sink is within the discovery range.
pub const IN_DISCOVERY: Key<bool> = Key::new("in_discovery_phase");
/// Whether the mobile sink is within the communication range.
pub const IN_COMMUNICATION: Key<bool> = Key::new("in_communication_phase");
/// Completed passages.
pub const NUM_PASSAGES: Key<i64> = Key::new("numPassages");
pub const TOTAL_PASSAGES: Key<i64> = Key::new("totalPassages");
/// Distinct data packets the sensor sent during the current passage.
pub const DISTINCT_SENT: Key<i64> = Key::new("distinct_pkts_sent_current_passage");

///
/// The sensor, the mobile sink and the channel between them.
///
#[derive(Debug)]
pub struct DualBeaconApp {
    pub env: Environment,
    pub sensor: SensorNode,
    pub sink: MobileSink,
    pub channel: WirelessChannel,
    config: DualBeaconConfig,
    outbox: Vec<Frame>,
}

impl DualBeaconApp {
    /// Creates the scenario and declares the shared state, with the mobile
    /// sink at its start position.
    #[must_use]
    pub fn new(config: DualBeaconConfig) -> Self {
        let (x, y) = config.start_position();

        let mut env = Environment::new();
        env.declare(X_MS, x);
        env.declare(Y_MS, y);
        env.declare(IN_DISCOVERY, false);
        env.declare(IN_COMMUNICATION, false);
        env.declare(NUM_PASSAGES, 0);
        env.declare(TOTAL_PASSAGES, i64::from(config.total_passages));
        env.declare(DISTINCT_SENT, 0);

        Self {
            env,
            sensor: SensorNode::new(&config),
            sink: MobileSink::new(&config),
            channel: WirelessChannel::new(&config),
            config,
            outbox: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DualBeaconConfig {
        &self.config
    }

    #[must_use]
    pub fn report(&self) -> DualBeaconReport {
        DualBeaconReport::new(self)
    }

    /// Puts all frames emitted by the last handler on the air.
    fn flush(&mut self, sched: &mut Scheduler<DualBeaconEvents>) {
        for frame in self.outbox.drain(..) {
            self.channel.transmit(frame, &self.env, sched);
        }
    }
}

impl Application for DualBeaconApp {
    type EventSet = DualBeaconEvents;
    type Lifecycle = Self;
}

impl EventLifecycle<DualBeaconApp> for DualBeaconApp {
    fn at_sim_start(rt: &mut Runtime<Self>) {
        let (app, sched) = rt.parts();
        app.sink.start(&app.env, sched);
        app.sensor.start(&app.env, sched);
        tracing::info!(
            passages = app.config.total_passages,
            "dual beacon scenario initialized"
        );
    }

    fn at_sim_end(rt: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        let report = rt.app.report();
        tracing::info!(
            passages = report.passages,
            discovered = report.times_discovered,
            correct_rx = report.correct_rx,
            "dual beacon scenario finished"
        );
        Ok(())
    }
}

/// All events of the dual beacon scenario.
#[derive(Debug)]
pub enum DualBeaconEvents {
    Sensor(SensorTimer),
    Sink(SinkTimer),
    Arrival(FrameArrival),
}

impl From<SensorTimer> for DualBeaconEvents {
    fn from(value: SensorTimer) -> Self {
        Self::Sensor(value)
    }
}

impl From<SinkTimer> for DualBeaconEvents {
    fn from(value: SinkTimer) -> Self {
        Self::Sink(value)
    }
}

impl From<FrameArrival> for DualBeaconEvents {
    fn from(value: FrameArrival) -> Self {
        Self::Arrival(value)
    }
}

impl EventSet<DualBeaconApp> for DualBeaconEvents {
    fn handle(self, rt: &mut Runtime<DualBeaconApp>) {
        match self {
            Self::Sensor(timer) => timer.handle(rt),
            Self::Sink(timer) => timer.handle(rt),
            Self::Arrival(arrival) => arrival.handle(rt),
        }
    }
}

impl Event<DualBeaconApp> for SensorTimer {
    fn handle(self, rt: &mut Runtime<DualBeaconApp>) {
        let (app, sched) = rt.parts();
        app.sensor
            .handle_timer(self, &mut app.env, sched, &mut app.outbox);
        app.flush(sched);
    }
}

impl Event<DualBeaconApp> for SinkTimer {
    fn handle(self, rt: &mut Runtime<DualBeaconApp>) {
        let (app, sched) = rt.parts();
        app.sink.handle_timer(self, &mut app.env, sched, &mut app.outbox);
        app.flush(sched);
    }
}

impl Event<DualBeaconApp> for FrameArrival {
    fn handle(self, rt: &mut Runtime<DualBeaconApp>) {
        let (app, sched) = rt.parts();
        let age = sched.now().saturating_duration_since(self.frame.created);
        tracing::trace!(kind = %self.frame.kind, ?age, "frame arrived");
        match self.frame.kind.destination() {
            Endpoint::Sensor => app.sensor.receive(self.frame, &mut app.env, sched),
            Endpoint::MobileSink => app.sink.receive(self.frame, &app.env, &mut app.outbox),
        }
        app.flush(sched);
    }
}

///
/// The final statistics of a dual beacon run, averaged per passage.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DualBeaconReport {
    pub passages: u64,
    pub times_discovered: u64,
    /// Discoveries over passages, in percent.
    pub discovery_ratio: f64,
    pub ack_packets: u64,
    /// Acknowledged bytes per passage.
    pub throughput: f64,
    pub data_sent: u64,
    pub retransmissions: u64,
    pub arq_failures: u64,
    /// Energy per passage, in mJ.
    pub energy_discovery: f64,
    pub energy_idle: f64,
    pub energy_transfer: f64,
    /// Distinct data packets received by the mobile sink.
    pub correct_rx: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
}

impl DualBeaconReport {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(app: &DualBeaconApp) -> Self {
        let passages = u64::try_from(app.env.get(NUM_PASSAGES)).unwrap_or(0);
        let per_passage = |value: f64| {
            if passages == 0 {
                0.0
            } else {
                value / passages as f64
            }
        };

        let sensor = &app.sensor;
        Self {
            passages,
            times_discovered: sensor.times_discovered(),
            discovery_ratio: per_passage(sensor.times_discovered() as f64 * 100.0),
            ack_packets: sensor.ack_packets(),
            throughput: per_passage(
                sensor.ack_packets() as f64 * f64::from(app.config.packet_length),
            ),
            data_sent: sensor.data_sent(),
            retransmissions: sensor.retransmissions(),
            arq_failures: sensor.arq_failures(),
            energy_discovery: per_passage(sensor.energy_discovery()),
            energy_idle: per_passage(sensor.energy_idle()),
            energy_transfer: per_passage(sensor.energy_transfer()),
            correct_rx: app.sink.correct_rx(),
            frames_delivered: app.channel.delivered(),
            frames_dropped: app.channel.dropped(),
        }
    }
}

impl Display for DualBeaconReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Passages:                       {}", self.passages)?;
        writeln!(f, "Average discovery ratio:        {:.3} %", self.discovery_ratio)?;
        writeln!(f, "Average throughput:             {:.3} bytes", self.throughput)?;
        writeln!(f, "Average energy discovery phase: {:.3} mJ", self.energy_discovery)?;
        writeln!(f, "Average energy idle listening:  {:.3} mJ", self.energy_idle)?;
        writeln!(f, "Average energy transfer phase:  {:.3} mJ", self.energy_transfer)?;
        writeln!(
            f,
            "Data frames sent:               {} ({} retransmissions, {} failed transfers)",
            self.data_sent, self.retransmissions, self.arq_failures
        )?;
        writeln!(f, "Correctly received packets:     {}", self.correct_rx)
    }
}
