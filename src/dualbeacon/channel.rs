use super::{
    DualBeaconEvents, Frame, FrameArrival, FrameKind, IN_COMMUNICATION, IN_DISCOVERY, X_MS, Y_MS,
};
use crate::{
    config::{secs, ChannelLoss, DualBeaconConfig},
    env::Environment,
    runtime::Scheduler,
    time::Duration,
};

/// What the channel did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The frame will reach its destination.
    Delivered,
    /// The mobile sink is not in the phase this frame kind needs.
    OutOfPhase,
    /// The loss sample fell below the loss probability.
    Lost,
}

///
/// The lossy radio link between the mobile sink and the sensor.
///
/// Every frame passes two checks, both taken once at transmission time:
/// the phase gate of its kind, then a random loss sample against a
/// probability growing linearly with the distance between the two ends.
///
#[derive(Debug, Clone)]
pub struct WirelessChannel {
    discovery_range: f64,
    sensor: (f64, f64),
    loss: ChannelLoss,

    packet_duration: Duration,
    ack_duration: Duration,

    delivered: u64,
    dropped: u64,
}

impl WirelessChannel {
    #[must_use]
    pub fn new(config: &DualBeaconConfig) -> Self {
        Self {
            discovery_range: config.discovery_range,
            sensor: (config.sensor_x, config.sensor_y),
            loss: config.loss,
            packet_duration: secs(config.packet_duration),
            ack_duration: secs(config.ack_duration),
            delivered: 0,
            dropped: 0,
        }
    }

    /// Frames handed to their destination so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Frames discarded so far, either out of phase or lost.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// The distance between the mobile sink and the sensor.
    #[must_use]
    pub fn distance(&self, env: &Environment) -> f64 {
        let dx = env.get(X_MS) - self.sensor.0;
        let dy = env.get(Y_MS) - self.sensor.1;
        dx.hypot(dy)
    }

    /// The probability that a frame sent right now is lost: `d / 4R`.
    #[must_use]
    pub fn loss_probability(&self, env: &Environment) -> f64 {
        match self.loss {
            ChannelLoss::Distance => self.distance(env) / (4.0 * self.discovery_range),
            ChannelLoss::None => 0.0,
        }
    }

    /// Whether the current phase of the mobile sink lets this kind of frame through.
    #[must_use]
    pub fn in_phase(kind: FrameKind, env: &Environment) -> bool {
        let discovery = env.get(IN_DISCOVERY);
        let communication = env.get(IN_COMMUNICATION);
        match kind {
            FrameKind::LongBeacon => discovery,
            FrameKind::ShortBeacon => discovery && communication,
            FrameKind::Data | FrameKind::Ack => communication,
        }
    }

    /// The time a frame of this kind spends on the air.
    #[must_use]
    pub fn airtime(&self, kind: FrameKind) -> Duration {
        match kind {
            FrameKind::Data => self.packet_duration,
            FrameKind::Ack => self.ack_duration,
            FrameKind::ShortBeacon | FrameKind::LongBeacon => Duration::ZERO,
        }
    }

    /// Decides the fate of a frame, without scheduling anything.
    pub fn judge<E>(&self, kind: FrameKind, env: &Environment, sched: &mut Scheduler<E>) -> Verdict {
        if !Self::in_phase(kind, env) {
            return Verdict::OutOfPhase;
        }
        if self.loss == ChannelLoss::None {
            return Verdict::Delivered;
        }

        let p = self.loss_probability(env);
        let sample = sched.uniform_real();
        // A sample equal to p is delivered.
        if sample < p {
            Verdict::Lost
        } else {
            Verdict::Delivered
        }
    }

    /// Puts a frame on the air. A delivered frame arrives after its airtime.
    pub fn transmit(
        &mut self,
        frame: Frame,
        env: &Environment,
        sched: &mut Scheduler<DualBeaconEvents>,
    ) -> Verdict {
        let _guard = tracing::trace_span!("channel").entered();
        let verdict = self.judge(frame.kind, env, sched);

        if verdict == Verdict::Delivered {
            self.delivered += 1;
            sched.schedule_in(FrameArrival { frame }, self.airtime(frame.kind));
            tracing::trace!(kind = %frame.kind, "frame delivered");
        } else {
            self.dropped += 1;
            tracing::trace!(kind = %frame.kind, ?verdict, "frame discarded");
        }
        verdict
    }
}
