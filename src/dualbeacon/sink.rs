use super::{
    DualBeaconEvents, Frame, FrameKind, DISTINCT_SENT, IN_COMMUNICATION, IN_DISCOVERY,
    NUM_PASSAGES, TOTAL_PASSAGES, X_MS, Y_MS,
};
use crate::{
    config::{secs, DualBeaconConfig},
    env::Environment,
    runtime::{Scheduler, TimerSlots},
    time::Duration,
};

/// The periodic activities of the mobile sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkTimer {
    /// Advance the position by one step.
    Move,
    LongBeacon,
    ShortBeacon,
}

///
/// A sink driving past the sensor on a straight line, again and again.
///
/// The position lives in the shared environment, so that the channel can
/// derive distances from it. Each passage begins just outside the discovery
/// range and ends just outside it on the other side.
///
#[derive(Debug)]
pub struct MobileSink {
    start: (f64, f64),
    end: (f64, f64),
    /// Displacement per step along each axis, signed towards the end point.
    step: (f64, f64),

    discovery_range: f64,
    communication_range: f64,
    delta: Duration,
    beacon_period: Duration,
    beacon_offset: Duration,

    last_accepted: i64,
    correct_rx: u64,
    data_rx: u64,
    acks_sent: u64,

    timers: TimerSlots<SinkTimer>,
}

impl MobileSink {
    #[must_use]
    pub fn new(config: &DualBeaconConfig) -> Self {
        let start = config.start_position();
        let end = config.end_position();

        // The heading is fixed for the whole passage.
        let (dx, dy) = (end.0 - start.0, end.1 - start.1);
        let hyp = dx.hypot(dy);
        let theta = if hyp > 0.0 { (dx.abs() / hyp).acos() } else { 0.0 };
        let displacement = config.speed * config.delta;
        let step = (
            (displacement * theta.cos()).copysign(dx),
            (displacement * theta.sin()).copysign(dy),
        );

        Self {
            start,
            end,
            step,
            discovery_range: config.discovery_range,
            communication_range: config.communication_range,
            delta: secs(config.delta),
            beacon_period: secs(2.0 * config.beacon_interval),
            beacon_offset: secs(config.beacon_interval),
            last_accepted: 0,
            correct_rx: 0,
            data_rx: 0,
            acks_sent: 0,
            timers: TimerSlots::new(),
        }
    }

    /// Distinct data packets received.
    #[must_use]
    pub fn correct_rx(&self) -> u64 {
        self.correct_rx
    }

    /// All data frames received, duplicates included.
    #[must_use]
    pub fn data_rx(&self) -> u64 {
        self.data_rx
    }

    #[must_use]
    pub fn acks_sent(&self) -> u64 {
        self.acks_sent
    }

    #[must_use]
    pub fn timers(&self) -> &TimerSlots<SinkTimer> {
        &self.timers
    }

    fn passages_remain(env: &Environment) -> bool {
        env.get(NUM_PASSAGES) < env.get(TOTAL_PASSAGES)
    }

    /// Starts moving and beaconing: a long beacon right away, a short one
    /// half a beacon period later.
    pub fn start(&mut self, env: &Environment, sched: &mut Scheduler<DualBeaconEvents>) {
        if !Self::passages_remain(env) {
            return;
        }
        self.timers.arm(sched, SinkTimer::Move, SinkTimer::Move, self.delta);
        self.timers
            .arm(sched, SinkTimer::LongBeacon, SinkTimer::LongBeacon, Duration::ZERO);
        self.timers.arm(
            sched,
            SinkTimer::ShortBeacon,
            SinkTimer::ShortBeacon,
            self.beacon_offset,
        );
    }

    /// Handles a periodic timer. Beacons are pushed to `outbox`.
    pub fn handle_timer(
        &mut self,
        timer: SinkTimer,
        env: &mut Environment,
        sched: &mut Scheduler<DualBeaconEvents>,
        outbox: &mut Vec<Frame>,
    ) {
        let _guard = tracing::trace_span!("mobile_sink").entered();
        self.timers.fired(timer);

        if !Self::passages_remain(env) {
            tracing::trace!(?timer, "all passages done");
            return;
        }

        match timer {
            SinkTimer::Move => {
                self.update_position(env);
                self.timers.arm(sched, SinkTimer::Move, SinkTimer::Move, self.delta);
            }
            SinkTimer::LongBeacon => {
                outbox.push(Frame::new(FrameKind::LongBeacon));
                self.timers
                    .arm(sched, SinkTimer::LongBeacon, SinkTimer::LongBeacon, self.beacon_period);
            }
            SinkTimer::ShortBeacon => {
                outbox.push(Frame::new(FrameKind::ShortBeacon));
                self.timers.arm(
                    sched,
                    SinkTimer::ShortBeacon,
                    SinkTimer::ShortBeacon,
                    self.beacon_period,
                );
            }
        }
    }

    fn advance(current: f64, step: f64, start: f64, end: f64) -> f64 {
        if start <= end {
            (current + step).min(end)
        } else {
            (current + step).max(end)
        }
    }

    /// Moves one step along the heading and refreshes the phase flags.
    pub fn update_position(&mut self, env: &mut Environment) {
        let x = Self::advance(env.get(X_MS), self.step.0, self.start.0, self.end.0);
        let y = Self::advance(env.get(Y_MS), self.step.1, self.start.1, self.end.1);

        if x == self.end.0 && y == self.end.1 {
            env.set(X_MS, self.start.0);
            env.set(Y_MS, self.start.1);
            env.set(IN_DISCOVERY, false);
            env.set(IN_COMMUNICATION, false);
            env.set(DISTINCT_SENT, 0);
            let passages = env.update(NUM_PASSAGES, |n| n + 1);
            self.last_accepted = 0;
            tracing::info!(passages, correct_rx = self.correct_rx, "passage completed");
            return;
        }

        env.set(X_MS, x);
        env.set(Y_MS, y);

        let discovery = (-self.discovery_range..=self.discovery_range).contains(&x);
        let communication = (-self.communication_range..=self.communication_range).contains(&x);
        if discovery != env.get(IN_DISCOVERY) || communication != env.get(IN_COMMUNICATION) {
            tracing::debug!(x, discovery, communication, "phase changed");
        }
        env.set(IN_DISCOVERY, discovery);
        env.set(IN_COMMUNICATION, communication);
    }

    /// Accepts a data frame and answers it with an ack, duplicate or not.
    pub fn receive(&mut self, frame: Frame, env: &Environment, outbox: &mut Vec<Frame>) {
        let _guard = tracing::trace_span!("mobile_sink").entered();
        debug_assert_eq!(frame.kind, FrameKind::Data);
        self.data_rx += 1;

        let marker = env.get(DISTINCT_SENT);
        if marker > self.last_accepted {
            self.last_accepted = marker;
            self.correct_rx += 1;
            tracing::debug!(marker, "data received");
        } else {
            tracing::debug!(marker, last = self.last_accepted, "duplicate data");
        }

        outbox.push(Frame::new(FrameKind::Ack));
        self.acks_sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dualbeacon::DualBeaconApp;

    fn setup() -> (MobileSink, Environment) {
        let config = DualBeaconConfig::default();
        let app = DualBeaconApp::new(config.clone());
        (MobileSink::new(&config), app.env)
    }

    #[test]
    fn moves_along_the_lane() {
        let (mut sink, mut env) = setup();
        assert_eq!(env.get(X_MS), -101.0);
        assert_eq!(env.get(Y_MS), 15.0);

        sink.update_position(&mut env);
        assert!((env.get(X_MS) - (-101.0 + 0.011_111)).abs() < 1e-9);
        assert_eq!(env.get(Y_MS), 15.0);
        assert!(!env.get(IN_DISCOVERY));
    }

    #[test]
    fn phase_flags_follow_position() {
        let (mut sink, mut env) = setup();

        env.set(X_MS, -100.005);
        sink.update_position(&mut env);
        assert!(env.get(IN_DISCOVERY));
        assert!(!env.get(IN_COMMUNICATION));

        env.set(X_MS, -50.005);
        sink.update_position(&mut env);
        assert!(env.get(IN_DISCOVERY));
        assert!(env.get(IN_COMMUNICATION));

        env.set(X_MS, 50.0);
        sink.update_position(&mut env);
        assert!(env.get(IN_DISCOVERY));
        assert!(!env.get(IN_COMMUNICATION));

        env.set(X_MS, 100.0);
        sink.update_position(&mut env);
        assert!(!env.get(IN_DISCOVERY));
        assert!(!env.get(IN_COMMUNICATION));
    }

    #[test]
    fn passage_end_resets() {
        let (mut sink, mut env) = setup();
        env.set(X_MS, 100.995);
        env.set(IN_DISCOVERY, true);
        env.set(DISTINCT_SENT, 4);
        sink.last_accepted = 4;

        sink.update_position(&mut env);
        assert_eq!(env.get(X_MS), -101.0);
        assert_eq!(env.get(Y_MS), 15.0);
        assert_eq!(env.get(NUM_PASSAGES), 1);
        assert_eq!(env.get(DISTINCT_SENT), 0);
        assert!(!env.get(IN_DISCOVERY));
        assert_eq!(sink.last_accepted, 0);
    }

    #[test]
    fn duplicates_are_acked_but_not_counted() {
        let (mut sink, mut env) = setup();
        let mut outbox = Vec::new();

        env.set(DISTINCT_SENT, 1);
        sink.receive(Frame::new(FrameKind::Data), &env, &mut outbox);
        sink.receive(Frame::new(FrameKind::Data), &env, &mut outbox);
        env.set(DISTINCT_SENT, 2);
        sink.receive(Frame::new(FrameKind::Data), &env, &mut outbox);

        assert_eq!(sink.correct_rx(), 2);
        assert_eq!(sink.data_rx(), 3);
        assert_eq!(outbox.len(), 3);
        assert!(outbox.iter().all(|f| f.kind == FrameKind::Ack));
    }
}
