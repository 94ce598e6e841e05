use super::{DualBeaconEvents, Frame, FrameKind, DISTINCT_SENT, IN_DISCOVERY, NUM_PASSAGES, TOTAL_PASSAGES};
use crate::{
    config::{secs, DualBeaconConfig},
    env::Environment,
    runtime::{Scheduler, TimerSlots},
    time::{Duration, SimTime},
};

/// The timers of the sensor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorTimer {
    RadioOn,
    RadioOff,
    /// Fall back from high to low duty cycle.
    DutyRevert,
    SendData,
    /// No ack arrived in time for the last data frame.
    TxTimeout,
}

/// How often the radio wakes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DutyMode {
    Low,
    High,
}

///
/// A static sensor that sleeps most of the time and waits for a mobile
/// sink to pass by.
///
/// The radio alternates between `T_on` windows and off periods whose length
/// depends on the [`DutyMode`]. A long-range beacon heard in low duty mode
/// switches to high duty mode for a while. A short-range beacon starts a
/// stop-and-wait transfer that keeps sending data until
/// `max_ack_misses` consecutive timeouts occur.
///
#[derive(Debug)]
pub struct SensorNode {
    config: DualBeaconConfig,
    t_on: Duration,
    t_off_low: Duration,
    t_off_high: Duration,
    tx_timeout: Duration,

    radio_on: bool,
    radio_on_at: SimTime,
    duty: DutyMode,
    transfer: bool,
    ack_misses: u32,

    times_discovered: u64,
    ack_packets: u64,
    data_sent: u64,
    retransmissions: u64,
    arq_failures: u64,

    energy_discovery: f64,
    energy_idle: f64,
    energy_transfer: f64,

    timers: TimerSlots<SensorTimer>,
}

impl SensorNode {
    #[must_use]
    pub fn new(config: &DualBeaconConfig) -> Self {
        Self {
            t_on: secs(config.t_on()),
            t_off_low: secs(config.t_off_low()),
            t_off_high: secs(config.t_off_high()),
            tx_timeout: secs(config.tx_timeout()),
            config: config.clone(),

            radio_on: false,
            radio_on_at: SimTime::ZERO,
            duty: DutyMode::Low,
            transfer: false,
            ack_misses: 0,

            times_discovered: 0,
            ack_packets: 0,
            data_sent: 0,
            retransmissions: 0,
            arq_failures: 0,

            energy_discovery: 0.0,
            energy_idle: 0.0,
            energy_transfer: 0.0,

            timers: TimerSlots::new(),
        }
    }

    #[must_use]
    pub fn radio_on(&self) -> bool {
        self.radio_on
    }

    #[must_use]
    pub fn duty(&self) -> DutyMode {
        self.duty
    }

    /// Whether a stop-and-wait transfer is running.
    #[must_use]
    pub fn in_transfer(&self) -> bool {
        self.transfer
    }

    /// Consecutive timeouts of the current data packet.
    #[must_use]
    pub fn ack_misses(&self) -> u32 {
        self.ack_misses
    }

    /// Short-range beacons that started a transfer.
    #[must_use]
    pub fn times_discovered(&self) -> u64 {
        self.times_discovered
    }

    #[must_use]
    pub fn ack_packets(&self) -> u64 {
        self.ack_packets
    }

    /// Data frames put on the air, retransmissions included.
    #[must_use]
    pub fn data_sent(&self) -> u64 {
        self.data_sent
    }

    #[must_use]
    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    /// Transfers given up after too many missing acks.
    #[must_use]
    pub fn arq_failures(&self) -> u64 {
        self.arq_failures
    }

    #[must_use]
    pub fn energy_discovery(&self) -> f64 {
        self.energy_discovery
    }

    #[must_use]
    pub fn energy_idle(&self) -> f64 {
        self.energy_idle
    }

    #[must_use]
    pub fn energy_transfer(&self) -> f64 {
        self.energy_transfer
    }

    #[must_use]
    pub fn timers(&self) -> &TimerSlots<SensorTimer> {
        &self.timers
    }

    fn t_off(&self) -> Duration {
        match self.duty {
            DutyMode::Low => self.t_off_low,
            DutyMode::High => self.t_off_high,
        }
    }

    fn passages_remain(env: &Environment) -> bool {
        env.get(NUM_PASSAGES) < env.get(TOTAL_PASSAGES)
    }

    /// Charges the receiver for an on window of length `window`.
    fn charge_on_window(&mut self, window: Duration, env: &Environment) {
        let energy = self.config.p_rx * window.as_secs_f64();
        if env.get(IN_DISCOVERY) {
            self.energy_discovery += energy;
        } else {
            self.energy_idle += energy;
        }
    }

    /// Picks a random point of the low duty cycle as the initial radio state.
    pub fn start(&mut self, env: &Environment, sched: &mut Scheduler<DualBeaconEvents>) {
        let cycle = self.t_on + self.t_off_low;
        let t = cycle.mul_f64(sched.uniform_real());

        if t < self.t_on {
            self.radio_on = true;
            self.radio_on_at = sched.now().checked_sub(t).unwrap_or(SimTime::ZERO);
            self.charge_on_window(self.t_on - t, env);
            self.timers
                .arm(sched, SensorTimer::RadioOff, SensorTimer::RadioOff, self.t_on - t);
        } else {
            self.radio_on = false;
            self.timers
                .arm(sched, SensorTimer::RadioOn, SensorTimer::RadioOn, cycle.saturating_sub(t));
        }
        tracing::debug!(radio_on = self.radio_on, "initial radio state");
    }

    /// Handles an expired timer. Data frames are pushed to `outbox`.
    pub fn handle_timer(
        &mut self,
        timer: SensorTimer,
        env: &mut Environment,
        sched: &mut Scheduler<DualBeaconEvents>,
        outbox: &mut Vec<Frame>,
    ) {
        let _guard = tracing::debug_span!("sensor").entered();
        self.timers.fired(timer);

        match timer {
            SensorTimer::RadioOn => {
                if !Self::passages_remain(env) {
                    return;
                }
                self.radio_on = true;
                self.radio_on_at = sched.now();
                self.charge_on_window(self.t_on, env);
                self.timers
                    .arm(sched, SensorTimer::RadioOff, SensorTimer::RadioOff, self.t_on);
                tracing::trace!("radio on");
            }
            SensorTimer::RadioOff => {
                // Like the on edge, the duty cycle freezes after the last passage.
                if !Self::passages_remain(env) {
                    return;
                }
                self.radio_on = false;
                self.timers
                    .arm(sched, SensorTimer::RadioOn, SensorTimer::RadioOn, self.t_off());
                tracing::trace!(duty = ?self.duty, "radio off");
            }
            SensorTimer::DutyRevert => {
                self.duty = DutyMode::Low;
                tracing::debug!("back to low duty cycle");
            }
            SensorTimer::SendData => self.send_data(env, sched, outbox),
            SensorTimer::TxTimeout => self.tx_timeout(sched, outbox),
        }
    }

    /// Handles a frame that made it through the channel.
    pub fn receive(
        &mut self,
        frame: Frame,
        env: &mut Environment,
        sched: &mut Scheduler<DualBeaconEvents>,
    ) {
        let _guard = tracing::debug_span!("sensor").entered();
        match frame.kind {
            FrameKind::ShortBeacon => self.short_beacon(env, sched),
            FrameKind::LongBeacon => self.long_beacon(sched),
            FrameKind::Ack => self.ack(sched),
            FrameKind::Data => tracing::warn!("sensor received a data frame"),
        }
    }

    fn short_beacon(&mut self, env: &mut Environment, sched: &mut Scheduler<DualBeaconEvents>) {
        if !self.radio_on || self.transfer {
            tracing::trace!(radio_on = self.radio_on, "SRB ignored");
            return;
        }

        self.times_discovered += 1;
        self.transfer = true;
        tracing::debug!(times = self.times_discovered, "discovered by the mobile sink");

        self.timers.cancel(sched, SensorTimer::RadioOff);
        self.timers.cancel(sched, SensorTimer::DutyRevert);
        self.timers
            .rearm(sched, SensorTimer::SendData, SensorTimer::SendData, Duration::ZERO);

        if env.get(IN_DISCOVERY) {
            // The rest of the on window is spent on the transfer.
            let used = sched.now().saturating_duration_since(self.radio_on_at);
            let unused = self.t_on.saturating_sub(used);
            self.energy_discovery =
                (self.energy_discovery - self.config.p_rx * unused.as_secs_f64()).max(0.0);
            env.set(IN_DISCOVERY, false);
        }
    }

    fn long_beacon(&mut self, sched: &mut Scheduler<DualBeaconEvents>) {
        if !self.radio_on || self.duty != DutyMode::Low {
            return;
        }
        self.duty = DutyMode::High;
        self.timers.rearm(
            sched,
            SensorTimer::DutyRevert,
            SensorTimer::DutyRevert,
            self.t_off_high,
        );
        tracing::debug!("switched to high duty cycle");
    }

    fn transmit(&mut self, sched: &mut Scheduler<DualBeaconEvents>, outbox: &mut Vec<Frame>) {
        outbox.push(Frame::new(FrameKind::Data));
        self.data_sent += 1;
        self.energy_transfer += self.config.p_tx * self.config.packet_duration;
        self.timers
            .arm(sched, SensorTimer::TxTimeout, SensorTimer::TxTimeout, self.tx_timeout);
    }

    fn send_data(
        &mut self,
        env: &mut Environment,
        sched: &mut Scheduler<DualBeaconEvents>,
        outbox: &mut Vec<Frame>,
    ) {
        if self.ack_misses < 1 {
            let distinct = env.update(DISTINCT_SENT, |n| n + 1);
            tracing::debug!(distinct, "sending data");
        }
        self.timers.cancel(sched, SensorTimer::RadioOff);
        self.transmit(sched, outbox);
    }

    fn tx_timeout(&mut self, sched: &mut Scheduler<DualBeaconEvents>, outbox: &mut Vec<Frame>) {
        self.ack_misses += 1;
        self.energy_transfer += self.config.p_rx * self.tx_timeout.as_secs_f64();

        if self.ack_misses < self.config.max_ack_misses {
            tracing::debug!(misses = self.ack_misses, "ack missing, retransmitting");
            self.retransmissions += 1;
            self.transmit(sched, outbox);
            return;
        }

        tracing::debug!(misses = self.ack_misses, "transfer failed");
        self.ack_misses = 0;
        self.transfer = false;
        self.arq_failures += 1;

        self.timers
            .rearm(sched, SensorTimer::DutyRevert, SensorTimer::DutyRevert, Duration::ZERO);
        self.timers
            .rearm(sched, SensorTimer::RadioOff, SensorTimer::RadioOff, Duration::ZERO);
    }

    fn ack(&mut self, sched: &mut Scheduler<DualBeaconEvents>) {
        if !self.timers.cancel(sched, SensorTimer::TxTimeout) {
            tracing::debug!("late ack ignored");
            return;
        }

        self.ack_misses = 0;
        self.ack_packets += 1;
        self.energy_transfer +=
            self.config.p_rx * (self.config.ack_duration + 2.0 * self.config.sigma);
        tracing::debug!(acked = self.ack_packets, "ack received");

        self.timers
            .rearm(sched, SensorTimer::SendData, SensorTimer::SendData, Duration::ZERO);
    }
}
