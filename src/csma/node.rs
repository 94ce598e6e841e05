use super::{CsmaEvents, DataFrame, CHANNEL_FREE, CONCURRENT_TX, ENERGY, LATENCY, NUM_DROPPED, NUM_TX};
use crate::{
    config::CsmaConfig,
    env::Environment,
    runtime::{Scheduler, TimerSlots},
    time::{Duration, SimTime},
};

/// The timers of a sensor node, one per step of a transmission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTimer {
    /// The random backoff ended, assess the channel.
    Backoff,
    /// Claim the channel, `D_bp - ε` after a clear assessment.
    ChannelBusy,
    /// Put the frame on the air.
    Send,
    /// The frame left the air, release the channel.
    ChannelFree,
    /// Leave the set of concurrent transmissions.
    DecreaseTx,
}

/// A timer of one specific node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEvent {
    pub node: usize,
    pub timer: NodeTimer,
}

/// Samples the backoff delay for exponent `be`: between 0 and `2^be`
/// backoff periods, both ends included.
pub fn backoff_delay<E>(sched: &mut Scheduler<E>, be: u32, backoff_period: Duration) -> Duration {
    let periods = sched.uniform_int(0, 1u64 << be);
    backoff_period * u32::try_from(periods).unwrap_or(u32::MAX)
}

///
/// A sensor node running the slotted CSMA/CA backoff cycle.
///
/// Every packet walks through `Backoff -> ChannelBusy -> Send -> ChannelFree
/// -> DecreaseTx`. A busy assessment widens the backoff window until
/// `mac_max_csma_backoffs` is exceeded and the packet is dropped.
///
#[derive(Debug)]
pub struct SensorNode {
    id: usize,
    config: CsmaConfig,

    nb: u32,
    be: u32,
    packets_remaining: u32,
    packet_created: SimTime,

    timers: TimerSlots<NodeTimer>,
}

impl SensorNode {
    /// Creates an idle node with a full send queue.
    #[must_use]
    pub fn new(id: usize, config: CsmaConfig) -> Self {
        Self {
            id,
            nb: 0,
            be: config.mac_min_be,
            packets_remaining: config.packets_to_send,
            packet_created: SimTime::ZERO,
            timers: TimerSlots::new(),
            config,
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The number of backoffs of the current attempt.
    #[must_use]
    pub fn nb(&self) -> u32 {
        self.nb
    }

    /// The current backoff exponent.
    #[must_use]
    pub fn be(&self) -> u32 {
        self.be
    }

    #[must_use]
    pub fn packets_remaining(&self) -> u32 {
        self.packets_remaining
    }

    /// The creation time of the packet currently being sent.
    #[must_use]
    pub fn packet_created(&self) -> SimTime {
        self.packet_created
    }

    /// The pending timers of this node.
    #[must_use]
    pub fn timers(&self) -> &TimerSlots<NodeTimer> {
        &self.timers
    }

    fn event(&self, timer: NodeTimer) -> NodeEvent {
        NodeEvent {
            node: self.id,
            timer,
        }
    }

    /// Creates the first packet now and starts its backoff.
    pub fn start(&mut self, sched: &mut Scheduler<CsmaEvents>) {
        if self.packets_remaining == 0 {
            return;
        }
        self.packet_created = sched.now();
        let delay = backoff_delay(sched, self.be, self.config.backoff_period());
        self.timers
            .arm(sched, NodeTimer::Backoff, self.event(NodeTimer::Backoff), delay);
    }

    /// Handles an expired timer.
    pub fn handle_timer(
        &mut self,
        timer: NodeTimer,
        env: &mut Environment,
        sched: &mut Scheduler<CsmaEvents>,
    ) {
        let _guard = tracing::debug_span!("node", id = self.id).entered();
        self.timers.fired(timer);

        match timer {
            NodeTimer::Backoff => self.backoff_expired(env, sched),
            NodeTimer::ChannelBusy => {
                env.set(CHANNEL_FREE, false);
                tracing::trace!("channel claimed");
                self.timers.arm(
                    sched,
                    NodeTimer::Send,
                    self.event(NodeTimer::Send),
                    self.config.epsilon(),
                );
            }
            NodeTimer::Send => self.send(env, sched),
            NodeTimer::ChannelFree => {
                env.set(CHANNEL_FREE, true);
                if env.get(CONCURRENT_TX) <= 1 {
                    let latency = sched.now().saturating_duration_since(self.packet_created);
                    env.update(LATENCY, |l| l + latency.as_secs_f64());
                }
                tracing::trace!("channel released");
                self.timers.arm(
                    sched,
                    NodeTimer::DecreaseTx,
                    self.event(NodeTimer::DecreaseTx),
                    self.config.epsilon(),
                );
            }
            NodeTimer::DecreaseTx => {
                env.update(CONCURRENT_TX, |n| n - 1);
                self.decrease_and_repeat(sched);
            }
        }
    }

    /// Performs a clear channel assessment, charging the receiver energy.
    fn perform_cca(&self, env: &mut Environment) -> bool {
        env.update(ENERGY, |e| e + self.config.p_rx * self.config.cca_duration);
        env.get(CHANNEL_FREE)
    }

    fn backoff_expired(&mut self, env: &mut Environment, sched: &mut Scheduler<CsmaEvents>) {
        let channel_free = self.perform_cca(env);
        tracing::debug!(channel_free, nb = self.nb, be = self.be, "cca");

        if channel_free {
            let delay = self.config.backoff_period() - self.config.epsilon();
            self.timers.arm(
                sched,
                NodeTimer::ChannelBusy,
                self.event(NodeTimer::ChannelBusy),
                delay,
            );
            return;
        }

        self.nb += 1;
        self.be = (self.be + 1).min(self.config.mac_max_be);

        if self.nb <= self.config.mac_max_csma_backoffs {
            let delay = self.config.backoff_period()
                + backoff_delay(sched, self.be, self.config.backoff_period());
            self.timers
                .arm(sched, NodeTimer::Backoff, self.event(NodeTimer::Backoff), delay);
        } else {
            env.update(NUM_DROPPED, |n| n + 1);
            tracing::debug!(nb = self.nb, "packet dropped after too many busy assessments");
            self.decrease_and_repeat(sched);
        }
    }

    fn send(&mut self, env: &mut Environment, sched: &mut Scheduler<CsmaEvents>) {
        env.update(ENERGY, |e| e + self.config.p_tx * self.config.packet_duration);
        let concurrent = env.update(CONCURRENT_TX, |n| n + 1);
        env.update(NUM_TX, |n| n + 1);
        tracing::debug!(concurrent, "sending frame");

        // The sink hears the frame in the same instant.
        sched.schedule_in(
            DataFrame {
                src: self.id,
                created: self.packet_created,
            },
            Duration::ZERO,
        );

        self.timers.arm(
            sched,
            NodeTimer::ChannelFree,
            self.event(NodeTimer::ChannelFree),
            self.config.packet_duration(),
        );
    }

    /// Finishes the current packet and schedules the backoff of the next one.
    fn decrease_and_repeat(&mut self, sched: &mut Scheduler<CsmaEvents>) {
        self.nb = 0;
        self.be = self.config.mac_min_be;
        self.packets_remaining = self.packets_remaining.saturating_sub(1);

        if self.packets_remaining == 0 {
            tracing::debug!("all packets sent");
            return;
        }

        let sent = self.config.packets_to_send - self.packets_remaining;
        let created = SimTime::ZERO
            + self.config.inter_packet_gap() * sent
            + backoff_delay(sched, self.be, self.config.backoff_period());
        // A cycle that overran the packet gap starts right away.
        self.packet_created = created.max(sched.now());

        self.timers.rearm(
            sched,
            NodeTimer::Backoff,
            self.event(NodeTimer::Backoff),
            self.packet_created - sched.now(),
        );
        tracing::trace!(remaining = self.packets_remaining, at = %self.packet_created, "next packet");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn scheduler() -> Scheduler<CsmaEvents> {
        Scheduler::new(StdRng::seed_from_u64(7), SimTime::ZERO)
    }

    #[test]
    fn backoff_covers_the_full_window() {
        let mut sched = scheduler();
        let d_bp = Duration::from_micros(320);

        for be in 0..=5 {
            let upper = 1u32 << be;
            let mut counts = vec![0usize; upper as usize + 1];
            let draws = 2000 * counts.len();
            for _ in 0..draws {
                let delay = backoff_delay(&mut sched, be, d_bp);
                assert!(delay <= d_bp * upper);
                assert_eq!(delay.as_nanos() % d_bp.as_nanos(), 0);
                counts[(delay.as_nanos() / d_bp.as_nanos()) as usize] += 1;
            }

            // Every integer in 0..=2^be shows up about equally often.
            for count in counts {
                assert!(count > 1500 && count < 2500, "be={be} count={count}");
            }
        }
    }

    #[test]
    fn start_arms_one_backoff() {
        let mut sched = scheduler();
        let mut node = SensorNode::new(0, CsmaConfig::default());
        node.start(&mut sched);

        assert!(node.timers().is_armed(NodeTimer::Backoff));
        assert_eq!(sched.len(), 1);
        assert_eq!(node.nb(), 0);
        assert_eq!(node.be(), 3);
        assert_eq!(node.packets_remaining(), 100);
    }

    #[test]
    fn empty_queue_never_starts() {
        let mut sched = scheduler();
        let config = CsmaConfig {
            packets_to_send: 0,
            ..CsmaConfig::default()
        };
        let mut node = SensorNode::new(0, config);
        node.start(&mut sched);
        assert!(sched.is_empty());
    }
}
