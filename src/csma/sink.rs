use super::{DataFrame, CONCURRENT_TX, ENERGY, LATENCY, NUM_DROPPED, NUM_TX};
use crate::{
    env::Environment,
    time::{Duration, SimTime},
};
use serde::Serialize;
use std::fmt::Display;

/// The passive receiver of the network.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sink {
    received: u64,
    collided: u64,
    max_access_delay: Duration,
}

impl Sink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames that arrived while no other frame was in the air.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    #[must_use]
    pub fn collided(&self) -> u64 {
        self.collided
    }

    /// The longest time a received packet waited between its creation and
    /// its arrival.
    #[must_use]
    pub fn max_access_delay(&self) -> Duration {
        self.max_access_delay
    }

    /// Classifies a frame arriving at `now` and discards it.
    pub fn receive(&mut self, frame: DataFrame, env: &Environment, now: SimTime) {
        let _guard = tracing::debug_span!("sink").entered();
        let concurrent = env.get(CONCURRENT_TX);
        if concurrent > 1 {
            self.collided += 1;
            tracing::debug!(src = frame.src, concurrent, "frame collided");
        } else {
            let delay = now.saturating_duration_since(frame.created);
            self.max_access_delay = self.max_access_delay.max(delay);
            self.received += 1;
            tracing::debug!(src = frame.src, ?delay, "frame received");
        }
    }
}

///
/// The final statistics of a CSMA/CA run.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsmaReport {
    /// Received, collided and dropped packets.
    pub total: u64,
    pub received: u64,
    pub collided: u64,
    pub dropped: u64,
    /// Frames put on the air.
    pub transmitted: u64,
    /// Received over total, in percent.
    pub delivery_ratio: f64,
    /// Average latency per received packet, in ms.
    pub avg_latency_ms: f64,
    /// Average energy per received packet, in mJ.
    pub avg_energy_mj: f64,
}

fn ratio(num: f64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let denom = denom as f64;
        num / denom
    }
}

impl CsmaReport {
    /// Aggregates the sink counters and the shared totals.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(sink: &Sink, env: &Environment) -> Self {
        let dropped = u64::try_from(env.get(NUM_DROPPED)).unwrap_or(0);
        let transmitted = u64::try_from(env.get(NUM_TX)).unwrap_or(0);
        let total = sink.received + sink.collided + dropped;

        Self {
            total,
            received: sink.received,
            collided: sink.collided,
            dropped,
            transmitted,
            delivery_ratio: ratio(sink.received as f64 * 100.0, total),
            avg_latency_ms: ratio(env.get(LATENCY) * 1000.0, sink.received),
            avg_energy_mj: ratio(env.get(ENERGY), sink.received),
        }
    }
}

impl Display for CsmaReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total number of packets:    {}", self.total)?;
        writeln!(f, "  received:                 {}", self.received)?;
        writeln!(f, "  collided:                 {}", self.collided)?;
        writeln!(f, "  dropped:                  {}", self.dropped)?;
        writeln!(f, "Average delivery ratio:     {:.3} %", self.delivery_ratio)?;
        writeln!(f, "Average packet latency:     {:.3} ms", self.avg_latency_ms)?;
        writeln!(f, "Average energy consumption: {:.3} mJ", self.avg_energy_mj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CsmaConfig, csma::CsmaApp};

    fn ms(millis: u64) -> SimTime {
        SimTime::from_duration(Duration::from_millis(millis))
    }

    fn frame(created: SimTime) -> DataFrame {
        DataFrame { src: 0, created }
    }

    #[test]
    fn classifies_by_concurrency() {
        let mut env = CsmaApp::new(CsmaConfig::default()).env;
        let mut sink = Sink::new();
        let now = ms(1000);

        env.set(CONCURRENT_TX, 1);
        sink.receive(frame(SimTime::ZERO), &env, now);
        env.set(CONCURRENT_TX, 2);
        sink.receive(frame(SimTime::ZERO), &env, now);
        sink.receive(frame(SimTime::ZERO), &env, now);

        assert_eq!(sink.received(), 1);
        assert_eq!(sink.collided(), 2);
    }

    #[test]
    fn access_delay_only_counts_received_frames() {
        let mut env = CsmaApp::new(CsmaConfig::default()).env;
        let mut sink = Sink::new();

        env.set(CONCURRENT_TX, 1);
        sink.receive(frame(ms(5000)), &env, ms(5002));
        sink.receive(frame(ms(10_000)), &env, ms(10_001));
        assert_eq!(sink.max_access_delay(), Duration::from_millis(2));

        // A collided frame that waited longer leaves the maximum alone.
        env.set(CONCURRENT_TX, 2);
        sink.receive(frame(ms(15_000)), &env, ms(15_500));
        assert_eq!(sink.max_access_delay(), Duration::from_millis(2));
    }

    #[test]
    fn report_without_traffic_is_zero() {
        let app = CsmaApp::new(CsmaConfig::default());
        let report = app.report();
        assert_eq!(report.total, 0);
        assert_eq!(report.delivery_ratio, 0.0);
        assert_eq!(report.avg_latency_ms, 0.0);
        assert_eq!(report.avg_energy_mj, 0.0);
    }

    #[test]
    fn report_averages_per_received_packet() {
        let mut env = CsmaApp::new(CsmaConfig::default()).env;
        env.set(NUM_DROPPED, 1);
        env.set(LATENCY, 0.01);
        env.set(ENERGY, 4.0);
        let sink = Sink {
            received: 2,
            collided: 1,
            ..Sink::default()
        };

        let report = CsmaReport::new(&sink, &env);
        assert_eq!(report.total, 4);
        assert!((report.delivery_ratio - 50.0).abs() < 1e-9);
        assert!((report.avg_latency_ms - 5.0).abs() < 1e-9);
        assert!((report.avg_energy_mj - 2.0).abs() < 1e-9);
    }
}
