use serial_test::serial;
use wsnsim::{
    dualbeacon::{
        DualBeaconEvents, SensorTimer, SinkTimer, IN_COMMUNICATION, IN_DISCOVERY, NUM_PASSAGES,
        X_MS,
    },
    prelude::*,
};

fn lossless(total_passages: u32) -> DualBeaconConfig {
    DualBeaconConfig {
        total_passages,
        loss: ChannelLoss::None,
        ..DualBeaconConfig::default()
    }
}

/// Panics if any timer of the sensor or the sink has more than one live event.
fn assert_unique_timers(rt: &Runtime<DualBeaconApp>) {
    let mut sensor: Vec<SensorTimer> = Vec::new();
    let mut sink: Vec<SinkTimer> = Vec::new();
    for (_, event) in rt.scheduler().pending() {
        match event {
            DualBeaconEvents::Sensor(timer) => {
                assert!(!sensor.contains(timer), "two live {timer:?} events");
                sensor.push(*timer);
            }
            DualBeaconEvents::Sink(timer) => {
                assert!(!sink.contains(timer), "two live {timer:?} events");
                sink.push(*timer);
            }
            DualBeaconEvents::Arrival(_) => {}
        }
    }
}

#[test]
#[serial]
fn passages_complete_and_terminate() {
    let config = lossless(2);
    let rt = Builder::seeded(1).quiet().build(DualBeaconApp::new(config.clone()));
    let (app, time, _) = rt.run().unwrap();

    // Two passages of 202m at 11.111 m/s.
    let passage = 2.0 * (config.discovery_range + 1.0) / config.speed;
    assert!(f64::from(time) >= 2.0 * passage - 0.01);

    assert_eq!(app.env.get(NUM_PASSAGES), 2);
    assert_eq!(app.env.get(X_MS), config.start_position().0);
    assert!(!app.env.get(IN_DISCOVERY));
    assert!(!app.env.get(IN_COMMUNICATION));
    assert!(app.sink.timers().armed().next().is_none());

    let report = app.report();
    assert_eq!(report.passages, 2);
    // Every transfer ends with the mobile sink out of reach.
    assert_eq!(report.arq_failures, report.times_discovered);
    assert!(!app.sensor.in_transfer());
}

#[test]
#[serial]
fn lossless_passage_delivers_data() {
    let mut delivered = false;

    for seed in 0..10 {
        let rt = Builder::seeded(seed)
            .quiet()
            .build(DualBeaconApp::new(lossless(2)));
        let (app, _, _) = rt.run().unwrap();
        let report = app.report();

        assert!(report.correct_rx >= report.ack_packets);
        assert!(report.correct_rx <= report.ack_packets + report.times_discovered);
        assert!(report.data_sent >= report.ack_packets);
        assert!(report.frames_delivered > 0);

        if report.ack_packets > 0 {
            delivered = true;
            assert!(report.correct_rx > 0);
            assert!(report.throughput > 0.0);
            assert!(report.energy_transfer > 0.0);
        }
    }

    assert!(delivered, "no run completed a single ack exchange");
}

#[test]
#[serial]
fn step_wise_protocol_invariants() {
    let config = lossless(1);
    let mut rt = Builder::seeded(4).quiet().build(DualBeaconApp::new(config.clone()));
    rt.start();
    assert_unique_timers(&rt);

    let mut discovered = 0;
    let mut failures = 0;
    while !rt.scheduler().is_empty() {
        rt.dispatch_n_events(1);
        assert_unique_timers(&rt);

        let sensor = &rt.app.sensor;
        assert!(sensor.ack_misses() < config.max_ack_misses);

        // Only one of the radio edges is pending at a time, and none during a transfer.
        let timers = sensor.timers();
        assert!(!(timers.is_armed(SensorTimer::RadioOn) && timers.is_armed(SensorTimer::RadioOff)));
        assert!(!(timers.is_armed(SensorTimer::TxTimeout) && timers.is_armed(SensorTimer::RadioOff)));
        if sensor.in_transfer() {
            assert!(sensor.radio_on());
            assert!(!timers.is_armed(SensorTimer::RadioOn));
        }

        if sensor.times_discovered() > discovered {
            discovered = sensor.times_discovered();
            // Short beacons are only heard in the communication range, give or
            // take a step taken at the same instant.
            let step = config.speed * config.delta;
            assert!(rt.app.env.get(X_MS).abs() <= config.communication_range + step);
            assert!(sensor.radio_on());
        }

        if sensor.arq_failures() > failures {
            failures = sensor.arq_failures();
            assert_eq!(failures, discovered);
            assert!(!sensor.in_transfer());
            assert!(timers.is_armed(SensorTimer::DutyRevert));
            assert!(timers.is_armed(SensorTimer::RadioOff));
        }
    }

    let (app, _, _) = rt.finish().unwrap();
    assert_eq!(app.sensor.arq_failures(), app.sensor.times_discovered());
}

#[test]
#[serial]
fn distance_loss_runs_to_completion() {
    let config = DualBeaconConfig {
        total_passages: 2,
        ..DualBeaconConfig::default()
    };
    let rt = Builder::seeded(99).quiet().build(DualBeaconApp::new(config));
    let (app, _, _) = rt.run().unwrap();

    let report = app.report();
    assert_eq!(report.passages, 2);
    assert!(report.frames_dropped > 0);
    assert!(report.discovery_ratio >= 0.0);
    assert!(report.correct_rx <= report.data_sent);
    assert_eq!(report.arq_failures, report.times_discovered);
}

#[test]
#[serial]
fn identical_seeds_give_identical_runs() {
    let run = |seed| {
        let config = DualBeaconConfig {
            total_passages: 1,
            ..DualBeaconConfig::default()
        };
        let rt = Builder::seeded(seed).quiet().build(DualBeaconApp::new(config));
        let (app, time, _) = rt.run().unwrap();
        (app.report(), time)
    };

    assert_eq!(run(8), run(8));
}
