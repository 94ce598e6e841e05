use serial_test::serial;
use wsnsim::{
    csma::{CsmaEvents, NodeTimer, CHANNEL_FREE, CONCURRENT_TX, NUM_DROPPED, NUM_TX},
    prelude::*,
};

fn single_node(packets_to_send: u32) -> CsmaConfig {
    CsmaConfig {
        num_nodes: 1,
        packets_to_send,
        ..CsmaConfig::default()
    }
}

/// Panics if any (node, timer) pair has more than one live event.
fn assert_unique_timers(rt: &Runtime<CsmaApp>) {
    let mut seen = Vec::new();
    for (_, event) in rt.scheduler().pending() {
        if let CsmaEvents::Node(event) = event {
            assert!(
                !seen.contains(&(event.node, event.timer)),
                "two live events for {event:?}"
            );
            seen.push((event.node, event.timer));
        }
    }
}

#[test]
#[serial]
fn single_packet_on_a_free_channel() {
    let mut rt = Builder::seeded(12).quiet().build(CsmaApp::new(single_node(1)));
    rt.start();

    let mut timers = Vec::new();
    while !rt.scheduler().is_empty() {
        let before = rt
            .scheduler()
            .pending()
            .filter_map(|(_, e)| match e {
                CsmaEvents::Node(event) => Some(event.timer),
                CsmaEvents::Arrival(_) => None,
            })
            .collect::<Vec<_>>();
        timers.extend(before);
        rt.dispatch_n_events(1);
        assert_unique_timers(&rt);
    }
    timers.dedup();
    assert_eq!(
        timers,
        vec![
            NodeTimer::Backoff,
            NodeTimer::ChannelBusy,
            NodeTimer::Send,
            NodeTimer::ChannelFree,
            NodeTimer::DecreaseTx,
        ]
    );

    let (app, _, _) = rt.finish().unwrap();
    assert_eq!(app.sink.received(), 1);
    assert_eq!(app.sink.collided(), 0);
    assert_eq!(app.env.get(NUM_DROPPED), 0);
    assert_eq!(app.env.get(NUM_TX), 1);
    assert_eq!(app.env.get(CONCURRENT_TX), 0);
    assert!(app.env.get(CHANNEL_FREE));

    let node = &app.nodes[0];
    assert_eq!(node.packets_remaining(), 0);
    assert_eq!(node.nb(), 0);
    assert_eq!(node.be(), 3);

    let report = app.report();
    assert_eq!(report.total, 1);
    assert!((report.delivery_ratio - 100.0).abs() < 1e-9);
    // One assessment and one transmission.
    let config = app.config();
    let energy = config.p_rx * config.cca_duration + config.p_tx * config.packet_duration;
    assert!((report.avg_energy_mj - energy).abs() < 1e-9);
    // Latency covers the backoff, the claim and the airtime.
    let min_latency = (config.backoff_period + config.packet_duration) * 1000.0;
    assert!(report.avg_latency_ms >= min_latency - 1e-6);
    // The sink heard the frame one airtime before the channel was released.
    let airtime_ms = config.packet_duration().as_secs_f64() * 1000.0;
    let delay_ms = app.sink.max_access_delay().as_secs_f64() * 1000.0;
    assert!((report.avg_latency_ms - airtime_ms - delay_ms).abs() < 1e-6);
}

#[test]
#[serial]
fn channel_claimed_and_released_around_the_frame() {
    let mut rt = Builder::seeded(3).quiet().build(CsmaApp::new(single_node(1)));
    rt.start();

    // Backoff, then the claim.
    rt.dispatch_n_events(2);
    assert!(!rt.app.env.get(CHANNEL_FREE));
    assert_eq!(rt.app.env.get(CONCURRENT_TX), 0);

    // Send, then the arrival at the sink in the same instant.
    rt.dispatch_n_events(1);
    let sent_at = rt.sim_time();
    assert_eq!(rt.app.env.get(CONCURRENT_TX), 1);
    rt.dispatch_n_events(1);
    assert_eq!(rt.sim_time(), sent_at);
    assert_eq!(rt.app.sink.received(), 1);

    // Released after the airtime.
    rt.dispatch_n_events(1);
    assert!(rt.app.env.get(CHANNEL_FREE));
    assert_eq!(rt.sim_time() - sent_at, rt.app.config().packet_duration());
    assert_eq!(rt.app.env.get(CONCURRENT_TX), 1);

    rt.dispatch_n_events(1);
    assert_eq!(rt.app.env.get(CONCURRENT_TX), 0);
    assert!(rt.scheduler().is_empty());
}

#[test]
#[serial]
fn busy_channel_drops_after_max_backoffs() {
    let mut rt = Builder::seeded(5).quiet().build(CsmaApp::new(single_node(2)));
    rt.app.env.set(CHANNEL_FREE, false);
    rt.start();

    for attempt in 1..=4 {
        rt.dispatch_n_events(1);
        let node = &rt.app.nodes[0];
        assert_eq!(node.nb(), attempt);
        assert_eq!(node.be(), (3 + attempt).min(5));
        assert_eq!(rt.app.env.get(NUM_DROPPED), 0);
        assert_unique_timers(&rt);
    }

    // The fifth busy assessment gives up on the packet.
    rt.dispatch_n_events(1);
    let node = &rt.app.nodes[0];
    assert_eq!(rt.app.env.get(NUM_DROPPED), 1);
    assert_eq!(node.nb(), 0);
    assert_eq!(node.be(), 3);
    assert_eq!(node.packets_remaining(), 1);
    assert!(node.timers().is_armed(NodeTimer::Backoff));

    // The next packet is due one packet gap after the start.
    let due = rt.scheduler().pending().map(|(t, _)| t).min().unwrap();
    let gap = rt.app.config().inter_packet_gap();
    let max_backoff = rt.app.config().backoff_period() * 8;
    assert!(due >= SimTime::ZERO + gap && due <= SimTime::ZERO + gap + max_backoff);

    rt.dispatch_all();
    let (app, _, _) = rt.finish().unwrap();
    assert_eq!(app.env.get(NUM_DROPPED), 2);
    assert_eq!(app.env.get(NUM_TX), 0);
    assert_eq!(app.report().delivery_ratio, 0.0);
}

#[test]
#[serial]
fn contending_nodes_share_the_channel() {
    let config = CsmaConfig {
        num_nodes: 5,
        packets_to_send: 20,
        ..CsmaConfig::default()
    };
    let rt = Builder::seeded(2024).quiet().build(CsmaApp::new(config));
    let (app, _, _) = rt.run().unwrap();

    let report = app.report();
    assert_eq!(report.total, 100);
    assert_eq!(report.received + report.collided + report.dropped, 100);
    assert_eq!(report.transmitted, report.received + report.collided);
    assert!(report.received > 0);
    assert_eq!(app.env.get(CONCURRENT_TX), 0);
    assert!(app.env.get(CHANNEL_FREE));
    assert!(app.nodes.iter().all(|n| n.packets_remaining() == 0));
}

#[test]
#[serial]
fn identical_seeds_give_identical_runs() {
    let run = |seed| {
        let config = CsmaConfig {
            num_nodes: 3,
            packets_to_send: 10,
            ..CsmaConfig::default()
        };
        let rt = Builder::seeded(seed).quiet().build(CsmaApp::new(config));
        let (app, time, _) = rt.run().unwrap();
        (app.report(), time)
    };

    assert_eq!(run(77), run(77));
}
