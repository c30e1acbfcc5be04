use std::sync::Arc;

use livescope_core::prelude::*;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const T0: f64 = 10_000.0;

fn config(sample_rate: f64) -> ScopeConfig {
    ScopeConfig {
        sample_rate,
        color_seed: Some(7),
        ..ScopeConfig::default()
    }
}

fn server(sample_rate: f64, start: f64) -> (ScopeServer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    let server = ScopeServer::with_clock(&config(sample_rate), clock.clone()).unwrap();
    (server, clock)
}

/// Ingest `count` samples of channel `id` starting at `start`, advancing the clock
fn ingest_run(server: &ScopeServer, clock: &ManualClock, id: &str, start: f64, count: usize) {
    let period = server.sample_period();
    for i in 0..count {
        let time = start + i as f64 * period;
        clock.set(time);
        server.ingest(&SampleBatch::new(time, vec![ChannelSample::new(id, i as f64)]));
    }
    clock.set(start + count as f64 * period);
}

/// Two sessions of channel "A": [0, 1000) and [1500, 2000), store left paused
fn two_session_server() -> (ScopeServer, Arc<ManualClock>) {
    let (server, clock) = server(100.0, 0.0);
    ingest_run(&server, &clock, "A", 0.0, 100);
    server.pause();
    clock.set(1500.0);
    server.play();
    ingest_run(&server, &clock, "A", 1500.0, 50);
    server.pause();
    (server, clock)
}

#[test]
fn test_single_channel_one_second() {
    let (server, clock) = server(100.0, T0);
    ingest_run(&server, &clock, "A", T0, 100);

    let data = server.get_data(&DataOptions::default());
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].data.len(), 1);
    let count = data[0].data[0].values.len();
    assert!((90..=110).contains(&count), "got {count} samples");
    server.check_invariants().unwrap();
}

#[test]
fn test_clipped_window_inside_one_session() {
    let (server, clock) = server(100.0, T0);
    ingest_run(&server, &clock, "A", T0, 100);
    server.pause();

    let data = server.get_data(&SessionWindow::between(T0 + 50.0, T0 + 150.0).into());
    assert_eq!(data.len(), 1);
    let session = &data[0];
    assert_eq!(session.start_time, T0 + 50.0);
    assert_eq!(session.end_time, Some(T0 + 150.0));

    let values = &session.data[0].values;
    assert_eq!(values.len(), 10);
    // Sample i holds the value i, so the first kept sample is the one at T0 + 50
    assert_eq!(values.first(), Some(&5.0));
    assert_eq!(values.last(), Some(&14.0));
}

#[test]
fn test_clipped_samples_stay_inside_window() {
    let (server, _clock) = two_session_server();
    let period = server.sample_period();

    let windows = [
        (-500.0, 250.0),
        (5.0, 995.0),
        (999.0, 1501.0),
        (990.0, 1600.0),
        (1200.0, 1400.0),
        (1234.5, 3000.0),
        (0.0, 2000.0),
    ];

    for (start, end) in windows {
        for session in server.get_data(&SessionWindow::between(start, end).into()) {
            let count = session.sample_count();
            assert!(count > 0, "empty boundary session kept for {start}..{end}");
            let first = session.start_time;
            let last = session.start_time + (count - 1) as f64 * period;
            assert!(first >= start, "sample at {first} before {start}");
            assert!(last < end, "sample at {last} not before {end}");
            for channel in &session.data {
                assert_eq!(channel.values.len(), count);
            }
        }
    }
}

#[test]
fn test_window_in_gap_is_empty() {
    let (server, _clock) = two_session_server();
    assert!(server.get_data(&SessionWindow::between(1100.0, 1400.0).into()).is_empty());
    assert!(server.get_sessions(&SessionWindow::between(1100.0, 1400.0)).is_empty());
}

#[test]
fn test_inverted_or_empty_windows() {
    let (server, _clock) = two_session_server();
    assert!(server.get_data(&SessionWindow::between(500.0, 500.0).into()).is_empty());
    assert!(server.get_data(&SessionWindow::between(600.0, 500.0).into()).is_empty());
    assert!(server.get_sessions(&SessionWindow::starting_at(0.0, 0.0)).is_empty());
    assert!(server.get_sessions(&SessionWindow::ending_at(2000.0, -5.0)).is_empty());
}

#[test]
fn test_queries_are_idempotent_while_paused() {
    let (server, _clock) = two_session_server();
    let options = DataOptions::new(SessionWindow::between(300.0, 1800.0)).with_precision(40);
    let first = server.get_data(&options);
    let second = server.get_data(&options);
    assert_eq!(first, second);
}

#[test]
fn test_results_are_copies() {
    let (server, _clock) = two_session_server();
    let mut data = server.get_data(&DataOptions::default());
    data[0].data[0].values.clear();
    data[0].start_time = -1.0;

    let again = server.get_data(&DataOptions::default());
    assert_eq!(again[0].data[0].values.len(), 100);
    assert_eq!(again[0].start_time, 0.0);
}

#[test]
fn test_sessions_never_overlap() {
    let (server, _clock) = two_session_server();
    let spans = server.get_sessions(&SessionWindow::All);
    for pair in spans.windows(2) {
        let end = pair[0].end_time.expect("only the last session may be open");
        assert!(end <= pair[1].start_time);
    }
    server.check_invariants().unwrap();
}

#[test]
fn test_pause_gap_matches_pause_duration() {
    let (server, _clock) = two_session_server();
    let spans = server.get_sessions(&SessionWindow::All);
    // Empty activation session, then the two recorded ones
    assert_eq!(spans.len(), 3);
    assert_eq!(spans[1].end_time, Some(1000.0));
    assert_eq!(spans[2].start_time, 1500.0);
    assert_eq!(spans[2].start_time - spans[1].end_time.unwrap(), 500.0);
}

#[test]
fn test_end_duration_skips_gap() {
    let (server, _clock) = two_session_server();
    let spans = server.get_sessions(&SessionWindow::ending_at(2000.0, 700.0));
    assert_eq!(
        spans,
        vec![
            SessionSpan { start_time: 800.0, end_time: Some(1000.0) },
            SessionSpan { start_time: 1500.0, end_time: Some(2000.0) },
        ]
    );

    let data = server.get_data(&SessionWindow::ending_at(2000.0, 700.0).into());
    let counts: Vec<usize> = data.iter().map(Session::sample_count).collect();
    assert_eq!(counts, vec![20, 50]);
}

#[test]
fn test_start_duration_skips_gap() {
    let (server, _clock) = two_session_server();
    let spans = server.get_sessions(&SessionWindow::starting_at(900.0, 300.0));
    assert_eq!(
        spans,
        vec![
            SessionSpan { start_time: 900.0, end_time: Some(1000.0) },
            SessionSpan { start_time: 1500.0, end_time: Some(1700.0) },
        ]
    );
}

#[test]
fn test_duration_spills_into_gap_when_history_is_short() {
    let (server, _clock) = two_session_server();
    // Only 1500ms were recorded in total
    let spans = server.get_sessions(&SessionWindow::ending_at(2000.0, 1600.0));
    assert_eq!(spans.first().map(|s| s.start_time), Some(0.0));
    let spans = server.get_sessions(&SessionWindow::starting_at(0.0, 1600.0));
    assert_eq!(spans.last().and_then(|s| s.end_time), Some(2000.0));
}

#[test]
fn test_precision_is_shared_across_sessions() {
    let (server, _clock) = two_session_server();
    let options = DataOptions::new(SessionWindow::ending_at(2000.0, 700.0)).with_precision(35);
    let data = server.get_data(&options);
    let counts: Vec<usize> = data.iter().map(|s| s.data[0].values.len()).collect();
    assert_eq!(counts, vec![10, 25]);
}

#[test]
fn test_precision_bound_and_identity() {
    let (server, _clock) = two_session_server();
    let raw = server.get_data(&DataOptions::default());
    let total: usize = raw.iter().map(Session::sample_count).sum();

    for target in [1, 7, 50, 149] {
        let reduced = server.get_data(&DataOptions::default().with_precision(target));
        for session in &reduced {
            for channel in &session.data {
                assert!(channel.values.len() <= target);
            }
        }
    }

    let unchanged = server.get_data(&DataOptions::default().with_precision(total));
    assert_eq!(unchanged, raw);
}

#[test]
fn test_new_channel_mid_session() {
    let (server, clock) = server(100.0, 0.0);
    ingest_run(&server, &clock, "A", 0.0, 10);
    clock.set(100.0);
    server.ingest(&SampleBatch::new(
        100.0,
        vec![ChannelSample::new("A", 1.0), ChannelSample::new("B", 2.0)],
    ));

    let data = server.get_data(&DataOptions::default());
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].data.len(), 1);
    assert_eq!(data[0].end_time, Some(100.0));
    assert_eq!(data[1].data.len(), 2);
    assert_eq!(data[1].start_time, 100.0);
    server.check_invariants().unwrap();
}

#[test]
fn test_play_without_channels_is_noop() {
    let (server, _clock) = server(100.0, 0.0);
    assert!(server.pause());
    assert!(!server.play());
    assert!(server.is_paused());
    assert!(server.get_sessions(&SessionWindow::All).is_empty());
}

#[test]
fn test_pause_and_play_are_idempotent() {
    let (server, clock) = server(100.0, 0.0);
    ingest_run(&server, &clock, "A", 0.0, 10);

    assert!(server.pause());
    assert!(!server.pause());
    assert!(server.is_paused());

    assert!(server.play());
    assert!(!server.play());
    assert!(!server.is_paused());
    assert_eq!(server.get_sessions(&SessionWindow::All).len(), 3);
}

#[test]
fn test_paused_server_ignores_samples() {
    let (server, clock) = server(100.0, 0.0);
    ingest_run(&server, &clock, "A", 0.0, 10);
    server.pause();
    let accepted = server.ingest(&SampleBatch::new(200.0, vec![ChannelSample::new("A", 1.0)]));
    assert_eq!(accepted, 0);
    let data = server.get_data(&DataOptions::default());
    assert_eq!(data[0].sample_count(), 10);
}

#[test]
fn test_liveness_expires_and_recovers() {
    let (server, clock) = server(100.0, 0.0);
    ingest_run(&server, &clock, "A", 0.0, 10);
    assert_eq!(server.alive_channels().len(), 1);

    clock.set(5000.0);
    assert_eq!(server.refresh_liveness(), vec!["A".to_string()]);
    assert!(server.alive_channels().is_empty());
    assert_eq!(server.channels().len(), 1);

    server.ingest(&SampleBatch::new(5000.0, vec![ChannelSample::new("A", 1.0)]));
    assert_eq!(server.alive_channels().len(), 1);
}

#[test]
fn test_channel_colors_are_spread() {
    let (server, _clock) = server(100.0, 0.0);
    server.ingest(&SampleBatch::new(
        0.0,
        vec![ChannelSample::new("A", 1.0), ChannelSample::new("B", 2.0)],
    ));
    let channels = server.channels();
    let a = channels[0].color.hue;
    let b = channels[1].color.hue;
    assert_eq!(b, (a + 180) % 360);
}

#[test]
fn test_gap_markers_survive_json() {
    let (server, clock) = server(100.0, 0.0);
    server.ingest(&SampleBatch::new(
        0.0,
        vec![ChannelSample::new("A", 1.0), ChannelSample::new("B", 2.0)],
    ));
    clock.set(10.0);
    server.ingest(&SampleBatch::new(10.0, vec![ChannelSample::new("A", 3.0)]));

    let data = server.get_data(&DataOptions::default());
    let json = serde_json::to_string(&data).unwrap();
    let back: Vec<Session> = serde_json::from_str(&json).unwrap();

    assert_eq!(back.len(), 1);
    assert_eq!(back[0].id, data[0].id);
    assert_eq!(back[0].channel("A").unwrap().values, vec![1.0, 3.0]);
    let b = &back[0].channel("B").unwrap().values;
    assert_eq!(b[0], 2.0);
    assert!(b[1].is_nan());
}

#[test]
fn test_random_operations_keep_invariants() {
    let (server, clock) = server(100.0, 0.0);
    let period = server.sample_period();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut known = 0usize;

    for step in 0..2000 {
        clock.advance(period);
        let now = clock.now();

        match rng.gen_range(0..20) {
            0 => {
                server.pause();
            }
            1 => {
                server.play();
            }
            roll => {
                // A new channel now and then, otherwise a random subset of the known ones
                let new_channel = roll == 2;
                if new_channel {
                    known += 1;
                }
                let mut samples = Vec::new();
                for i in 1..=known {
                    if (new_channel && i == known) || rng.gen_bool(0.7) {
                        samples.push(ChannelSample::new(format!("ch{i}"), rng.gen_range(-1.0..1.0)));
                    }
                }
                server.ingest(&SampleBatch::new(now, samples));
            }
        }

        if let Err(violation) = server.check_invariants() {
            panic!("step {step}: {violation}");
        }
        for session in server.get_data(&DataOptions::default()) {
            if let Some(end) = session.end_time {
                assert!(
                    session.data_end(period) <= end,
                    "step {step}: samples of session {} run past its end",
                    session.id
                );
            }
        }
    }

    assert!(server.get_sessions(&SessionWindow::All).len() > 3);
    // Channels announced while paused are never registered
    assert!(server.channels().len() <= known);
}
