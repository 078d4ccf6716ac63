//! Concurrent ingestion, status reads and idle reaping


use pepsafe_engine::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use test_helpers::{create_test_engine, ping, test_config};

#[test]
fn test_distinct_identities_in_parallel() {
    let (engine, _) = create_test_engine(test_config());
    let identities: Vec<String> = (0..8).map(|i| format!("dog-{i}")).collect();

    thread::scope(|s| {
        for identity in &identities {
            let engine = &engine;
            s.spawn(move || {
                for secs in 0..50 {
                    engine.ingest(&ping(identity, secs, 1.0, (secs * 7 % 360) as f64)).unwrap();
                }
            });
        }
    });

    assert_eq!(engine.identities().len(), 8);
    for identity in &identities {
        assert_eq!(engine.window(identity).len(), 50);
        assert_eq!(engine.status(identity).unwrap().window_len, 50);
    }
}

#[test]
fn test_same_identity_racing_duplicates() {
    let (engine, _) = create_test_engine(test_config());
    let accepted = AtomicUsize::new(0);
    let rejected = AtomicUsize::new(0);

    // Every thread delivers the same sequence; each timestamp wins exactly once
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for secs in 0..40 {
                    match engine.ingest(&ping("pepper", secs, 1.0, 0.0)) {
                        Ok(_) => accepted.fetch_add(1, Ordering::Relaxed),
                        Err(Error::OutOfOrder { .. }) => rejected.fetch_add(1, Ordering::Relaxed),
                        Err(e) => panic!("unexpected error: {e}"),
                    };
                }
            });
        }
    });

    let window = engine.window("pepper");
    assert!(!window.is_empty());
    assert!(accepted.load(Ordering::Relaxed) <= 40);
    assert_eq!(accepted.load(Ordering::Relaxed) + rejected.load(Ordering::Relaxed), 160);
    assert_eq!(window.len(), accepted.load(Ordering::Relaxed));
    for pair in window.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
}

#[test]
fn test_readers_see_whole_snapshots() {
    let (engine, _) = create_test_engine(test_config());
    engine.ingest(&ping("pepper", 0, 1.0, 0.0)).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for secs in 1..200 {
                engine.ingest(&ping("pepper", secs, (secs % 5) as f64, (secs * 37 % 360) as f64)).unwrap();
            }
        });
        for _ in 0..3 {
            s.spawn(|| {
                let mut last_seen = None;
                for _ in 0..500 {
                    let snapshot = engine.status("pepper").unwrap();
                    // Every sample fits the long horizon, so both counts come from one publication
                    assert_eq!(snapshot.features.long_window_count, snapshot.window_len);
                    if let Some(previous) = last_seen {
                        assert!(snapshot.last_ping_timestamp >= previous);
                    }
                    last_seen = Some(snapshot.last_ping_timestamp);
                }
            });
        }
    });

    assert_eq!(engine.window("pepper").len(), 200);
}

#[test]
fn test_reaping_alongside_ingestion() {
    let (engine, clock) = create_test_engine(test_config());
    engine.ingest(&ping("idle", 0, 1.0, 0.0)).unwrap();
    clock.advance(chrono::Duration::seconds(7_200));

    thread::scope(|s| {
        s.spawn(|| {
            for secs in 7_000..7_100 {
                engine.ingest(&ping("busy", secs, 1.0, 0.0)).unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..20 {
                engine.reap_idle();
            }
        });
    });

    assert!(matches!(engine.status("idle"), Err(Error::NotFound(_))));
    assert_eq!(engine.window("busy").len(), 100);
}
