//! Performance benchmarks for critical client systems

use shared::{decode_event, encode_event, within_proximity, Event, PositionEntry};
use std::time::Instant;

/// Benchmarks snapshot frame encoding and decoding
#[test]
fn benchmark_snapshot_roundtrip() {
    let positions: Vec<PositionEntry> = (0..50)
        .map(|i| PositionEntry {
            user_id: Some(format!("player_{:02}", i)),
            x: (i as f32) * 10.0,
            y: 100.0,
        })
        .collect();
    let event = Event::Positions { positions };

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode_event(&event).unwrap();
        let _decoded = decode_event(&frame).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot roundtrip: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks directory reconciliation with a full lobby
#[test]
fn benchmark_snapshot_reconciliation() {
    use client::directory::EntityDirectory;

    let snapshot: Vec<PositionEntry> = (0..100)
        .map(|i| PositionEntry {
            user_id: Some(format!("player_{:03}", i)),
            x: (i as f32) * 5.0,
            y: (i as f32) * 2.0,
        })
        .collect();

    let mut directory = EntityDirectory::new("alice");
    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        directory.reconcile(&snapshot);
    }

    let duration = start.elapsed();
    println!(
        "Reconciliation: {} entities × {} snapshots in {:?} ({:.2} μs/snapshot)",
        snapshot.len(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks proximity validation math
#[test]
fn benchmark_proximity_validation() {
    let local = (400.0_f32, 300.0_f32);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let other = ((i % 800) as f32, (i % 600) as f32);
        let _ = within_proximity(local, other);
    }

    let duration = start.elapsed();
    println!(
        "Proximity validation: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 100ms for 100k iterations
    assert!(duration.as_millis() < 100);
}

/// Stress tests movement reporting under a fast tick
#[test]
fn stress_test_movement_reports() {
    use client::movement::MovementReporter;
    use std::time::Duration;

    let mut reporter = MovementReporter::with_throttle("alice", (0.0, 0.0), Duration::ZERO);

    let iterations = 1_000;
    let start = Instant::now();

    let mut emitted = 0;
    for i in 1..=iterations {
        if reporter.report((i as f32, 0.0)).is_some() {
            emitted += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Movement reporting: {} ticks, {} reports in {:?}",
        iterations, emitted, duration
    );

    // Zero throttle: every changed position reports
    assert_eq!(emitted, iterations);
    // Should complete in under 100ms
    assert!(duration.as_millis() < 100);
}

/// Benchmarks active-call bookkeeping updates
#[test]
fn benchmark_call_set_updates() {
    use client::calls::ActiveCallSet;

    let mut set = ActiveCallSet::default();
    let iterations = 1_000;
    let start = Instant::now();

    for i in 0..iterations {
        let peer = format!("player_{:03}", i % 100);
        set.engage_pair("alice", &peer);
        set.release_pair("alice", &peer);
    }

    let duration = start.elapsed();
    println!(
        "Call set updates: {} engage/release pairs in {:?} ({:.2} μs/update)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should handle 1000 engage/release pairs in under 100ms
    assert!(duration.as_millis() < 100);
}
