//! Integration coverage for the state broker's snapshot-then-live and
//! overflow-drop scenarios (spec.md §8, scenarios 3 and 4).

use nomad_engine::broker::StateBroker;

#[test]
fn snapshot_then_live_delivers_exactly_one_snapshot_per_matching_pattern() {
    let broker = StateBroker::new(10);
    broker.update_queue_state(|q| q.pending = 3);
    broker.update_worker_state("0", serde_json::json!({"state": "idle"}));

    let mut sub = broker.subscribe(vec!["queue:status".to_string(), "worker:*:status".to_string()]);

    let first = sub.receiver.try_recv().unwrap();
    let second = sub.receiver.try_recv().unwrap();
    let mut topics = vec![first.topic, second.topic];
    topics.sort();
    assert_eq!(topics, vec!["queue:status".to_string(), "worker:0:status".to_string()]);
    assert!(sub.receiver.try_recv().is_err(), "no more than the two snapshots before any live publish");

    broker.update_worker_state("0", serde_json::json!({"state": "busy"}));
    let live = sub.receiver.try_recv().unwrap();
    assert_eq!(live.topic, "worker:0:status");
    assert!(sub.receiver.try_recv().is_err());
}

/// Scenario 4: a slow subscriber (never drains) with buffer size B
/// receiving B+5 events keeps exactly the first B and drops the rest; a
/// subscriber that keeps its buffer empty by draining between publishes
/// receives all B+5, and the publisher never blocks doing either.
#[test]
fn overflow_drop_keeps_first_b_events_for_slow_client_only() {
    const B: usize = 3;
    let broker = StateBroker::new(B);

    let mut slow = broker.subscribe(vec!["queue:status".to_string()]);
    let mut draining = broker.subscribe(vec!["queue:status".to_string()]);
    let _ = slow.receiver.try_recv();
    let _ = draining.receiver.try_recv();

    let mut draining_seen = Vec::new();
    for i in 0..(B + 5) {
        broker.update_queue_state(|q| q.pending = i as i64);
        draining_seen.push(draining.receiver.try_recv().unwrap());
    }

    let mut slow_seen = Vec::new();
    while let Ok(event) = slow.receiver.try_recv() {
        slow_seen.push(event);
    }
    assert_eq!(slow_seen.len(), B, "slow client keeps exactly its buffer capacity worth of events");
    assert_eq!(slow_seen[0].payload["pending"], 0);
    assert_eq!(slow_seen[B - 1].payload["pending"], (B - 1) as i64);
    assert_eq!(draining_seen.len(), B + 5, "a subscriber draining as it goes sees every event, none dropped");
}

#[test]
fn pattern_mismatch_never_reaches_subscriber() {
    let broker = StateBroker::new(10);
    let mut sub = broker.subscribe(vec!["worker:*:status".to_string()]);
    broker.update_queue_state(|q| q.pending = 1);
    broker.update_system_health("ok", None);
    assert!(sub.receiver.try_recv().is_err());
}
