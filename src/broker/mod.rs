//! State broker: the single source of truth for queue/job/worker/health
//! state, fanned out to subscribers as a live event stream.
//!
//! Ported from `nomarr/components/events/event_broker_comp.py`
//! (`StateBroker`). Diverges from the teacher's `ConnectionManager`
//! (which awaits `send().await` and treats failure as disconnect): this
//! broker must never block a publisher on a slow consumer, so per-client
//! sends use `try_send` and drop on `Full`.

mod glob;

use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

const SYSTEM_HEALTH_ERROR_CAPACITY: usize = 50;

/// Discriminates a snapshot (pre-existing state, sent once on subscribe)
/// from the live update kinds. Snapshot and live events share the same
/// `Event` shape except for this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Snapshot,
    StateUpdate,
    JobUpdate,
    WorkerUpdate,
    JobRemoved,
}

/// An event delivered to subscribers. `topic` and `timestamp_ms` are
/// stamped by the broker on every broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub topic: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp_ms: i64,
    pub payload: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueState {
    pub pending: i64,
    pub running: i64,
    pub done: i64,
    pub error: i64,
    pub avg_processing_time_sec: Option<f64>,
    pub eta_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemHealth {
    pub status: String,
    pub recent_errors: VecDeque<String>,
}

struct ClientSlot {
    sender: mpsc::Sender<Event>,
    patterns: Vec<String>,
    created_at_ms: i64,
}

struct Inner {
    queue_state: QueueState,
    jobs_state: HashMap<i64, Value>,
    worker_state: HashMap<String, Value>,
    system_health: SystemHealth,
    clients: HashMap<Uuid, ClientSlot>,
}

/// Handle returned by [`StateBroker::subscribe`]; holds the receiving end
/// of a client's bounded event channel plus its id for later unsubscribe.
pub struct Subscription {
    pub client_id: Uuid,
    pub receiver: mpsc::Receiver<Event>,
}

pub struct StateBroker {
    inner: Mutex<Inner>,
    buffer_capacity: usize,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

impl StateBroker {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue_state: QueueState::default(),
                jobs_state: HashMap::new(),
                worker_state: HashMap::new(),
                system_health: SystemHealth {
                    status: "starting".to_string(),
                    recent_errors: VecDeque::new(),
                },
                clients: HashMap::new(),
            }),
            buffer_capacity,
        }
    }

    pub fn update_queue_state(&self, f: impl FnOnce(&mut QueueState)) {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner.queue_state);
        let payload = serde_json::to_value(&inner.queue_state).unwrap();
        self.broadcast_locked(&mut inner, "queue:status", EventType::StateUpdate, payload);
    }

    pub fn update_job_state(&self, job_id: i64, snapshot: Value) {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs_state.insert(job_id, snapshot.clone());
        self.broadcast_locked(&mut inner, "queue:jobs", EventType::JobUpdate, snapshot);
    }

    pub fn remove_job(&self, job_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs_state.remove(&job_id);
        let payload = serde_json::json!({ "job_id": job_id, "removed": true });
        self.broadcast_locked(&mut inner, "queue:jobs", EventType::JobRemoved, payload);
    }

    pub fn update_worker_state(&self, worker_id: &str, snapshot: Value) {
        let mut inner = self.inner.lock().unwrap();
        inner.worker_state.insert(worker_id.to_string(), snapshot.clone());
        let topic = format!("worker:{}:status", worker_id);
        self.broadcast_locked(&mut inner, &topic, EventType::WorkerUpdate, snapshot);
    }

    pub fn update_system_health(&self, status: &str, error: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.system_health.status = status.to_string();
        if let Some(err) = error {
            if inner.system_health.recent_errors.len() >= SYSTEM_HEALTH_ERROR_CAPACITY {
                inner.system_health.recent_errors.pop_front();
            }
            inner.system_health.recent_errors.push_back(err);
        }
        let payload = serde_json::to_value(&inner.system_health).unwrap();
        self.broadcast_locked(&mut inner, "system:health", EventType::StateUpdate, payload);
    }

    /// Register a subscriber and, while still holding the lock, enqueue one
    /// snapshot event per pattern with a well-known snapshot answer so the
    /// client sees exactly one snapshot per matching topic with no gap
    /// before the live stream.
    pub fn subscribe(&self, patterns: Vec<String>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        let client_id = Uuid::new_v4();

        let mut inner = self.inner.lock().unwrap();

        for topic in self.snapshot_topics(&inner, &patterns) {
            let _ = tx.try_send(topic);
        }

        inner.clients.insert(
            client_id,
            ClientSlot {
                sender: tx,
                patterns,
                created_at_ms: now_ms(),
            },
        );

        Subscription { client_id, receiver: rx }
    }

    pub fn unsubscribe(&self, client_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.clients.remove(&client_id);
    }

    pub fn client_count(&self) -> usize {
        self.inner.lock().unwrap().clients.len()
    }

    fn snapshot_topics(&self, inner: &Inner, patterns: &[String]) -> Vec<Event> {
        let mut events = Vec::new();
        let now = now_ms();

        let matches_any = |topic: &str| patterns.iter().any(|p| glob::matches(p, topic));

        if matches_any("queue:status") {
            events.push(Event {
                topic: "queue:status".to_string(),
                event_type: EventType::Snapshot,
                timestamp_ms: now,
                payload: serde_json::to_value(&inner.queue_state).unwrap(),
            });
        }
        if matches_any("queue:jobs") {
            for snapshot in inner.jobs_state.values() {
                events.push(Event {
                    topic: "queue:jobs".to_string(),
                    event_type: EventType::Snapshot,
                    timestamp_ms: now,
                    payload: snapshot.clone(),
                });
            }
        }
        for (worker_id, snapshot) in &inner.worker_state {
            let topic = format!("worker:{}:status", worker_id);
            if matches_any(&topic) {
                events.push(Event {
                    topic,
                    event_type: EventType::Snapshot,
                    timestamp_ms: now,
                    payload: snapshot.clone(),
                });
            }
        }
        if matches_any("system:health") {
            events.push(Event {
                topic: "system:health".to_string(),
                event_type: EventType::Snapshot,
                timestamp_ms: now,
                payload: serde_json::to_value(&inner.system_health).unwrap(),
            });
        }

        events
    }

    fn broadcast_locked(&self, inner: &mut Inner, topic: &str, event_type: EventType, payload: Value) {
        let event = Event {
            topic: topic.to_string(),
            event_type,
            timestamp_ms: now_ms(),
            payload,
        };

        for (client_id, slot) in inner.clients.iter() {
            if !slot.patterns.iter().any(|p| glob::matches(p, topic)) {
                continue;
            }
            if let Err(mpsc::error::TrySendError::Full(_)) = slot.sender.try_send(event.clone()) {
                warn!(%client_id, topic, "dropping event for slow subscriber, buffer full");
            }
        }
    }

    #[cfg(test)]
    fn created_at_of(&self, client_id: Uuid) -> Option<i64> {
        self.inner.lock().unwrap().clients.get(&client_id).map(|s| s.created_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_receives_snapshot_then_live() {
        let broker = StateBroker::new(10);
        broker.update_queue_state(|q| q.pending = 5);

        let mut sub = broker.subscribe(vec!["queue:status".to_string()]);
        let snapshot = sub.receiver.try_recv().unwrap();
        assert_eq!(snapshot.topic, "queue:status");
        assert_eq!(snapshot.event_type, EventType::Snapshot);

        broker.update_queue_state(|q| q.pending = 6);
        let live = sub.receiver.try_recv().unwrap();
        assert_eq!(live.topic, "queue:status");
        assert_eq!(live.event_type, EventType::StateUpdate);
    }

    #[test]
    fn test_pattern_filters_unrelated_topics() {
        let broker = StateBroker::new(10);
        let mut sub = broker.subscribe(vec!["worker:*:status".to_string()]);
        broker.update_queue_state(|q| q.pending = 1);
        assert!(sub.receiver.try_recv().is_err());

        broker.update_worker_state("1", serde_json::json!({"state": "idle"}));
        assert!(sub.receiver.try_recv().is_ok());
    }

    #[test]
    fn test_overflow_drops_for_one_client_only() {
        let broker = StateBroker::new(1);
        let mut slow = broker.subscribe(vec!["queue:status".to_string()]);
        let mut fast = broker.subscribe(vec!["queue:status".to_string()]);

        // Drain the initial snapshot from both.
        let _ = slow.receiver.try_recv();
        let _ = fast.receiver.try_recv();

        broker.update_queue_state(|q| q.pending = 1);
        broker.update_queue_state(|q| q.pending = 2);

        // Slow client's channel (capacity 1) overflowed and dropped the
        // second update; fast client still got something.
        assert!(slow.receiver.try_recv().is_ok());
        assert!(fast.receiver.try_recv().is_ok());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let broker = StateBroker::new(10);
        let sub = broker.subscribe(vec!["*".to_string()]);
        assert_eq!(broker.client_count(), 1);
        broker.unsubscribe(sub.client_id);
        assert_eq!(broker.client_count(), 0);
        broker.unsubscribe(sub.client_id);
        assert_eq!(broker.client_count(), 0);
    }

    #[test]
    fn test_remove_job_broadcasts_removal() {
        let broker = StateBroker::new(10);
        broker.update_job_state(1, serde_json::json!({"id": 1, "status": "done"}));
        let mut sub = broker.subscribe(vec!["queue:jobs".to_string()]);
        let _ = sub.receiver.try_recv();

        broker.remove_job(1);
        let event = sub.receiver.try_recv().unwrap();
        assert_eq!(event.payload["removed"], true);
        assert_eq!(event.event_type, EventType::JobRemoved);
    }

    #[test]
    fn test_created_at_recorded() {
        let broker = StateBroker::new(10);
        let sub = broker.subscribe(vec!["*".to_string()]);
        assert!(broker.created_at_of(sub.client_id).is_some());
    }
}
