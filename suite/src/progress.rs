// progress.rs — Bounded, lossy progress event bus.
//
// One bus per experiment. Each subscriber owns a bounded ring buffer;
// publishing drops the subscriber's oldest queued event when the ring is
// full, so the scheduler never blocks on a slow consumer and the newest
// event — including the terminal one — is always retained.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default per-subscriber ring capacity.
const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressKind {
    Started,
    RunCompleted,
    Progress,
    Finished,
    Stopped,
    Error,
}

impl ProgressKind {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProgressKind::Finished | ProgressKind::Stopped | ProgressKind::Error
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: String,
    pub kind: ProgressKind,
    pub experiment_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_solver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_instance: Option<String>,
    pub completed: u64,
    pub total: u64,
}

impl ProgressEvent {
    pub fn now(kind: ProgressKind, experiment_id: u32, completed: u64, total: u64) -> Self {
        ProgressEvent {
            timestamp: Utc::now().to_rfc3339(),
            kind,
            experiment_id,
            current_solver: None,
            current_instance: None,
            completed,
            total,
        }
    }

    pub fn with_current(mut self, solver: &str, instance: &str) -> Self {
        self.current_solver = Some(solver.to_string());
        self.current_instance = Some(instance.to_string());
        self
    }
}

// ── Bus ─────────────────────────────────────────────────────────────────

struct Ring {
    queue: Mutex<VecDeque<ProgressEvent>>,
    available: Condvar,
    capacity: usize,
}

/// Receiving half handed to observers.
pub struct Subscription {
    ring: Arc<Ring>,
}

impl Subscription {
    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ProgressEvent> {
        let mut queue = self.ring.queue.lock().ok()?;
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            let (guard, result) = self
                .ring
                .available
                .wait_timeout(queue, timeout)
                .ok()?;
            queue = guard;
            if result.timed_out() && queue.is_empty() {
                return None;
            }
        }
    }

    pub fn try_recv(&self) -> Option<ProgressEvent> {
        self.ring.queue.lock().ok()?.pop_front()
    }
}

/// Per-experiment multi-subscriber event bus.
#[derive(Default)]
pub struct ProgressBus {
    subscribers: Mutex<Vec<Weak<Ring>>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribe_with_capacity(DEFAULT_CAPACITY)
    }

    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription {
        let ring = Arc::new(Ring {
            queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            available: Condvar::new(),
            capacity: capacity.max(1),
        });
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(Arc::downgrade(&ring));
        }
        Subscription { ring }
    }

    /// Fan the event out to live subscribers; never blocks. Dead
    /// subscriptions are pruned as a side effect.
    pub fn publish(&self, event: &ProgressEvent) {
        let mut subs = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        subs.retain(|weak| {
            let ring = match weak.upgrade() {
                Some(ring) => ring,
                None => return false,
            };
            if let Ok(mut queue) = ring.queue.lock() {
                if queue.len() >= ring.capacity {
                    queue.pop_front();
                }
                queue.push_back(event.clone());
                ring.available.notify_all();
            }
            true
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|subs| subs.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: ProgressKind, completed: u64) -> ProgressEvent {
        ProgressEvent::now(kind, 1, completed, 10)
    }

    #[test]
    fn events_arrive_in_order() {
        let bus = ProgressBus::new();
        let sub = bus.subscribe();
        bus.publish(&event(ProgressKind::Started, 0));
        bus.publish(&event(ProgressKind::Progress, 1));
        bus.publish(&event(ProgressKind::Finished, 10));

        assert_eq!(sub.try_recv().unwrap().kind, ProgressKind::Started);
        assert_eq!(sub.try_recv().unwrap().kind, ProgressKind::Progress);
        assert_eq!(sub.try_recv().unwrap().kind, ProgressKind::Finished);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn slow_consumer_loses_oldest_but_keeps_terminal() {
        let bus = ProgressBus::new();
        let sub = bus.subscribe_with_capacity(4);
        for i in 0..20 {
            bus.publish(&event(ProgressKind::Progress, i));
        }
        bus.publish(&event(ProgressKind::Stopped, 20));

        let mut seen = Vec::new();
        while let Some(e) = sub.try_recv() {
            seen.push(e);
        }
        assert_eq!(seen.len(), 4);
        // Oldest events were dropped; the terminal event survived.
        assert_eq!(seen.last().unwrap().kind, ProgressKind::Stopped);
        assert!(seen[0].completed >= 16);
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = ProgressBus::new();
        bus.publish(&event(ProgressKind::Progress, 1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let bus = ProgressBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        bus.publish(&event(ProgressKind::Progress, 1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn recv_timeout_waits_for_publisher() {
        let bus = Arc::new(ProgressBus::new());
        let sub = bus.subscribe();
        let publisher = {
            let bus = Arc::clone(&bus);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                bus.publish(&event(ProgressKind::RunCompleted, 3));
            })
        };
        let received = sub.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received.kind, ProgressKind::RunCompleted);
        publisher.join().unwrap();
    }

    #[test]
    fn recv_timeout_returns_none_when_idle() {
        let bus = ProgressBus::new();
        let sub = bus.subscribe();
        assert!(sub.recv_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn terminal_kinds() {
        assert!(ProgressKind::Finished.is_terminal());
        assert!(ProgressKind::Stopped.is_terminal());
        assert!(ProgressKind::Error.is_terminal());
        assert!(!ProgressKind::Progress.is_terminal());
        assert!(!ProgressKind::Started.is_terminal());
    }
}
