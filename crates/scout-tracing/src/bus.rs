// SPDX-License-Identifier: MIT OR Apache-2.0
//! Broadcast-based event bus for [`TracingEvent`]s — a `broadcast` sender
//! plus published/dropped counters, specialized to the three discriminators
//! spec §4.G names instead of a generic event type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Events the tracing engine emits, per spec §4.G / §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingEvent {
    /// A request was successfully flushed (its `FinishRequest` was sent).
    RequestSent {
        /// The request's id.
        request_id: String,
    },
    /// [`crate::TracingEngine::ignores_path`] matched a configured prefix.
    IgnoredPathDetected {
        /// The path that matched.
        path: String,
    },
    /// A request or span marked ignored skipped all wire emission.
    IgnoredRequestProcessingSkipped {
        /// The request's id.
        request_id: String,
    },
}

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct StatsInner {
    total_published: AtomicU64,
    dropped_events: AtomicU64,
}

/// Broadcast-based event bus distributing [`TracingEvent`]s to subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TracingEvent>,
    stats: Arc<StatsInner>,
}

impl EventBus {
    /// Create a new event bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            stats: Arc::new(StatsInner::default()),
        }
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TracingEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Silently dropped (and counted) if nobody is listening — matching
    /// spec's framing of event subscription as observational, never load-bearing.
    pub fn publish(&self, event: TracingEvent) {
        self.stats.total_published.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(event).is_err() {
            self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(TracingEvent::RequestSent {
            request_id: "req-1".into(),
        });
        let event = sub.recv().await.unwrap();
        assert_eq!(
            event,
            TracingEvent::RequestSent {
                request_id: "req-1".into()
            }
        );
    }

    #[test]
    fn publishing_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(TracingEvent::IgnoredPathDetected { path: "/health".into() });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
