use parking_lot::RwLock;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::alerts::types::RiskAlert;
use crate::analyzer::types::ScoredTransaction;
use crate::store::analytics::AnalyticsSummary;

/// Subscribable event topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    NewTransaction,
    NewAlert,
    AnalyticsUpdated,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::NewTransaction, Topic::NewAlert, Topic::AnalyticsUpdated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewTransaction => "new-transaction",
            Self::NewAlert => "new-alert",
            Self::AnalyticsUpdated => "analytics-updated",
        }
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown topic '{}'", s))
    }
}

/// An event carrying the entity for its topic.
#[derive(Debug, Clone)]
pub enum HubEvent {
    NewTransaction(Arc<ScoredTransaction>),
    NewAlert(RiskAlert),
    AnalyticsUpdated(AnalyticsSummary),
}

impl HubEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::NewTransaction(_) => Topic::NewTransaction,
            Self::NewAlert(_) => Topic::NewAlert,
            Self::AnalyticsUpdated(_) => Topic::AnalyticsUpdated,
        }
    }

    /// JSON encoding of the carried entity.
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            Self::NewTransaction(tx) => serde_json::to_string(tx.as_ref()),
            Self::NewAlert(alert) => serde_json::to_string(alert),
            Self::AnalyticsUpdated(summary) => serde_json::to_string(summary),
        }
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<HubEvent>,
}

/// A registered subscription. Dropping it closes the channel; the hub prunes
/// the handle on its next publish to the topic.
pub struct Subscription {
    id: u64,
    topic: Topic,
    rx: mpsc::Receiver<HubEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Next event, or `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.rx.try_recv().ok()
    }
}

/// Per-topic registry of subscribers with bounded buffers.
///
/// Publishing never waits: a subscriber whose buffer is full misses the
/// event, and closed subscribers are removed lazily.
pub struct BroadcastHub {
    subscribers: RwLock<HashMap<Topic, Vec<Subscriber>>>,
    buffer_size: usize,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastHub {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer_size: buffer_size.max(1),
            next_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer_size);

        self.subscribers
            .write()
            .entry(topic)
            .or_default()
            .push(Subscriber { id, tx });

        tracing::debug!(topic = topic.as_str(), subscriber = id, "Subscriber registered");
        Subscription { id, topic, rx }
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        for list in subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|s| s.id == id) {
                list.remove(pos);
                tracing::debug!(subscriber = id, "Subscriber unregistered");
                return true;
            }
        }
        false
    }

    /// Deliver to every current subscriber of the event's topic.
    /// Returns the number of subscribers that accepted the event.
    pub fn publish(&self, event: HubEvent) -> usize {
        let topic = event.topic();
        let mut delivered = 0;
        let mut closed = false;

        {
            let subscribers = self.subscribers.read();
            let Some(list) = subscribers.get(&topic) else {
                return 0;
            };

            for subscriber in list {
                match subscriber.tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            topic = topic.as_str(),
                            subscriber = subscriber.id,
                            "Subscriber buffer full, event dropped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed = true,
                }
            }
        }

        if closed {
            self.prune(topic);
        }

        delivered
    }

    fn prune(&self, topic: Topic) {
        let mut subscribers = self.subscribers.write();
        if let Some(list) = subscribers.get_mut(&topic) {
            let before = list.len();
            list.retain(|s| !s.tx.is_closed());
            let pruned = before - list.len();
            if pruned > 0 {
                tracing::debug!(topic = topic.as_str(), pruned, "Pruned disconnected subscribers");
            }
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers.read().get(&topic).map_or(0, |list| list.len())
    }

    /// Events dropped because a subscriber buffer was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total: u64) -> HubEvent {
        HubEvent::AnalyticsUpdated(AnalyticsSummary {
            total_transactions: total,
            ..AnalyticsSummary::new()
        })
    }

    fn total(event: HubEvent) -> u64 {
        match event {
            HubEvent::AnalyticsUpdated(s) => s.total_transactions,
            other => panic!("unexpected event {:?}", other.topic()),
        }
    }

    #[test]
    fn test_topic_names() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
        assert!("new-block".parse::<Topic>().is_err());
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let hub = BroadcastHub::new(8);
        let mut a = hub.subscribe(Topic::AnalyticsUpdated);
        let mut b = hub.subscribe(Topic::AnalyticsUpdated);
        let mut other = hub.subscribe(Topic::NewAlert);

        assert_eq!(hub.publish(summary(1)), 2);

        assert_eq!(total(a.recv().await.unwrap()), 1);
        assert_eq!(total(b.recv().await.unwrap()), 1);
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let hub = BroadcastHub::new(8);
        assert_eq!(hub.publish(summary(1)), 0);

        let mut late = hub.subscribe(Topic::AnalyticsUpdated);
        assert!(late.try_recv().is_none());

        hub.publish(summary(2));
        assert_eq!(total(late.recv().await.unwrap()), 2);
    }

    #[test]
    fn test_full_buffer_drops_without_blocking() {
        let hub = BroadcastHub::new(2);
        let mut slow = hub.subscribe(Topic::AnalyticsUpdated);
        let mut fast = hub.subscribe(Topic::AnalyticsUpdated);

        for i in 1..=2 {
            hub.publish(summary(i));
        }
        // Fast subscriber keeps up, slow one never reads.
        assert_eq!(total(fast.try_recv().unwrap()), 1);
        assert_eq!(total(fast.try_recv().unwrap()), 2);

        assert_eq!(hub.publish(summary(3)), 1);
        assert_eq!(hub.dropped_events(), 1);
        assert_eq!(total(fast.try_recv().unwrap()), 3);

        // Slow subscriber kept the oldest events, the newest was dropped.
        assert_eq!(total(slow.try_recv().unwrap()), 1);
        assert_eq!(total(slow.try_recv().unwrap()), 2);
        assert!(slow.try_recv().is_none());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let hub = BroadcastHub::new(4);
        let keep = hub.subscribe(Topic::NewTransaction);
        let gone = hub.subscribe(Topic::NewTransaction);
        assert_eq!(hub.subscriber_count(Topic::NewTransaction), 2);

        drop(gone);
        let event = HubEvent::AnalyticsUpdated(AnalyticsSummary::new());
        // Other topics are untouched.
        hub.publish(event);
        assert_eq!(hub.subscriber_count(Topic::NewTransaction), 2);

        let tx = Arc::new(crate::analyzer::types::ScoredTransaction::new(
            crate::ingestion::types::RawTransaction {
                hash: "0x01".to_string(),
                from: "0xa".to_string(),
                to: "0xb".to_string(),
                value: "0".to_string(),
                observed_at: chrono::Utc::now(),
                block_number: 1,
            },
            crate::analyzer::engine::degraded_result(),
        ));
        assert_eq!(hub.publish(HubEvent::NewTransaction(tx)), 1);
        assert_eq!(hub.subscriber_count(Topic::NewTransaction), 1);
        drop(keep);
    }

    #[test]
    fn test_payload_json() {
        let json = summary(3).payload_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_transactions"], 3);
    }

    #[test]
    fn test_unsubscribe() {
        let hub = BroadcastHub::new(4);
        let sub = hub.subscribe(Topic::NewAlert);
        assert!(hub.unsubscribe(sub.id()));
        assert!(!hub.unsubscribe(sub.id()));
        assert_eq!(hub.subscriber_count(Topic::NewAlert), 0);
    }
}
