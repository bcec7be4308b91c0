use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::alerts::types::RiskAlert;
use crate::analyzer::types::ScoredTransaction;
use crate::broadcast::{BroadcastHub, HubEvent};

use super::analytics::{AnalyticsSummary, AnalyticsTracker};

#[derive(Default)]
struct Ledger {
    transactions: Vec<Arc<ScoredTransaction>>,
    by_hash: HashMap<String, usize>,
    alerts: Vec<RiskAlert>,
    alert_index: HashMap<String, usize>,
    analytics: AnalyticsTracker,
}

/// The in-memory ledger of scored transactions, alerts and analytics.
///
/// All mutations go through one write lock. A transaction and its analytics
/// update are applied inside the same critical section, so readers never see
/// one without the other. Announcements to the hub happen after the lock is
/// released, in the same order as the mutations they describe.
pub struct AggregationStore {
    inner: RwLock<Ledger>,
    // Taken before the write lock is released and held while publishing.
    publish_order: Mutex<()>,
    hub: Option<Arc<BroadcastHub>>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Ledger::default()),
            publish_order: Mutex::new(()),
            hub: None,
        }
    }

    /// A store that announces its mutations on `hub`.
    pub fn with_hub(hub: Arc<BroadcastHub>) -> Self {
        Self {
            inner: RwLock::new(Ledger::default()),
            publish_order: Mutex::new(()),
            hub: Some(hub),
        }
    }

    /// Insert a scored transaction. Returns false, leaving the store
    /// untouched, if the hash is already present.
    pub fn append(&self, tx: Arc<ScoredTransaction>) -> bool {
        let (summary, _publish) = {
            let mut ledger = self.inner.write();
            if ledger.by_hash.contains_key(tx.hash()) {
                tracing::debug!(hash = %tx.hash(), "Duplicate transaction rejected");
                return false;
            }

            let idx = ledger.transactions.len();
            ledger.by_hash.insert(tx.hash().to_string(), idx);
            ledger.transactions.push(tx.clone());
            ledger.analytics.record(tx.risk_score());
            (ledger.analytics.summary().clone(), self.publish_order.lock())
        };

        tracing::debug!(
            hash = %tx.hash(),
            risk_score = tx.risk_score(),
            total = summary.total_transactions,
            "Transaction stored"
        );

        if let Some(hub) = &self.hub {
            hub.publish(HubEvent::NewTransaction(tx));
            hub.publish(HubEvent::AnalyticsUpdated(summary));
        }

        true
    }

    /// Insert an alert. Alerts are never deduplicated.
    pub fn append_alert(&self, alert: RiskAlert) {
        let _publish = {
            let mut ledger = self.inner.write();
            let idx = ledger.alerts.len();
            ledger.alert_index.insert(alert.id.clone(), idx);
            ledger.alerts.push(alert.clone());
            self.publish_order.lock()
        };

        if let Some(hub) = &self.hub {
            hub.publish(HubEvent::NewAlert(alert));
        }
    }

    /// Mark an alert resolved and return it. Resolving an already resolved
    /// alert returns it unchanged; an unknown id returns `None`.
    pub fn resolve_alert(&self, id: &str) -> Option<RiskAlert> {
        let mut ledger = self.inner.write();
        let idx = *ledger.alert_index.get(id)?;
        let alert = &mut ledger.alerts[idx];

        if !alert.resolved {
            alert.resolved = true;
            tracing::info!(alert_id = %id, wallet = %alert.wallet_address, "Alert resolved");
        }

        Some(alert.clone())
    }

    pub fn get_transaction(&self, hash: &str) -> Option<Arc<ScoredTransaction>> {
        let ledger = self.inner.read();
        ledger
            .by_hash
            .get(hash)
            .map(|&idx| ledger.transactions[idx].clone())
    }

    /// All transactions in insertion order.
    pub fn transactions(&self) -> Vec<Arc<ScoredTransaction>> {
        self.inner.read().transactions.clone()
    }

    /// All alerts in insertion order.
    pub fn alerts(&self) -> Vec<RiskAlert> {
        self.inner.read().alerts.clone()
    }

    pub fn analytics(&self) -> AnalyticsSummary {
        self.inner.read().analytics.summary().clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }

    pub fn alert_count(&self) -> usize {
        self.inner.read().alerts.len()
    }
}

impl Default for AggregationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::types::AlertType;
    use crate::analyzer::types::AnalysisResult;
    use crate::broadcast::Topic;
    use crate::ingestion::types::RawTransaction;
    use chrono::Utc;

    fn scored(hash: &str, risk_score: u8) -> Arc<ScoredTransaction> {
        Arc::new(ScoredTransaction::new(
            RawTransaction {
                hash: hash.to_string(),
                from: "0xa".to_string(),
                to: "0xb".to_string(),
                value: "1".to_string(),
                observed_at: Utc::now(),
                block_number: 1,
            },
            AnalysisResult {
                risk_score,
                patterns: vec![],
                insights: vec![],
                ai_confidence: 0.35,
            },
        ))
    }

    fn alert(id: &str) -> RiskAlert {
        RiskAlert {
            id: id.to_string(),
            wallet_address: "0xa".to_string(),
            alert_type: AlertType::HighRiskTransaction,
            severity: 90,
            description: "test".to_string(),
            created_at: Utc::now(),
            resolved: false,
        }
    }

    #[test]
    fn test_analytics_invariants_after_every_append() {
        let store = AggregationStore::new();
        let scores = [10u8, 95, 45, 70, 61, 0, 100, 39];
        let mut sum = 0.0;

        for (i, score) in scores.iter().enumerate() {
            assert!(store.append(scored(&format!("0x{i}"), *score)));
            sum += f64::from(*score);

            let a = store.analytics();
            assert_eq!(a.total_transactions as usize, i + 1);
            assert_eq!(a.critical_risk + a.high_risk + a.medium_risk + a.low_risk, a.total_transactions);
            assert!((a.average_risk_score - sum / (i + 1) as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_duplicate_is_noop() {
        let store = AggregationStore::new();
        assert!(store.append(scored("0x01", 80)));
        let before = store.analytics();

        assert!(!store.append(scored("0x01", 10)));
        assert_eq!(store.transaction_count(), 1);
        assert_eq!(store.analytics(), before);
        assert_eq!(store.get_transaction("0x01").unwrap().risk_score(), 80);
    }

    #[test]
    fn test_resolve_alert() {
        let store = AggregationStore::new();
        store.append_alert(alert("alert-1"));
        store.append_alert(alert("alert-2"));

        let resolved = store.resolve_alert("alert-1").unwrap();
        assert!(resolved.resolved);

        // Idempotent.
        let again = store.resolve_alert("alert-1").unwrap();
        assert_eq!(again, resolved);

        // Unknown id has no side effects.
        let snapshot = store.alerts();
        assert!(store.resolve_alert("alert-404").is_none());
        assert_eq!(store.alerts(), snapshot);
        assert!(!snapshot[1].resolved);
    }

    #[test]
    fn test_alerts_are_not_deduplicated() {
        let store = AggregationStore::new();
        store.append_alert(alert("alert-1"));
        store.append_alert(alert("alert-2"));
        assert_eq!(store.alert_count(), 2);
    }

    #[tokio::test]
    async fn test_announces_mutations() {
        let hub = Arc::new(BroadcastHub::new(8));
        let store = AggregationStore::with_hub(hub.clone());
        let mut txs = hub.subscribe(Topic::NewTransaction);
        let mut analytics = hub.subscribe(Topic::AnalyticsUpdated);
        let mut alerts = hub.subscribe(Topic::NewAlert);

        store.append(scored("0x01", 50));
        store.append(scored("0x01", 50));
        store.append_alert(alert("alert-1"));

        match txs.recv().await.unwrap() {
            HubEvent::NewTransaction(tx) => assert_eq!(tx.hash(), "0x01"),
            other => panic!("unexpected {:?}", other.topic()),
        }
        match analytics.recv().await.unwrap() {
            HubEvent::AnalyticsUpdated(summary) => assert_eq!(summary.total_transactions, 1),
            other => panic!("unexpected {:?}", other.topic()),
        }
        match alerts.recv().await.unwrap() {
            HubEvent::NewAlert(a) => assert_eq!(a.id, "alert-1"),
            other => panic!("unexpected {:?}", other.topic()),
        }

        // The duplicate produced no second announcement.
        assert!(txs.try_recv().is_none());
        assert!(analytics.try_recv().is_none());
    }

    #[test]
    fn test_concurrent_analytics_announcements_stay_ordered() {
        let hub = Arc::new(BroadcastHub::new(1024));
        let store = Arc::new(AggregationStore::with_hub(hub.clone()));
        let mut updates = hub.subscribe(Topic::AnalyticsUpdated);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        store.append(scored(&format!("0x{t}-{i}"), 50));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut totals = Vec::new();
        while let Some(event) = updates.try_recv() {
            match event {
                HubEvent::AnalyticsUpdated(summary) => totals.push(summary.total_transactions),
                other => panic!("unexpected {:?}", other.topic()),
            }
        }
        assert_eq!(totals, (1..=800).collect::<Vec<u64>>());
    }

    #[test]
    fn test_concurrent_appends_keep_invariants() {
        let store = Arc::new(AggregationStore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        store.append(scored(&format!("0x{t}-{i}"), (i % 101) as u8));
                        let a = store.analytics();
                        assert_eq!(
                            a.critical_risk + a.high_risk + a.medium_risk + a.low_risk,
                            a.total_transactions
                        );
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.transaction_count(), 1000);
        assert_eq!(store.analytics().total_transactions, 1000);
    }
}
