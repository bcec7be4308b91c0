use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use chainwatch_insights::api::queries;
use chainwatch_insights::broadcast::{BroadcastHub, HubEvent, Topic};
use chainwatch_insights::config::Config;
use chainwatch_insights::ingestion::feed::{LiveFeed, ZERO_ADDRESS};
use chainwatch_insights::ingestion::types::{BlockNotification, FeedTransaction};
use chainwatch_insights::pipeline::{run_ingestion, IngestionStats, RiskPipeline};
use chainwatch_insights::store::{AggregationStore, RiskBand};

const ETH: u128 = 1_000_000_000_000_000_000;

fn feed_tx(hash: &str, from: &str, to: Option<&str>, value: u128) -> FeedTransaction {
    FeedTransaction {
        hash: hash.to_string(),
        from: from.to_string(),
        to: to.map(str::to_string),
        value: value.to_string(),
    }
}

#[tokio::test]
async fn test_feed_to_store_to_subscribers() {
    let mut config = Config::default();
    config.analyzer.whale.threshold = 1.0;
    config.analyzer.bot_activity.max_transactions = 2;

    let hub = Arc::new(BroadcastHub::new(config.broadcast.buffer_size));
    let store = Arc::new(AggregationStore::with_hub(hub.clone()));
    let pipeline = Arc::new(RiskPipeline::from_config(&config, store.clone()));

    let mut tx_events = hub.subscribe(Topic::NewTransaction);
    let mut alert_events = hub.subscribe(Topic::NewAlert);

    let (blocks, rx) = mpsc::channel(8);
    blocks
        .send(BlockNotification {
            block_number: 100,
            transactions: vec![feed_tx("0xaa", "0xwhale", Some("0xdesk"), 2000 * ETH)],
        })
        .await
        .unwrap();
    blocks
        .send(BlockNotification {
            block_number: 101,
            transactions: vec![
                feed_tx("0xbb", "0xwhale", None, 2500 * ETH),
                feed_tx("0xcc", "0xsmall", Some("0xdesk"), 123),
                feed_tx("0xaa", "0xwhale", Some("0xdesk"), 2000 * ETH),
            ],
        })
        .await
        .unwrap();
    drop(blocks);

    let stats = run_ingestion(
        Box::new(LiveFeed::new("test", rx)),
        pipeline.clone(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(
        stats,
        IngestionStats {
            processed: 4,
            stored: 3,
            duplicates: 1,
            alerts_raised: 1,
        }
    );

    // Volume 30 + whale 20 + round 10.
    let first = queries::get_transaction(&store, "0xaa").unwrap();
    assert_eq!(first.risk_score(), 60);
    assert_eq!(first.raw.block_number, 100);

    // Second transfer from the same sender also trips the bot detector.
    let second = queries::get_transaction(&store, "0xbb").unwrap();
    assert_eq!(second.risk_score(), 75);
    assert_eq!(second.raw.to, ZERO_ADDRESS);

    assert_eq!(queries::get_transaction(&store, "0xcc").unwrap().risk_score(), 0);

    let alerts = store.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].wallet_address, "0xwhale");
    assert_eq!(alerts[0].severity, 75);

    let summary = queries::get_analytics(&store);
    assert_eq!(summary.total_transactions, 3);
    assert_eq!(summary.critical_risk, 0);
    assert_eq!(summary.high_risk, 2);
    assert_eq!(summary.low_risk, 1);
    assert!((summary.average_risk_score - 45.0).abs() < 1e-9);

    let high = queries::get_transactions(&store, Some(RiskBand::High), 50, 0);
    assert_eq!(high.total, 1);
    assert_eq!(high.transactions[0].hash(), "0xbb");

    let wallet = queries::get_wallet_analysis(&store, "0xWHALE");
    assert_eq!(wallet.total_transactions, 2);
    assert_eq!(wallet.total_volume, (4500 * ETH).to_string());
    assert_eq!(wallet.risk_score, 68);
    assert!(!wallet.is_high_risk);

    // Subscribers saw each stored transaction once, in processing order.
    let mut seen = Vec::new();
    while let Some(event) = tx_events.try_recv() {
        match event {
            HubEvent::NewTransaction(tx) => seen.push(tx.hash().to_string()),
            other => panic!("unexpected event on {}", other.topic().as_str()),
        }
    }
    assert_eq!(seen, vec!["0xaa", "0xbb", "0xcc"]);

    match alert_events.recv().await.unwrap() {
        HubEvent::NewAlert(alert) => assert_eq!(alert.id, alerts[0].id),
        other => panic!("unexpected event on {}", other.topic().as_str()),
    }

    let resolved = store.resolve_alert(&alerts[0].id).unwrap();
    assert!(resolved.resolved);
}

#[tokio::test]
async fn test_shutdown_stops_ingestion() {
    let store = Arc::new(AggregationStore::new());
    let pipeline = Arc::new(RiskPipeline::from_config(&Config::default(), store.clone()));
    let (_blocks, rx) = mpsc::channel::<BlockNotification>(1);
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn(run_ingestion(
        Box::new(LiveFeed::new("idle", rx)),
        pipeline,
        shutdown.clone(),
    ));
    shutdown.cancel();

    let stats = handle.await.unwrap();
    assert_eq!(stats, IngestionStats::default());
    assert_eq!(store.transaction_count(), 0);
}
