use alloy::consensus::Transaction as ConsensusTransaction;
use alloy::network::TransactionResponse;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{BlockNumberOrTag, Transaction};
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::FeedConfig;

use super::types::{BlockNotification, FeedTransaction, RawTransaction};
use super::IngestionSource;

/// Address used as the receiver of contract-creation transactions.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Adapts block notifications from an external feed into raw transactions.
///
/// Blocks are consumed in delivery order and each block's transactions keep
/// the order the feed supplied.
pub struct LiveFeed {
    name: String,
    blocks: mpsc::Receiver<BlockNotification>,
}

impl LiveFeed {
    pub fn new(name: impl Into<String>, blocks: mpsc::Receiver<BlockNotification>) -> Self {
        Self {
            name: name.into(),
            blocks,
        }
    }
}

impl IngestionSource for LiveFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn into_stream(self: Box<Self>, shutdown: CancellationToken) -> BoxStream<'static, RawTransaction> {
        let LiveFeed { name, blocks } = *self;

        stream::unfold((blocks, shutdown, name), |(mut blocks, shutdown, name)| async move {
            let block = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                block = blocks.recv() => block,
            };

            match block {
                Some(block) => {
                    let txs = to_raw_transactions(block);
                    Some((txs, (blocks, shutdown, name)))
                }
                None => {
                    tracing::info!(feed = %name, "Live feed closed");
                    None
                }
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

/// Flatten a block notification into raw transactions, preserving feed order.
pub fn to_raw_transactions(block: BlockNotification) -> Vec<RawTransaction> {
    let observed_at = Utc::now();
    let block_number = block.block_number;

    block
        .transactions
        .into_iter()
        .map(|tx| RawTransaction {
            hash: tx.hash,
            from: tx.from,
            to: tx.to.unwrap_or_else(|| ZERO_ADDRESS.to_string()),
            value: tx.value,
            observed_at,
            block_number,
        })
        .collect()
}

// ============================================================
// Chain-backed producer
// ============================================================

/// Connect to the chain and start a task that follows the head, forwarding
/// full blocks as notifications. Fails if the current head cannot be read,
/// so an unreachable endpoint is reported before any task is spawned.
pub async fn connect_chain_feed(
    config: FeedConfig,
    shutdown: CancellationToken,
) -> eyre::Result<(LiveFeed, JoinHandle<()>)> {
    let provider = ProviderBuilder::new()
        .connect_http(config.rpc_http.parse().map_err(|e| eyre::eyre!("Invalid RPC URL: {}", e))?);
    let timeout = Duration::from_millis(config.fetch_timeout_ms);

    let head = retry_rpc(|| provider.get_block_number(), timeout, config.max_retries)
        .await
        .map_err(|e| eyre::eyre!("Failed to reach feed '{}' at {}: {}", config.name, config.rpc_http, e))?;
    tracing::info!(feed = %config.name, head, "Chain feed connected");

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let feed = LiveFeed::new(config.name.clone(), rx);

    let handle = tokio::spawn(async move {
        let name = config.name.clone();
        if let Err(e) = follow_chain(&config, provider, head, &tx, &shutdown).await {
            tracing::error!(feed = %name, error = %e, "Chain feed failed");
        }
        tracing::info!(feed = %name, "Chain feed stopped");
    });

    Ok((feed, handle))
}

/// WebSocket head subscription when configured, HTTP polling otherwise or on
/// failure. Blocks after `head` are forwarded.
async fn follow_chain<P: Provider>(
    config: &FeedConfig,
    http: P,
    head: u64,
    tx: &mpsc::Sender<BlockNotification>,
    shutdown: &CancellationToken,
) -> eyre::Result<()> {
    let mut last_block = head;

    if let Some(ws_url) = &config.rpc_ws {
        match follow_chain_ws(config, ws_url, &mut last_block, tx, shutdown).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(
                    feed = %config.name,
                    error = %e,
                    "WebSocket connection failed, falling back to HTTP polling"
                );
            }
        }
    }

    follow_chain_http(config, &http, last_block, tx, shutdown).await
}

async fn follow_chain_ws(
    config: &FeedConfig,
    ws_url: &str,
    last_block: &mut u64,
    tx: &mpsc::Sender<BlockNotification>,
    shutdown: &CancellationToken,
) -> eyre::Result<()> {
    let ws = WsConnect::new(ws_url);
    let provider = ProviderBuilder::new().connect_ws(ws).await?;

    let sub = provider.subscribe_blocks().await?;
    let mut stream = sub.into_stream();

    tracing::info!(feed = %config.name, "WebSocket block subscription active");

    loop {
        tokio::select! {
            maybe_header = stream.next() => {
                match maybe_header {
                    Some(header) => {
                        let head = header.number;
                        if head <= *last_block {
                            continue;
                        }
                        if !forward_blocks(&provider, config, (*last_block + 1)..=head, tx, shutdown).await {
                            break;
                        }
                        *last_block = head;
                    }
                    None => {
                        tracing::warn!(feed = %config.name, "Block stream ended");
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!(feed = %config.name, "Shutdown received, stopping block subscription");
                break;
            }
        }
    }

    Ok(())
}

async fn follow_chain_http<P: Provider>(
    config: &FeedConfig,
    provider: &P,
    mut last_block: u64,
    tx: &mpsc::Sender<BlockNotification>,
    shutdown: &CancellationToken,
) -> eyre::Result<()> {
    let timeout = Duration::from_millis(config.fetch_timeout_ms);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    tracing::info!(
        feed = %config.name,
        poll_interval_ms = config.poll_interval_ms,
        last_block,
        "HTTP polling active"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!(feed = %config.name, "Shutdown received, stopping poller");
                break;
            }
        }

        let current = match retry_rpc(|| provider.get_block_number(), timeout, config.max_retries).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(feed = %config.name, error = %e, "Failed to get block number");
                continue;
            }
        };

        if current <= last_block {
            continue;
        }

        if !forward_blocks(provider, config, (last_block + 1)..=current, tx, shutdown).await {
            break;
        }
        last_block = current;
    }

    Ok(())
}

/// Fetch each block in the range and forward it. A block that cannot be
/// fetched is logged and skipped. Returns false once the consumer is gone or
/// shutdown was requested.
async fn forward_blocks<P: Provider>(
    provider: &P,
    config: &FeedConfig,
    range: std::ops::RangeInclusive<u64>,
    tx: &mpsc::Sender<BlockNotification>,
    shutdown: &CancellationToken,
) -> bool {
    let timeout = Duration::from_millis(config.fetch_timeout_ms);

    for block_num in range {
        if shutdown.is_cancelled() {
            return false;
        }

        let block = retry_rpc(
            || async {
                provider
                    .get_block_by_number(BlockNumberOrTag::Number(block_num))
                    .full()
                    .await
            },
            timeout,
            config.max_retries,
        )
        .await;

        let block = match block {
            Ok(Some(block)) => block,
            Ok(None) => {
                tracing::warn!(feed = %config.name, block = block_num, "Block not found, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(feed = %config.name, block = block_num, error = %e, "Failed to fetch block, skipping");
                continue;
            }
        };

        let notification = BlockNotification {
            block_number: block_num,
            transactions: block.transactions.txns().map(feed_transaction).collect(),
        };

        tracing::debug!(
            feed = %config.name,
            block = block_num,
            transactions = notification.transactions.len(),
            "Forwarding block"
        );

        tokio::select! {
            sent = tx.send(notification) => {
                if sent.is_err() {
                    tracing::info!(feed = %config.name, "Feed consumer dropped");
                    return false;
                }
            }
            _ = shutdown.cancelled() => return false,
        }
    }

    true
}

fn feed_transaction(tx: &Transaction) -> FeedTransaction {
    FeedTransaction {
        hash: format!("0x{}", hex::encode(TransactionResponse::tx_hash(tx))),
        from: format!("0x{}", hex::encode(TransactionResponse::from(tx))),
        to: ConsensusTransaction::to(tx).map(|to| format!("0x{}", hex::encode(to))),
        value: ConsensusTransaction::value(tx).to_string(),
    }
}

/// Retry an async RPC call with a per-attempt timeout and exponential backoff.
pub async fn retry_rpc<F, Fut, T, E>(mut f: F, timeout: Duration, max_retries: u32) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = Duration::from_millis(250);

    for attempt in 0..max_retries {
        let error = match tokio::time::timeout(timeout, f()).await {
            Ok(Ok(val)) => return Ok(val),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", timeout.as_millis()),
        };

        tracing::warn!(
            attempt = attempt + 1,
            max_retries,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "RPC call failed, retrying..."
        );
        tokio::time::sleep(delay).await;
        delay = std::cmp::min(delay * 2, Duration::from_secs(5));
    }

    match tokio::time::timeout(timeout, f()).await {
        Ok(Ok(val)) => Ok(val),
        Ok(Err(e)) => Err(eyre::eyre!("RPC call failed after {} retries: {}", max_retries, e)),
        Err(_) => Err(eyre::eyre!(
            "RPC call timed out after {} retries ({}ms each)",
            max_retries,
            timeout.as_millis()
        )),
    }
}
