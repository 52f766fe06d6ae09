//! Long-lived consumer of the order-book delta WebSocket.
//!
//! The feed follows the store's selected market: a market switch tears the
//! connection down and resubscribes. Frames are either full snapshots or
//! sequenced deltas; a delta that does not chain onto the local book forces
//! a REST resnapshot through the exchange client rather than being patched
//! in blind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, warn};

use crate::execution::traits::ExchangeClient;
use crate::market_data::book::{BookDelta, OrderBookSnapshot};
use crate::market_data::types::BookLevel;
use crate::metrics;
use crate::state::store::{DataClass, Store, StorePayload, StoreUpdate};
use crate::util::now_ms;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Minimum spacing between REST resnapshot attempts, so a failing endpoint
/// is not hammered once per delta frame.
const RESYNC_COOLDOWN: Duration = Duration::from_secs(2);
const MARKET_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Wire frame from the book feed; levels come as [price, size] pairs.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookFrame {
    Snapshot {
        market: String,
        seq: u64,
        bids: Vec<[f64; 2]>,
        asks: Vec<[f64; 2]>,
    },
    Delta {
        market: String,
        from_seq: u64,
        to_seq: u64,
        bids: Vec<[f64; 2]>,
        asks: Vec<[f64; 2]>,
    },
}

fn to_levels(raw: &[[f64; 2]]) -> Vec<BookLevel> {
    raw.iter()
        .map(|[price, size]| BookLevel {
            price: *price,
            size: *size,
        })
        .collect()
}

impl BookFrame {
    pub fn into_snapshot(self) -> Option<OrderBookSnapshot> {
        match self {
            BookFrame::Snapshot {
                market,
                seq,
                bids,
                asks,
            } => Some(OrderBookSnapshot {
                market,
                bids: to_levels(&bids),
                asks: to_levels(&asks),
                seq,
                ts_recv_ms: now_ms(),
            }),
            BookFrame::Delta { .. } => None,
        }
    }

    pub fn into_delta(self) -> Option<BookDelta> {
        match self {
            BookFrame::Delta {
                market,
                from_seq,
                to_seq,
                bids,
                asks,
            } => Some(BookDelta {
                market,
                from_seq,
                to_seq,
                bids: to_levels(&bids),
                asks: to_levels(&asks),
                ts_recv_ms: now_ms(),
            }),
            BookFrame::Snapshot { .. } => None,
        }
    }

    fn market(&self) -> &str {
        match self {
            BookFrame::Snapshot { market, .. } | BookFrame::Delta { market, .. } => market,
        }
    }
}

/// Per-connection book state for the subscribed market.
struct FeedSession {
    market: String,
    book: Option<OrderBookSnapshot>,
    last_resync: Option<Instant>,
}

impl FeedSession {
    fn new(market: String) -> Self {
        Self {
            market,
            book: None,
            last_resync: None,
        }
    }

    async fn handle_frame(
        &mut self,
        frame: BookFrame,
        client: &dyn ExchangeClient,
        tx: &mpsc::Sender<StoreUpdate>,
    ) -> Result<(), mpsc::error::SendError<StoreUpdate>> {
        if frame.market() != self.market {
            debug!(
                market = %frame.market(),
                subscribed = %self.market,
                "ignoring frame for another market"
            );
            return Ok(());
        }
        metrics::record_book_frame(&self.market);

        match frame {
            BookFrame::Snapshot { .. } => {
                let Some(snapshot) = frame.into_snapshot() else {
                    return Ok(());
                };
                push_book(tx, &snapshot).await?;
                self.book = Some(snapshot);
            }
            BookFrame::Delta { .. } => {
                let Some(delta) = frame.into_delta() else {
                    return Ok(());
                };
                let gapped = match self.book.as_mut() {
                    Some(book) => book
                        .apply_delta(&delta)
                        .map_err(|gap| warn!(market = %self.market, %gap, "book sequence gap"))
                        .is_err(),
                    None => {
                        debug!(market = %self.market, "delta before snapshot");
                        true
                    }
                };

                if gapped {
                    self.resync("gap", client, tx).await?;
                } else if let Some(book) = &self.book {
                    push_book(tx, book).await?;
                }
            }
        }
        Ok(())
    }

    /// Refetch a REST snapshot, rate-limited by `RESYNC_COOLDOWN`. Skipped
    /// attempts drop the frame; the stream keeps delivering and a later
    /// frame retries once the cooldown passes.
    async fn resync(
        &mut self,
        reason: &str,
        client: &dyn ExchangeClient,
        tx: &mpsc::Sender<StoreUpdate>,
    ) -> Result<(), mpsc::error::SendError<StoreUpdate>> {
        if let Some(last) = self.last_resync {
            if last.elapsed() < RESYNC_COOLDOWN {
                return Ok(());
            }
        }
        self.last_resync = Some(Instant::now());
        metrics::record_book_resync(&self.market, reason);

        match client.fetch_book_snapshot(&self.market).await {
            Ok(snapshot) => {
                push_book(tx, &snapshot).await?;
                self.book = Some(snapshot);
            }
            Err(err) => {
                warn!(market = %self.market, error = %err, "book resnapshot failed");
                self.book = None;
            }
        }
        Ok(())
    }
}

/// Run the book feed until the store channel closes, following the store's
/// selected market.
pub async fn run_book_feed(
    url: String,
    store: Store,
    client: Arc<dyn ExchangeClient>,
    tx: mpsc::Sender<StoreUpdate>,
) -> anyhow::Result<()> {
    loop {
        let market = store.selected_market();
        let (ws, _) = match connect_async(&url).await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%url, error = %err, "book feed connect failed, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        debug!(%url, market = %market, "book feed connected");
        let (mut sink, mut stream) = ws.split();

        let subscribe = serde_json::json!({ "op": "subscribe", "market": market });
        if let Err(err) = sink.send(Message::Text(subscribe.to_string())).await {
            warn!(error = %err, "book feed subscribe failed, reconnecting");
            tokio::time::sleep(RECONNECT_DELAY).await;
            continue;
        }

        // Fresh connection, fresh sequence domain.
        let mut session = FeedSession::new(market.clone());
        let mut market_check = tokio::time::interval(MARKET_CHECK_INTERVAL);
        let mut switched = false;

        loop {
            tokio::select! {
                _ = market_check.tick() => {
                    if store.selected_market() != market {
                        debug!(from = %market, "selected market changed, resubscribing");
                        switched = true;
                        break;
                    }
                }
                msg = stream.next() => {
                    let Some(msg) = msg else { break };
                    let text = match msg {
                        Ok(Message::Text(text)) => text,
                        Ok(Message::Ping(payload)) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                            continue;
                        }
                        Ok(Message::Close(_)) | Err(_) => break,
                        Ok(_) => continue,
                    };

                    let frame: BookFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(err) => {
                            // Garbled frame: the stream can no longer be trusted.
                            warn!(market = %market, error = %err, "unparseable book frame, resyncing");
                            if session.resync("parse", client.as_ref(), &tx).await.is_err() {
                                return Ok(());
                            }
                            continue;
                        }
                    };
                    if session.handle_frame(frame, client.as_ref(), &tx).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }

        if !switched {
            warn!(market = %market, "book feed disconnected, reconnecting");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
}

async fn push_book(
    tx: &mpsc::Sender<StoreUpdate>,
    book: &OrderBookSnapshot,
) -> Result<(), mpsc::error::SendError<StoreUpdate>> {
    tx.send(StoreUpdate {
        class: DataClass::Book,
        market: Some(book.market.clone()),
        // The exchange sequence is the staleness order for books.
        seq: book.seq,
        payload: StorePayload::Book(book.clone()),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use tokio::sync::broadcast;

    use crate::config::{Cluster, markets_for};
    use crate::execution::paper::PaperClient;
    use crate::execution::traits::{AccountEvent, OrderIntent, OrderReceipt};
    use crate::market_data::types::TriggerCondition;
    use crate::state::snapshots::{
        AccountSnapshot, CacheSnapshot, FillEvent, GroupSnapshot, OpenOrder,
    };

    #[test]
    fn snapshot_frame_parses() {
        let text = r#"{"type":"snapshot","market":"BTC-PERP","seq":42,
                       "bids":[[100.0,2.0],[99.0,1.0]],"asks":[[101.0,3.0]]}"#;
        let frame: BookFrame = serde_json::from_str(text).unwrap();
        let snapshot = frame.into_snapshot().unwrap();

        assert_eq!(snapshot.market, "BTC-PERP");
        assert_eq!(snapshot.seq, 42);
        assert_eq!(snapshot.bids.len(), 2);
        assert_eq!(snapshot.asks[0].price, 101.0);
    }

    #[test]
    fn delta_frame_parses() {
        let text = r#"{"type":"delta","market":"BTC-PERP","from_seq":42,"to_seq":43,
                       "bids":[[100.0,0.0]],"asks":[]}"#;
        let frame: BookFrame = serde_json::from_str(text).unwrap();
        let delta = frame.into_delta().unwrap();

        assert_eq!(delta.from_seq, 42);
        assert_eq!(delta.to_seq, 43);
        assert_eq!(delta.bids[0].size, 0.0);
    }

    #[test]
    fn garbage_frame_is_an_error() {
        assert!(serde_json::from_str::<BookFrame>("{\"type\":\"trade\"}").is_err());
        assert!(serde_json::from_str::<BookFrame>("not json").is_err());
    }

    #[test]
    fn frame_kind_accessors_are_exclusive() {
        let text = r#"{"type":"snapshot","market":"m","seq":1,"bids":[],"asks":[]}"#;
        let frame: BookFrame = serde_json::from_str(text).unwrap();
        assert!(frame.into_delta().is_none());
    }

    fn gapped_delta() -> BookFrame {
        serde_json::from_str(
            r#"{"type":"delta","market":"BTC-PERP","from_seq":42,"to_seq":43,"bids":[],"asks":[]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn frame_for_other_market_is_ignored() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = FeedSession::new("BTC-PERP".to_string());

        let frame: BookFrame = serde_json::from_str(
            r#"{"type":"snapshot","market":"ETH-PERP","seq":7,"bids":[[100.0,1.0]],"asks":[[101.0,1.0]]}"#,
        )
        .unwrap();
        session.handle_frame(frame, &client, &tx).await.unwrap();

        assert!(session.book.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn gapped_delta_forces_resnapshot() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = FeedSession::new("BTC-PERP".to_string());
        session.book = Some(OrderBookSnapshot::new("BTC-PERP", 10, 0));

        session
            .handle_frame(gapped_delta(), &client, &tx)
            .await
            .unwrap();

        // Local book replaced with a fresh client snapshot
        let book = session.book.as_ref().unwrap();
        assert_ne!(book.seq, 10);
        assert!(!book.bids.is_empty());
        let update = rx.recv().await.unwrap();
        assert_eq!(update.class, DataClass::Book);
    }

    /// Every fetch fails; counts snapshot attempts.
    #[derive(Default)]
    struct UnavailableClient {
        snapshot_calls: AtomicU64,
    }

    #[async_trait]
    impl ExchangeClient for UnavailableClient {
        async fn fetch_group(&self) -> anyhow::Result<GroupSnapshot> {
            anyhow::bail!("unavailable")
        }
        async fn fetch_cache(&self) -> anyhow::Result<CacheSnapshot> {
            anyhow::bail!("unavailable")
        }
        async fn fetch_account(&self) -> anyhow::Result<Option<AccountSnapshot>> {
            anyhow::bail!("unavailable")
        }
        async fn fetch_open_orders(&self) -> anyhow::Result<Vec<OpenOrder>> {
            anyhow::bail!("unavailable")
        }
        async fn fetch_fills(&self, _market: &str) -> anyhow::Result<Vec<FillEvent>> {
            anyhow::bail!("unavailable")
        }
        async fn fetch_book_snapshot(&self, _market: &str) -> anyhow::Result<OrderBookSnapshot> {
            self.snapshot_calls.fetch_add(1, Ordering::Relaxed);
            anyhow::bail!("unavailable")
        }
        async fn place_spot_order(&self, _intent: OrderIntent) -> anyhow::Result<OrderReceipt> {
            anyhow::bail!("unavailable")
        }
        async fn place_perp_order(&self, _intent: OrderIntent) -> anyhow::Result<OrderReceipt> {
            anyhow::bail!("unavailable")
        }
        async fn place_trigger_order(
            &self,
            _intent: OrderIntent,
            _condition: TriggerCondition,
            _trigger_price: f64,
        ) -> anyhow::Result<OrderReceipt> {
            anyhow::bail!("unavailable")
        }
        async fn cancel_order(&self, _market: &str, _order_id: &str) -> anyhow::Result<()> {
            anyhow::bail!("unavailable")
        }
        async fn settle_funds(&self, _market: &str) -> anyhow::Result<()> {
            anyhow::bail!("unavailable")
        }
        fn subscribe_account_changes(&self) -> broadcast::Receiver<AccountEvent> {
            broadcast::channel(1).1
        }
    }

    #[tokio::test]
    async fn failed_resnapshot_is_not_retried_per_frame() {
        let client = UnavailableClient::default();
        let (tx, _rx) = mpsc::channel(8);
        let mut session = FeedSession::new("BTC-PERP".to_string());

        session
            .handle_frame(gapped_delta(), &client, &tx)
            .await
            .unwrap();
        session
            .handle_frame(gapped_delta(), &client, &tx)
            .await
            .unwrap();

        // Second gap lands inside the cooldown: no second REST hit
        assert_eq!(client.snapshot_calls.load(Ordering::Relaxed), 1);
        assert!(session.book.is_none());
    }
}
