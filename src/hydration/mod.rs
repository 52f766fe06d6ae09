//! Per-data-class pollers. Each owns its cadence and its sequence source;
//! sequences are taken when the fetch starts so that a slow response
//! completing out of order is discarded by the store, not patched in.
//!
//! A failed fetch is logged and absorbed — the next tick is the retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::{Cluster, find_market};
use crate::execution::traits::{AccountEvent, ExchangeClient};
use crate::market_data::feeds::{funding, ohlcv};
use crate::metrics;
use crate::sizing::{MarginEngine, estimate_max_size};
use crate::state::store::{DataClass, SeqGen, Store, StorePayload, StoreUpdate};
use crate::util::now_ms;

/// Candle window fetched per tick.
const CANDLE_LOOKBACK: Duration = Duration::from_secs(3600);
const CANDLE_RESOLUTION_SECS: u64 = 60;

async fn send_update(
    tx: &mpsc::Sender<StoreUpdate>,
    class: DataClass,
    market: Option<String>,
    seq: u64,
    payload: StorePayload,
) -> bool {
    tx.send(StoreUpdate {
        class,
        market,
        seq,
        payload,
    })
    .await
    .is_ok()
}

fn observe(class: DataClass, started: Instant, ok: bool) {
    metrics::record_poll(class.as_str(), if ok { "ok" } else { "error" });
    metrics::record_poll_latency(class.as_str(), started.elapsed().as_secs_f64() * 1000.0);
}

pub async fn run_cache_poller(
    client: Arc<dyn ExchangeClient>,
    tx: mpsc::Sender<StoreUpdate>,
    every: Duration,
) -> anyhow::Result<()> {
    let seq = SeqGen::new();
    let mut ticker = tokio::time::interval(every);
    info!(every_secs = every.as_secs(), "price cache poller started");

    loop {
        ticker.tick().await;
        let n = seq.next();
        let started = Instant::now();
        match client.fetch_cache().await {
            Ok(cache) => {
                observe(DataClass::GroupCache, started, true);
                if !send_update(&tx, DataClass::GroupCache, None, n, StorePayload::Cache(cache))
                    .await
                {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::GroupCache, started, false);
                warn!(error = %err, "price cache fetch failed");
            }
        }
    }
}

pub async fn run_group_poller(
    client: Arc<dyn ExchangeClient>,
    tx: mpsc::Sender<StoreUpdate>,
    every: Duration,
) -> anyhow::Result<()> {
    let seq = SeqGen::new();
    let mut ticker = tokio::time::interval(every);
    info!(every_secs = every.as_secs(), "group poller started");

    loop {
        ticker.tick().await;
        let n = seq.next();
        let started = Instant::now();
        match client.fetch_group().await {
            Ok(group) => {
                observe(DataClass::Group, started, true);
                if !send_update(&tx, DataClass::Group, None, n, StorePayload::Group(group)).await {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::Group, started, false);
                warn!(error = %err, "group fetch failed");
            }
        }
    }
}

/// The sequence source is shared with the account-change listener so both
/// producers feed one staleness domain.
pub async fn run_account_poller(
    client: Arc<dyn ExchangeClient>,
    tx: mpsc::Sender<StoreUpdate>,
    seq: Arc<SeqGen>,
    every: Duration,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    info!(every_secs = every.as_secs(), "account poller started");

    loop {
        ticker.tick().await;
        let n = seq.next();
        let started = Instant::now();
        match client.fetch_account().await {
            Ok(account) => {
                observe(DataClass::Account, started, true);
                if !send_update(&tx, DataClass::Account, None, n, StorePayload::Account(account))
                    .await
                {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::Account, started, false);
                warn!(error = %err, "account fetch failed");
            }
        }
    }
}

pub async fn run_orders_poller(
    client: Arc<dyn ExchangeClient>,
    tx: mpsc::Sender<StoreUpdate>,
    seq: Arc<SeqGen>,
    every: Duration,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    info!(every_secs = every.as_secs(), "open orders poller started");

    loop {
        ticker.tick().await;
        let n = seq.next();
        let started = Instant::now();
        match client.fetch_open_orders().await {
            Ok(orders) => {
                observe(DataClass::OpenOrders, started, true);
                if !send_update(
                    &tx,
                    DataClass::OpenOrders,
                    None,
                    n,
                    StorePayload::OpenOrders(orders),
                )
                .await
                {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::OpenOrders, started, false);
                warn!(error = %err, "open orders fetch failed");
            }
        }
    }
}

/// Fills track whichever market is currently selected.
pub async fn run_fills_poller(
    client: Arc<dyn ExchangeClient>,
    store: Store,
    tx: mpsc::Sender<StoreUpdate>,
    every: Duration,
) -> anyhow::Result<()> {
    let seq = SeqGen::new();
    let mut ticker = tokio::time::interval(every);
    info!(every_secs = every.as_secs(), "fills poller started");

    loop {
        ticker.tick().await;
        let market = store.selected_market();
        let n = seq.next();
        let started = Instant::now();
        match client.fetch_fills(&market).await {
            Ok(fills) => {
                observe(DataClass::Fills, started, true);
                if !send_update(
                    &tx,
                    DataClass::Fills,
                    Some(market),
                    n,
                    StorePayload::Fills(fills),
                )
                .await
                {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::Fills, started, false);
                warn!(market = %market, error = %err, "fills fetch failed");
            }
        }
    }
}

pub async fn run_candle_poller(
    http: reqwest::Client,
    store: Store,
    base_url: String,
    tx: mpsc::Sender<StoreUpdate>,
    every: Duration,
) -> anyhow::Result<()> {
    let seq = SeqGen::new();
    let mut ticker = tokio::time::interval(every);
    info!(every_secs = every.as_secs(), "candle poller started");

    loop {
        ticker.tick().await;
        let market = store.selected_market();
        let n = seq.next();
        let started = Instant::now();
        let to_ms = now_ms();
        let from_ms = to_ms.saturating_sub(CANDLE_LOOKBACK.as_millis() as u64);
        match ohlcv::fetch_candles(&http, &base_url, &market, CANDLE_RESOLUTION_SECS, from_ms, to_ms)
            .await
        {
            Ok(candles) => {
                observe(DataClass::Candles, started, true);
                if !send_update(
                    &tx,
                    DataClass::Candles,
                    Some(market),
                    n,
                    StorePayload::Candles(candles),
                )
                .await
                {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::Candles, started, false);
                warn!(market = %market, error = %err, "candle fetch failed");
            }
        }
    }
}

/// Consumes pushed account-change events and refetches the account and
/// open-orders slices immediately, instead of waiting for the next poll
/// tick. Shares the pollers' sequence sources so the store's staleness
/// gate orders both producers consistently.
pub async fn run_account_listener(
    mut events: broadcast::Receiver<AccountEvent>,
    client: Arc<dyn ExchangeClient>,
    tx: mpsc::Sender<StoreUpdate>,
    account_seq: Arc<SeqGen>,
    orders_seq: Arc<SeqGen>,
) -> anyhow::Result<()> {
    info!("account change listener started");

    loop {
        match events.recv().await {
            Ok(_) => {}
            // Missed wake-ups are covered by the refetch we do anyway.
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!(missed, "account event stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("account event stream closed, listener shutting down");
                return Ok(());
            }
        }

        let n = account_seq.next();
        let started = Instant::now();
        match client.fetch_account().await {
            Ok(account) => {
                observe(DataClass::Account, started, true);
                if !send_update(&tx, DataClass::Account, None, n, StorePayload::Account(account))
                    .await
                {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::Account, started, false);
                warn!(error = %err, "account refetch failed");
            }
        }

        let n = orders_seq.next();
        let started = Instant::now();
        match client.fetch_open_orders().await {
            Ok(orders) => {
                observe(DataClass::OpenOrders, started, true);
                if !send_update(
                    &tx,
                    DataClass::OpenOrders,
                    None,
                    n,
                    StorePayload::OpenOrders(orders),
                )
                .await
                {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::OpenOrders, started, false);
                warn!(error = %err, "open orders refetch failed");
            }
        }
    }
}

/// Periodic margin readout for the selected market: health, leverage and
/// the current max-size estimate for the form's side. This is what the
/// margin panel of a front-end would render.
pub async fn run_margin_monitor(
    engine: Arc<dyn MarginEngine>,
    store: Store,
    cluster: Cluster,
    every: Duration,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    info!(every_secs = every.as_secs(), "margin monitor started");

    loop {
        ticker.tick().await;
        let (Some(account), Some(group), Some(cache)) =
            (store.account(), store.group(), store.cache())
        else {
            continue;
        };
        let market_name = store.selected_market();
        let Some(market) = find_market(cluster, &market_name) else {
            continue;
        };

        let side = store.trade_form().side;
        let price = store
            .book(&market_name)
            .and_then(|b| b.mid_price())
            .or_else(|| cache.price(&market.base_symbol));
        let Some(price) = price else {
            continue;
        };

        let estimate = estimate_max_size(
            engine.as_ref(),
            Some(&account),
            Some(&group),
            Some(&cache),
            Some(market),
            side,
            price,
        );
        debug!(
            market = %market_name,
            side = %side,
            health = engine.health_ratio(&account, &group, &cache),
            leverage = engine.leverage(&account, &group, &cache),
            max_size = estimate.max,
            "margin snapshot"
        );
    }
}

pub async fn run_funding_poller(
    http: reqwest::Client,
    store: Store,
    base_url: String,
    tx: mpsc::Sender<StoreUpdate>,
    every: Duration,
) -> anyhow::Result<()> {
    let seq = SeqGen::new();
    let mut ticker = tokio::time::interval(every);
    info!(every_secs = every.as_secs(), "funding poller started");

    loop {
        ticker.tick().await;
        let market = store.selected_market();
        let n = seq.next();
        let started = Instant::now();
        match funding::fetch_funding(&http, &base_url, &market).await {
            Ok(rate) => {
                observe(DataClass::Funding, started, true);
                if !send_update(
                    &tx,
                    DataClass::Funding,
                    Some(market),
                    n,
                    StorePayload::Funding(rate),
                )
                .await
                {
                    return Ok(());
                }
            }
            Err(err) => {
                observe(DataClass::Funding, started, false);
                warn!(market = %market, error = %err, "funding fetch failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::markets_for;
    use crate::execution::paper::PaperClient;
    use crate::execution::traits::OrderIntent;
    use crate::market_data::types::{OrderKind, Side};

    #[tokio::test]
    async fn account_event_triggers_immediate_refetch() {
        let client = Arc::new(PaperClient::new(markets_for(Cluster::Mainnet)));
        let dyn_client: Arc<dyn ExchangeClient> = client.clone();
        let events = client.subscribe_account_changes();
        let (tx, mut rx) = mpsc::channel(16);
        let listener = tokio::spawn(run_account_listener(
            events,
            dyn_client,
            tx,
            Arc::new(SeqGen::new()),
            Arc::new(SeqGen::new()),
        ));

        // Placing a paper order fires an account-change event
        let intent = OrderIntent {
            market: "BTC-PERP".to_string(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            price: 100.0,
            size: 1.0,
            post_only: false,
            ioc: false,
            reduce_only: false,
        };
        client.place_perp_order(intent).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.class, DataClass::Account);
        assert!(matches!(first.payload, StorePayload::Account(Some(_))));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.class, DataClass::OpenOrders);
        match second.payload {
            StorePayload::OpenOrders(orders) => assert_eq!(orders.len(), 1),
            other => panic!("unexpected payload {other:?}"),
        }

        listener.abort();
    }
}
