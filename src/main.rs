use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use perp_terminal::config::{self, Config};
use perp_terminal::execution::paper::{PaperClient, PaperMarginEngine};
use perp_terminal::execution::traits::ExchangeClient;
use perp_terminal::market_data::feeds::{book_ws, geo};
use perp_terminal::settings::Settings;
use perp_terminal::sizing::MarginEngine;
use perp_terminal::state::store::{SeqGen, Store, StoreUpdate, run_store_writer};
use perp_terminal::{console, execution, hydration, metrics, notify};

/// Hydration→store channel buffer. Sized to absorb book-feed bursts
/// without back-pressuring the WebSocket reader.
const STORE_CHANNEL_BUFFER: usize = 4_096;
const SUBMIT_CHANNEL_BUFFER: usize = 64;
const NOTIFY_CHANNEL_BUFFER: usize = 256;
const MARGIN_MONITOR_SECS: u64 = 30;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    if config.metrics_enabled {
        metrics::init_metrics_server()?;
    }

    let settings = Settings::load_or_default(&config.settings_path);
    info!(
        cluster = ?config.cluster,
        default_market = %settings.default_market,
        "perp-terminal starting"
    );

    let store = Store::new(settings.default_market.clone());
    let client: Arc<dyn ExchangeClient> =
        Arc::new(PaperClient::new(config::markets_for(config.cluster)));
    let engine: Arc<dyn MarginEngine> = Arc::new(PaperMarginEngine::default());
    let http = reqwest::Client::new();

    let (update_tx, update_rx) = mpsc::channel::<StoreUpdate>(STORE_CHANNEL_BUFFER);
    let (submit_tx, submit_rx) = mpsc::channel(SUBMIT_CHANNEL_BUFFER);
    let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_CHANNEL_BUFFER);

    let writer = tokio::spawn(run_store_writer(update_rx, store.clone()));
    let sink = tokio::spawn(notify::run_notification_sink(notify_rx));
    let bridge = tokio::spawn(execution::run_submission_bridge(
        submit_rx,
        client.clone(),
        store.clone(),
        config.cluster,
        settings.max_slippage,
        notify_tx.clone(),
    ));

    // Geo gate: a failed lookup leaves trading gated off.
    match geo::check_geo(&http, &config.geo_api_url).await {
        Ok(verdict) => {
            if !verdict.allowed {
                warn!(country = %verdict.country, "region is restricted, trading disabled");
                let _ = notify_tx
                    .send(notify::Notification::info(
                        "Trading unavailable",
                        format!("not available in {}", verdict.country),
                    ))
                    .await;
            }
            store.update_wallet(|w| {
                w.geo_allowed = Some(verdict.allowed);
                w.country = Some(verdict.country.clone());
            });
        }
        Err(err) => {
            warn!(error = %err, "geo lookup failed, trading stays gated");
            store.update_wallet(|w| w.geo_allowed = Some(false));
        }
    }
    drop(notify_tx);

    let iv = config.intervals;
    // Account-scoped classes have two producers (poller + change listener),
    // so their sequence sources are shared.
    let account_seq = Arc::new(SeqGen::new());
    let orders_seq = Arc::new(SeqGen::new());

    tokio::spawn(hydration::run_cache_poller(
        client.clone(),
        update_tx.clone(),
        iv.group_cache,
    ));
    tokio::spawn(hydration::run_group_poller(
        client.clone(),
        update_tx.clone(),
        iv.group,
    ));
    tokio::spawn(hydration::run_account_poller(
        client.clone(),
        update_tx.clone(),
        account_seq.clone(),
        iv.account,
    ));
    tokio::spawn(hydration::run_orders_poller(
        client.clone(),
        update_tx.clone(),
        orders_seq.clone(),
        iv.open_orders,
    ));
    tokio::spawn(hydration::run_account_listener(
        client.subscribe_account_changes(),
        client.clone(),
        update_tx.clone(),
        account_seq,
        orders_seq,
    ));
    tokio::spawn(hydration::run_fills_poller(
        client.clone(),
        store.clone(),
        update_tx.clone(),
        iv.fills,
    ));
    tokio::spawn(hydration::run_candle_poller(
        http.clone(),
        store.clone(),
        config.ohlcv_api_url.clone(),
        update_tx.clone(),
        iv.candles,
    ));
    tokio::spawn(hydration::run_funding_poller(
        http.clone(),
        store.clone(),
        config.funding_api_url.clone(),
        update_tx.clone(),
        iv.funding,
    ));

    tokio::spawn(hydration::run_margin_monitor(
        engine,
        store.clone(),
        config.cluster,
        std::time::Duration::from_secs(MARGIN_MONITOR_SECS),
    ));

    let book_feed = tokio::spawn(book_ws::run_book_feed(
        config.book_ws_url.clone(),
        store.clone(),
        client.clone(),
        update_tx.clone(),
    ));

    let console = tokio::spawn(console::run_console(
        store.clone(),
        submit_tx,
        config.cluster,
    ));

    tokio::select! {
        res = writer => warn!(?res, "store writer exited"),
        res = bridge => warn!(?res, "submission bridge exited"),
        res = sink => warn!(?res, "notification sink exited"),
        res = book_feed => {
            match res {
                Ok(Ok(())) => warn!("book feed exited"),
                Ok(Err(err)) => warn!(error = %err, "book feed returned error"),
                Err(err) => warn!(error = %err, "book feed task panicked"),
            }
        }
        res = console => {
            info!(?res, "console exited, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
        }
    }

    settings.save(&config.settings_path);
    Ok(())
}
