pub mod paper;
pub mod traits;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{Cluster, MarketConfig, find_market};
use crate::market_data::types::MarketKind;
use crate::metrics;
use crate::notify::Notification;
use crate::sizing::price::resolve_order_price;
use crate::state::store::Store;
use crate::state::trade_form::TradeForm;
use crate::util::{floor_to_increment, group_digits, precision_from_increment};
use traits::{ExchangeClient, OrderIntent};

/// A submit click: the market and a copy of the form as the user saw it.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub market: String,
    pub form: TradeForm,
}

/// Bridges order entry to the exchange client. Validates input, resolves
/// the submission price from the local book, clamps to market increments
/// and dispatches. Every rejection surfaces as a notification; nothing
/// invalid reaches the client, and a missing market price always aborts.
pub async fn run_submission_bridge(
    mut rx: mpsc::Receiver<SubmitRequest>,
    client: Arc<dyn ExchangeClient>,
    store: Store,
    cluster: Cluster,
    max_slippage: f64,
    notify_tx: mpsc::Sender<Notification>,
) {
    info!("submission bridge started");

    while let Some(request) = rx.recv().await {
        let outcome = submit_one(&request, client.as_ref(), &store, cluster, max_slippage).await;
        let notification = match outcome {
            Ok(placed) => {
                metrics::record_submission(&request.market, "ok");
                Notification::success("Order placed", placed.describe())
            }
            Err(reason) => {
                metrics::record_submission(&request.market, "rejected");
                warn!(market = %request.market, %reason, "order rejected");
                Notification::error("Order rejected", reason.to_string())
            }
        };
        if notify_tx.send(notification).await.is_err() {
            warn!("notification channel closed, stopping submission bridge");
            return;
        }
    }

    info!("submit channel closed, submission bridge shutting down");
}

/// Why a submit request never reached the exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    UnknownMarket(String),
    TradingGated,
    MissingSize,
    MissingPrice,
    MissingTriggerPrice,
    PriceUnavailable,
    BelowMinimum { min: f64 },
    ClientError(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RejectReason::UnknownMarket(m) => write!(f, "unknown market {m}"),
            RejectReason::TradingGated => write!(f, "trading is not available in your region"),
            RejectReason::MissingSize => write!(f, "missing size"),
            RejectReason::MissingPrice => write!(f, "missing price"),
            RejectReason::MissingTriggerPrice => write!(f, "missing trigger price"),
            RejectReason::PriceUnavailable => write!(f, "price unavailable"),
            RejectReason::BelowMinimum { min } => write!(f, "size below market minimum {min}"),
            RejectReason::ClientError(e) => write!(f, "{e}"),
        }
    }
}

/// Successful submission, with enough context to describe itself.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub summary: String,
}

impl PlacedOrder {
    fn describe(&self) -> String {
        format!("{} (order id {})", self.summary, self.order_id)
    }
}

async fn submit_one(
    request: &SubmitRequest,
    client: &dyn ExchangeClient,
    store: &Store,
    cluster: Cluster,
    max_slippage: f64,
) -> Result<PlacedOrder, RejectReason> {
    let market: &MarketConfig = find_market(cluster, &request.market)
        .ok_or_else(|| RejectReason::UnknownMarket(request.market.clone()))?;

    if store.wallet().geo_allowed == Some(false) {
        return Err(RejectReason::TradingGated);
    }

    let form = &request.form;
    let size = form.base_size.filter(|s| *s > 0.0).ok_or(RejectReason::MissingSize)?;
    if form.kind.is_limit_priced() && form.price.filter(|p| *p > 0.0).is_none() {
        return Err(RejectReason::MissingPrice);
    }
    if form.kind.is_trigger() && form.trigger_price.filter(|p| *p > 0.0).is_none() {
        return Err(RejectReason::MissingTriggerPrice);
    }

    // Market-priced kinds resolve against the latest local book. An
    // absent or too-thin book must abort here — submitting without a
    // price is not an option.
    let book = store.book(&market.name);
    let resolved = resolve_order_price(
        form.kind,
        form.side,
        book.as_ref(),
        form.price,
        form.trigger_price,
        size,
        max_slippage,
    )
    .ok_or(RejectReason::PriceUnavailable)?;

    let size = floor_to_increment(size, market.lot_size);
    if size < market.min_order_size {
        return Err(RejectReason::BelowMinimum {
            min: market.min_order_size,
        });
    }
    let price = floor_to_increment(resolved.limit_price, market.tick_size);

    let intent = OrderIntent {
        market: market.name.clone(),
        side: form.side,
        kind: form.kind,
        price,
        size,
        post_only: form.post_only,
        ioc: form.ioc,
        reduce_only: form.reduce_only,
    };

    let receipt = match resolved.trigger {
        Some((condition, trigger_price)) => client
            .place_trigger_order(intent, condition, trigger_price)
            .await
            .map_err(|e| RejectReason::ClientError(e.to_string()))?,
        None => match market.kind {
            MarketKind::Spot => client
                .place_spot_order(intent)
                .await
                .map_err(|e| RejectReason::ClientError(e.to_string()))?,
            MarketKind::Perp => client
                .place_perp_order(intent)
                .await
                .map_err(|e| RejectReason::ClientError(e.to_string()))?,
        },
    };

    info!(
        market = %market.name,
        order_id = %receipt.order_id,
        price,
        size,
        "order submitted"
    );

    let summary = format!(
        "{} {} {} {} @ {}",
        form.kind,
        form.side,
        group_digits(size, precision_from_increment(market.lot_size)),
        market.name,
        group_digits(price, precision_from_increment(market.tick_size)),
    );
    Ok(PlacedOrder {
        order_id: receipt.order_id,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::markets_for;
    use crate::market_data::book::OrderBookSnapshot;
    use crate::market_data::types::{BookLevel, OrderKind, Side};
    use crate::state::store::{DataClass, StorePayload, StoreUpdate};
    use super::paper::PaperClient;

    fn store_with_book(market: &str) -> Store {
        let store = Store::new(market);
        let book = OrderBookSnapshot {
            market: market.to_string(),
            bids: vec![BookLevel { price: 99.0, size: 5.0 }],
            asks: vec![BookLevel { price: 100.0, size: 5.0 }],
            seq: 1,
            ts_recv_ms: 0,
        };
        store.apply(StoreUpdate {
            class: DataClass::Book,
            market: Some(market.to_string()),
            seq: 1,
            payload: StorePayload::Book(book),
        });
        store
    }

    fn limit_buy(size: Option<f64>, price: Option<f64>) -> SubmitRequest {
        let mut form = TradeForm::default();
        form.side = Side::Buy;
        form.kind = OrderKind::Limit;
        form.base_size = size;
        form.price = price;
        SubmitRequest {
            market: "BTC-PERP".to_string(),
            form,
        }
    }

    #[tokio::test]
    async fn missing_size_never_reaches_client() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let store = store_with_book("BTC-PERP");

        let err = submit_one(
            &limit_buy(None, Some(100.0)),
            &client,
            &store,
            Cluster::Mainnet,
            0.01,
        )
        .await
        .unwrap_err();

        assert_eq!(err, RejectReason::MissingSize);
        assert!(client.fetch_open_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn market_order_without_book_aborts() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let store = Store::new("BTC-PERP"); // no book hydrated

        let mut request = limit_buy(Some(1.0), None);
        request.form.kind = OrderKind::Market;

        let err = submit_one(&request, &client, &store, Cluster::Mainnet, 0.01)
            .await
            .unwrap_err();

        assert_eq!(err, RejectReason::PriceUnavailable);
        assert!(client.fetch_open_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn market_order_beyond_depth_aborts() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let store = store_with_book("BTC-PERP");

        let mut request = limit_buy(Some(50.0), None); // book holds 5
        request.form.kind = OrderKind::Market;

        let err = submit_one(&request, &client, &store, Cluster::Mainnet, 0.01)
            .await
            .unwrap_err();
        assert_eq!(err, RejectReason::PriceUnavailable);
    }

    #[tokio::test]
    async fn geo_gate_blocks_submission() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let store = store_with_book("BTC-PERP");
        store.update_wallet(|w| w.geo_allowed = Some(false));

        let err = submit_one(
            &limit_buy(Some(1.0), Some(100.0)),
            &client,
            &store,
            Cluster::Mainnet,
            0.01,
        )
        .await
        .unwrap_err();
        assert_eq!(err, RejectReason::TradingGated);
    }

    #[tokio::test]
    async fn valid_limit_order_is_placed() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let store = store_with_book("BTC-PERP");

        let placed = submit_one(
            &limit_buy(Some(1.0), Some(99.5)),
            &client,
            &store,
            Cluster::Mainnet,
            0.01,
        )
        .await
        .unwrap();

        let orders = client.fetch_open_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, placed.order_id);
        assert!((orders[0].price - 99.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn dust_size_rejected_after_clamping() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let store = store_with_book("BTC-PERP");

        let err = submit_one(
            &limit_buy(Some(0.00005), Some(99.5)), // below min_order_size
            &client,
            &store,
            Cluster::Mainnet,
            0.01,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RejectReason::BelowMinimum { .. }));
    }
}
