//! Deterministic in-memory exchange client for development and tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use super::traits::{AccountEvent, ExchangeClient, OrderIntent, OrderReceipt};
use crate::config::MarketConfig;
use crate::market_data::book::OrderBookSnapshot;
use crate::market_data::types::{BookLevel, Side, TriggerCondition};
use crate::sizing::MarginEngine;
use crate::state::snapshots::{
    AccountSnapshot, CacheSnapshot, FillEvent, GroupSnapshot, MarketParams, OpenOrder,
};
use crate::util::now_ms;

pub struct PaperClient {
    next_order_id: AtomicU64,
    orders: Mutex<Vec<OpenOrder>>,
    prices: HashMap<String, f64>,
    markets: Vec<MarketConfig>,
    events: broadcast::Sender<AccountEvent>,
}

impl PaperClient {
    pub fn new(markets: &[MarketConfig]) -> Self {
        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), 60_000.0);
        prices.insert("ETH".to_string(), 3_000.0);
        prices.insert("SOL".to_string(), 150.0);
        prices.insert("SRM".to_string(), 0.05);
        prices.insert("USDC".to_string(), 1.0);

        let (events, _) = broadcast::channel(32);
        Self {
            next_order_id: AtomicU64::new(1),
            orders: Mutex::new(Vec::new()),
            prices,
            markets: markets.to_vec(),
            events,
        }
    }

    // No subscribers is fine; the event is only a wake-up.
    fn notify_account_change(&self) {
        let _ = self.events.send(AccountEvent { ts_ms: now_ms() });
    }

    fn fill(&self, intent: &OrderIntent) -> OrderReceipt {
        let order_id = self.next_order_id.fetch_add(1, Ordering::Relaxed);

        info!(
            order_id,
            market = %intent.market,
            side = %intent.side,
            kind = %intent.kind,
            price = intent.price,
            size = intent.size,
            "PAPER ORDER"
        );

        let mut orders = self.orders.lock().unwrap_or_else(|e| e.into_inner());
        orders.push(OpenOrder {
            order_id: order_id.to_string(),
            market: intent.market.clone(),
            side: intent.side,
            price: intent.price,
            size: intent.size,
            filled_size: 0.0,
            ts_ms: now_ms(),
        });

        drop(orders);
        self.notify_account_change();

        OrderReceipt {
            order_id: order_id.to_string(),
            submitted_at: Instant::now(),
        }
    }

    fn reference_price(&self, market: &str) -> f64 {
        let base = self
            .markets
            .iter()
            .find(|m| m.name == market)
            .map(|m| m.base_symbol.as_str())
            .unwrap_or("BTC");
        self.prices.get(base).copied().unwrap_or(1.0)
    }
}

#[async_trait]
impl ExchangeClient for PaperClient {
    async fn fetch_group(&self) -> anyhow::Result<GroupSnapshot> {
        let markets = self
            .markets
            .iter()
            .map(|m| {
                (
                    m.name.clone(),
                    MarketParams {
                        name: m.name.clone(),
                        kind: m.kind,
                        init_leverage: 5.0,
                        maint_leverage: 10.0,
                        maker_fee: -0.0004,
                        taker_fee: 0.0005,
                    },
                )
            })
            .collect();
        Ok(GroupSnapshot {
            markets,
            ts_ms: now_ms(),
        })
    }

    async fn fetch_cache(&self) -> anyhow::Result<CacheSnapshot> {
        Ok(CacheSnapshot {
            prices: self.prices.clone(),
            ts_ms: now_ms(),
        })
    }

    async fn fetch_account(&self) -> anyhow::Result<Option<AccountSnapshot>> {
        let mut deposits = HashMap::new();
        deposits.insert("USDC".to_string(), 10_000.0);
        Ok(Some(AccountSnapshot {
            owner: "paper".to_string(),
            deposits,
            borrows: HashMap::new(),
            perp_positions: HashMap::new(),
            in_orders_quote: 0.0,
            equity: 10_000.0,
            ts_ms: now_ms(),
        }))
    }

    async fn fetch_open_orders(&self) -> anyhow::Result<Vec<OpenOrder>> {
        Ok(self
            .orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn fetch_fills(&self, market: &str) -> anyhow::Result<Vec<FillEvent>> {
        let price = self.reference_price(market);
        Ok(vec![FillEvent {
            market: market.to_string(),
            price,
            size: 0.5,
            side: Side::Buy,
            ts_ms: now_ms(),
        }])
    }

    async fn fetch_book_snapshot(&self, market: &str) -> anyhow::Result<OrderBookSnapshot> {
        let mid = self.reference_price(market);
        let tick = mid * 0.0005;
        let level = |offset: i32| BookLevel {
            price: crate::util::round_to_decimal(mid + tick * offset as f64, 2),
            size: 2.0,
        };
        Ok(OrderBookSnapshot {
            market: market.to_string(),
            bids: vec![level(-1), level(-2), level(-3)],
            asks: vec![level(1), level(2), level(3)],
            seq: now_ms(),
            ts_recv_ms: now_ms(),
        })
    }

    async fn place_spot_order(&self, intent: OrderIntent) -> anyhow::Result<OrderReceipt> {
        Ok(self.fill(&intent))
    }

    async fn place_perp_order(&self, intent: OrderIntent) -> anyhow::Result<OrderReceipt> {
        Ok(self.fill(&intent))
    }

    async fn place_trigger_order(
        &self,
        intent: OrderIntent,
        condition: TriggerCondition,
        trigger_price: f64,
    ) -> anyhow::Result<OrderReceipt> {
        info!(?condition, trigger_price, "PAPER TRIGGER");
        Ok(self.fill(&intent))
    }

    async fn cancel_order(&self, _market: &str, order_id: &str) -> anyhow::Result<()> {
        {
            let mut orders = self.orders.lock().unwrap_or_else(|e| e.into_inner());
            orders.retain(|o| o.order_id != order_id);
        }
        self.notify_account_change();
        Ok(())
    }

    async fn settle_funds(&self, market: &str) -> anyhow::Result<()> {
        info!(market, "PAPER SETTLE");
        self.notify_account_change();
        Ok(())
    }

    fn subscribe_account_changes(&self) -> broadcast::Receiver<AccountEvent> {
        self.events.subscribe()
    }
}

/// Fixed-weight margin model standing in for the SDK's health math.
/// Free collateral is equity minus exposure/init_leverage; headroom is
/// free collateral times init_leverage.
pub struct PaperMarginEngine {
    pub init_leverage: f64,
}

impl Default for PaperMarginEngine {
    fn default() -> Self {
        Self { init_leverage: 5.0 }
    }
}

impl PaperMarginEngine {
    fn exposure(&self, account: &AccountSnapshot, cache: &CacheSnapshot) -> f64 {
        account
            .perp_positions
            .iter()
            .map(|(market, pos)| {
                let base = market.split('-').next().unwrap_or(market);
                pos.base_size.abs() * cache.price(base).unwrap_or(0.0)
            })
            .sum::<f64>()
            + account.in_orders_quote
    }
}

impl MarginEngine for PaperMarginEngine {
    fn margin_available(
        &self,
        account: &AccountSnapshot,
        _group: &GroupSnapshot,
        cache: &CacheSnapshot,
        _market: &MarketConfig,
        _side: Side,
    ) -> f64 {
        let free = account.equity - self.exposure(account, cache) / self.init_leverage;
        (free * self.init_leverage).max(0.0)
    }

    fn health_ratio(
        &self,
        account: &AccountSnapshot,
        _group: &GroupSnapshot,
        cache: &CacheSnapshot,
    ) -> f64 {
        let exposure = self.exposure(account, cache);
        if exposure <= 0.0 {
            return f64::INFINITY;
        }
        account.equity / exposure
    }

    fn leverage(
        &self,
        account: &AccountSnapshot,
        _group: &GroupSnapshot,
        cache: &CacheSnapshot,
    ) -> f64 {
        if account.equity <= 0.0 {
            return 0.0;
        }
        self.exposure(account, cache) / account.equity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cluster, markets_for};
    use crate::market_data::types::OrderKind;

    fn intent() -> OrderIntent {
        OrderIntent {
            market: "BTC-PERP".to_string(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            price: 100.0,
            size: 1.0,
            post_only: false,
            ioc: false,
            reduce_only: false,
        }
    }

    #[tokio::test]
    async fn order_placement_emits_account_event() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let mut events = client.subscribe_account_changes();

        client.place_perp_order(intent()).await.unwrap();

        let event = events.recv().await.unwrap();
        assert!(event.ts_ms > 0);
    }

    #[tokio::test]
    async fn cancel_emits_account_event() {
        let client = PaperClient::new(markets_for(Cluster::Mainnet));
        let receipt = client.place_perp_order(intent()).await.unwrap();

        let mut events = client.subscribe_account_changes();
        client.cancel_order("BTC-PERP", &receipt.order_id).await.unwrap();

        assert!(events.recv().await.is_ok());
        assert!(client.fetch_open_orders().await.unwrap().is_empty());
    }
}
