use async_trait::async_trait;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::market_data::book::OrderBookSnapshot;
use crate::market_data::types::{OrderKind, Side, TriggerCondition};
use crate::state::snapshots::{
    AccountSnapshot, CacheSnapshot, FillEvent, GroupSnapshot, OpenOrder,
};

/// A validated order ready for the exchange client.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub market: String,
    pub side: Side,
    pub kind: OrderKind,
    pub price: f64,
    pub size: f64,
    pub post_only: bool,
    pub ioc: bool,
    pub reduce_only: bool,
}

#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub order_id: String,
    pub submitted_at: Instant,
}

/// Out-of-band notification that balances, positions or resting orders
/// changed. Carries no state; receivers refetch through the client.
#[derive(Debug, Clone, Copy)]
pub struct AccountEvent {
    pub ts_ms: u64,
}

/// The trading SDK, consumed as an opaque boundary: account/group/cache
/// object model, order placement, settlement. Nothing behind this trait
/// is reimplemented in this crate.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn fetch_group(&self) -> anyhow::Result<GroupSnapshot>;
    async fn fetch_cache(&self) -> anyhow::Result<CacheSnapshot>;
    /// None when the wallet has no margin account yet.
    async fn fetch_account(&self) -> anyhow::Result<Option<AccountSnapshot>>;
    async fn fetch_open_orders(&self) -> anyhow::Result<Vec<OpenOrder>>;
    async fn fetch_fills(&self, market: &str) -> anyhow::Result<Vec<FillEvent>>;
    async fn fetch_book_snapshot(&self, market: &str) -> anyhow::Result<OrderBookSnapshot>;

    async fn place_spot_order(&self, intent: OrderIntent) -> anyhow::Result<OrderReceipt>;
    async fn place_perp_order(&self, intent: OrderIntent) -> anyhow::Result<OrderReceipt>;
    async fn place_trigger_order(
        &self,
        intent: OrderIntent,
        condition: TriggerCondition,
        trigger_price: f64,
    ) -> anyhow::Result<OrderReceipt>;

    async fn cancel_order(&self, market: &str, order_id: &str) -> anyhow::Result<()>;
    async fn settle_funds(&self, market: &str) -> anyhow::Result<()>;

    /// Push stream of account-change events. A lagged receiver loses only
    /// wake-ups, not data — every event means "refetch now".
    fn subscribe_account_changes(&self) -> broadcast::Receiver<AccountEvent>;
}
