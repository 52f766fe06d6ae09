//! The session store. Every hydration producer writes through one mpsc
//! queue of `StoreUpdate`s, each stamped with a per-data-class sequence
//! number taken when its fetch started. The writer task discards any
//! update older than the last one applied for its (class, market) key, so
//! a slow fetch completing late can never clobber newer state.
//!
//! Reads are per-slice clones; cross-slice reads are not transactional.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::market_data::book::OrderBookSnapshot;
use crate::metrics;
use crate::state::snapshots::{
    AccountSnapshot, CacheSnapshot, Candle, FillEvent, FundingRate, GroupSnapshot, OpenOrder,
    WalletStatus,
};
use crate::state::trade_form::TradeForm;

/// Hydrated data classes, each with its own refresh cadence and its own
/// monotonic sequence domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataClass {
    GroupCache,
    Group,
    Account,
    OpenOrders,
    Fills,
    Candles,
    Funding,
    Book,
}

impl DataClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataClass::GroupCache => "group_cache",
            DataClass::Group => "group",
            DataClass::Account => "account",
            DataClass::OpenOrders => "open_orders",
            DataClass::Fills => "fills",
            DataClass::Candles => "candles",
            DataClass::Funding => "funding",
            DataClass::Book => "book",
        }
    }
}

#[derive(Debug, Clone)]
pub enum StorePayload {
    Cache(CacheSnapshot),
    Group(GroupSnapshot),
    /// None when the wallet has no account yet.
    Account(Option<AccountSnapshot>),
    OpenOrders(Vec<OpenOrder>),
    Fills(Vec<FillEvent>),
    Candles(Vec<Candle>),
    Funding(FundingRate),
    Book(OrderBookSnapshot),
}

#[derive(Debug, Clone)]
pub struct StoreUpdate {
    pub class: DataClass,
    /// Market-scoped classes (fills, candles, funding, book) carry the
    /// market name; account-scoped classes do not.
    pub market: Option<String>,
    pub seq: u64,
    pub payload: StorePayload,
}

/// Sequence source for one producer. Sequences are taken when a fetch
/// starts, not when it completes — that ordering is what the store's
/// staleness gate enforces.
#[derive(Debug, Default)]
pub struct SeqGen(AtomicU64);

impl SeqGen {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    cache: RwLock<Option<CacheSnapshot>>,
    group: RwLock<Option<GroupSnapshot>>,
    account: RwLock<Option<AccountSnapshot>>,
    open_orders: RwLock<Vec<OpenOrder>>,
    fills: DashMap<String, Vec<FillEvent>>,
    candles: DashMap<String, Vec<Candle>>,
    funding: DashMap<String, FundingRate>,
    books: DashMap<String, OrderBookSnapshot>,
    trade_form: RwLock<TradeForm>,
    selected_market: RwLock<String>,
    wallet: RwLock<WalletStatus>,
    /// Last applied sequence per (class, market) key.
    applied: DashMap<(DataClass, Option<String>), u64>,
}

// Lock poisoning only happens if a writer panicked mid-update; the data is
// still the last coherent clone, so recover rather than propagate.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Store {
    pub fn new(default_market: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                cache: RwLock::new(None),
                group: RwLock::new(None),
                account: RwLock::new(None),
                open_orders: RwLock::new(Vec::new()),
                fills: DashMap::new(),
                candles: DashMap::new(),
                funding: DashMap::new(),
                books: DashMap::new(),
                trade_form: RwLock::new(TradeForm::default()),
                selected_market: RwLock::new(default_market.into()),
                wallet: RwLock::new(WalletStatus::default()),
                applied: DashMap::new(),
            }),
        }
    }

    /// Apply a hydration update. Returns false when the update is stale
    /// (its seq is not newer than the last applied for its key).
    pub fn apply(&self, update: StoreUpdate) -> bool {
        let key = (update.class, update.market.clone());
        {
            let mut entry = self.inner.applied.entry(key).or_insert(0);
            if update.seq <= *entry {
                return false;
            }
            *entry = update.seq;
        }

        match update.payload {
            StorePayload::Cache(c) => *write_lock(&self.inner.cache) = Some(c),
            StorePayload::Group(g) => *write_lock(&self.inner.group) = Some(g),
            StorePayload::Account(a) => *write_lock(&self.inner.account) = a,
            StorePayload::OpenOrders(o) => *write_lock(&self.inner.open_orders) = o,
            StorePayload::Fills(f) => {
                if let Some(market) = update.market {
                    self.inner.fills.insert(market, f);
                }
            }
            StorePayload::Candles(c) => {
                if let Some(market) = update.market {
                    self.inner.candles.insert(market, c);
                }
            }
            StorePayload::Funding(r) => {
                if let Some(market) = update.market {
                    self.inner.funding.insert(market, r);
                }
            }
            StorePayload::Book(b) => {
                self.inner.books.insert(b.market.clone(), b);
            }
        }
        true
    }

    // ── Hydrated slices ─────────────────────────────────────────────

    pub fn cache(&self) -> Option<CacheSnapshot> {
        read_lock(&self.inner.cache).clone()
    }

    pub fn group(&self) -> Option<GroupSnapshot> {
        read_lock(&self.inner.group).clone()
    }

    pub fn account(&self) -> Option<AccountSnapshot> {
        read_lock(&self.inner.account).clone()
    }

    pub fn open_orders(&self) -> Vec<OpenOrder> {
        read_lock(&self.inner.open_orders).clone()
    }

    pub fn fills(&self, market: &str) -> Vec<FillEvent> {
        self.inner
            .fills
            .get(market)
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    pub fn candles(&self, market: &str) -> Vec<Candle> {
        self.inner
            .candles
            .get(market)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn funding(&self, market: &str) -> Option<FundingRate> {
        self.inner.funding.get(market).map(|r| *r)
    }

    pub fn book(&self, market: &str) -> Option<OrderBookSnapshot> {
        self.inner.books.get(market).map(|b| b.clone())
    }

    // ── Session slices (user interaction, single-writer by nature) ──

    pub fn trade_form(&self) -> TradeForm {
        read_lock(&self.inner.trade_form).clone()
    }

    pub fn update_trade_form(&self, f: impl FnOnce(&mut TradeForm)) {
        f(&mut write_lock(&self.inner.trade_form));
    }

    pub fn selected_market(&self) -> String {
        read_lock(&self.inner.selected_market).clone()
    }

    /// Switch markets; trade-form input is cleared opportunistically.
    pub fn select_market(&self, market: impl Into<String>) {
        *write_lock(&self.inner.selected_market) = market.into();
        write_lock(&self.inner.trade_form).reset_for_market();
    }

    pub fn wallet(&self) -> WalletStatus {
        read_lock(&self.inner.wallet).clone()
    }

    pub fn update_wallet(&self, f: impl FnOnce(&mut WalletStatus)) {
        f(&mut write_lock(&self.inner.wallet));
    }
}

/// Single writer task: serializes all hydration mutations through one
/// queue, counting and dropping stale updates.
pub async fn run_store_writer(mut rx: mpsc::Receiver<StoreUpdate>, store: Store) {
    info!("store writer started");

    while let Some(update) = rx.recv().await {
        let class = update.class;
        let market = update.market.clone();
        let seq = update.seq;

        if store.apply(update) {
            metrics::record_store_apply(class.as_str());
        } else {
            debug!(
                class = class.as_str(),
                market = market.as_deref().unwrap_or("-"),
                seq,
                "discarding stale update"
            );
            metrics::record_stale_drop(class.as_str());
        }
    }

    info!("update channel closed, store writer shutting down");
}
