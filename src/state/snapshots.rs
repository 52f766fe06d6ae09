//! Point-in-time mirrors of the exchange client's return shapes.
//! Each snapshot is replaced wholesale on refresh — no incremental patching.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::market_data::types::{MarketKind, Side};

/// Oracle price cache, symbol → quote price.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub prices: HashMap<String, f64>,
    pub ts_ms: u64,
}

impl CacheSnapshot {
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }
}

/// Per-market risk parameters as published by the exchange group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketParams {
    pub name: String,
    pub kind: MarketKind,
    pub init_leverage: f64,
    pub maint_leverage: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
}

/// The exchange group: the full set of listed markets and their parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub markets: HashMap<String, MarketParams>,
    pub ts_ms: u64,
}

impl GroupSnapshot {
    pub fn market_params(&self, name: &str) -> Option<&MarketParams> {
        self.markets.get(name)
    }
}

/// Signed perp position for one market.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerpPosition {
    /// Base size; positive long, negative short.
    pub base_size: f64,
    pub quote_position: f64,
}

/// A user's collateral and positions at one refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub owner: String,
    /// Token symbol → deposited amount.
    pub deposits: HashMap<String, f64>,
    /// Token symbol → borrowed amount.
    pub borrows: HashMap<String, f64>,
    /// Market name → perp position.
    pub perp_positions: HashMap<String, PerpPosition>,
    /// Quote value locked in resting orders.
    pub in_orders_quote: f64,
    /// Quote-denominated account equity as reported by the exchange.
    pub equity: f64,
    pub ts_ms: u64,
}

impl AccountSnapshot {
    pub fn token_deposits(&self, symbol: &str) -> f64 {
        self.deposits.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn token_borrows(&self, symbol: &str) -> f64 {
        self.borrows.get(symbol).copied().unwrap_or(0.0)
    }

    /// Signed base position for a perp market; 0 when flat or unknown.
    pub fn perp_base_position(&self, market: &str) -> f64 {
        self.perp_positions
            .get(market)
            .map(|p| p.base_size)
            .unwrap_or(0.0)
    }
}

/// A resting order as listed by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub market: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub filled_size: f64,
    pub ts_ms: u64,
}

/// A public trade print for the selected market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillEvent {
    pub market: String,
    pub price: f64,
    pub size: f64,
    pub side: Side,
    pub ts_ms: u64,
}

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub ts_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Current funding for a perp market.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FundingRate {
    /// Hourly rate as a fraction (0.0001 = 1bp/h).
    pub hourly_rate: f64,
    pub open_interest: f64,
    pub ts_ms: u64,
}

/// Wallet/session status, including the geo gate verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletStatus {
    pub connected: bool,
    pub address: Option<String>,
    /// None until the geo lookup completes; Some(false) blocks trading.
    pub geo_allowed: Option<bool>,
    pub country: Option<String>,
}
