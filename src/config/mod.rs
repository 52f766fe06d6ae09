use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::market_data::types::MarketKind;

/// Static description of a tradable instrument. Loaded from the cluster
/// table, never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub name: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    pub kind: MarketKind,
    pub base_decimals: u32,
    pub quote_decimals: u32,
    pub min_order_size: f64,
    /// Price increment.
    pub tick_size: f64,
    /// Size increment.
    pub lot_size: f64,
}

impl MarketConfig {
    pub fn perp(name: &str, base: &str, quote: &str) -> Self {
        Self {
            name: name.to_string(),
            base_symbol: base.to_string(),
            quote_symbol: quote.to_string(),
            kind: MarketKind::Perp,
            base_decimals: 6,
            quote_decimals: 6,
            min_order_size: 0.0001,
            tick_size: 0.01,
            lot_size: 0.0001,
        }
    }

    pub fn spot(name: &str, base: &str, quote: &str) -> Self {
        Self {
            kind: MarketKind::Spot,
            ..Self::perp(name, base, quote)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cluster {
    Mainnet,
    Devnet,
}

impl Cluster {
    fn parse(s: &str) -> Self {
        match s {
            "devnet" => Cluster::Devnet,
            _ => Cluster::Mainnet,
        }
    }
}

static MAINNET_MARKETS: Lazy<Vec<MarketConfig>> = Lazy::new(|| {
    vec![
        MarketConfig::perp("BTC-PERP", "BTC", "USDC"),
        MarketConfig::perp("ETH-PERP", "ETH", "USDC"),
        MarketConfig::perp("SOL-PERP", "SOL", "USDC"),
        MarketConfig::spot("BTC/USDC", "BTC", "USDC"),
        MarketConfig::spot("ETH/USDC", "ETH", "USDC"),
        MarketConfig::spot("SOL/USDC", "SOL", "USDC"),
        MarketConfig::spot("SRM/USDC", "SRM", "USDC"),
    ]
});

static DEVNET_MARKETS: Lazy<Vec<MarketConfig>> = Lazy::new(|| {
    vec![
        MarketConfig::perp("BTC-PERP", "BTC", "USDC"),
        MarketConfig::spot("BTC/USDC", "BTC", "USDC"),
    ]
});

pub fn markets_for(cluster: Cluster) -> &'static [MarketConfig] {
    match cluster {
        Cluster::Mainnet => &MAINNET_MARKETS,
        Cluster::Devnet => &DEVNET_MARKETS,
    }
}

pub fn find_market(cluster: Cluster, name: &str) -> Option<&'static MarketConfig> {
    markets_for(cluster).iter().find(|m| m.name == name)
}

pub const ICON_FALLBACK: &str = "generic";

/// Display icon for a base symbol. Enumerated on purpose: adding a market
/// means adding a row here, and the config test fails until it exists.
pub fn icon_for_symbol(symbol: &str) -> &'static str {
    match symbol {
        "BTC" => "btc",
        "ETH" => "eth",
        "SOL" => "sol",
        "SRM" => "srm",
        "USDC" => "usdc",
        "USDT" => "usdt",
        _ => ICON_FALLBACK,
    }
}

/// Countries where the exchange is not permitted to serve the UI.
pub static RESTRICTED_COUNTRIES: &[&str] = &["US", "CU", "IR", "KP", "SY"];

/// Runtime configuration from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub cluster: Cluster,
    pub book_ws_url: String,
    pub funding_api_url: String,
    pub ohlcv_api_url: String,
    pub geo_api_url: String,
    pub settings_path: String,
    pub metrics_enabled: bool,
    pub intervals: PollIntervals,
}

/// Refresh cadence per data class.
#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    pub group_cache: Duration,
    pub open_orders: Duration,
    pub account: Duration,
    pub group: Duration,
    pub candles: Duration,
    pub fills: Duration,
    pub funding: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            group_cache: Duration::from_secs(12),
            open_orders: Duration::from_secs(20),
            account: Duration::from_secs(90),
            group: Duration::from_secs(120),
            candles: Duration::from_secs(5),
            fills: Duration::from_secs(5),
            funding: Duration::from_secs(20),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        let defaults = PollIntervals::default();
        Ok(Self {
            log_level: env_or("RUST_LOG", "info"),
            cluster: Cluster::parse(&env_or("CLUSTER", "mainnet")),
            // Development placeholder; the deployed feed replaces this.
            book_ws_url: env_or("BOOK_WS_URL", "ws://localhost:8080"),
            funding_api_url: env_or("FUNDING_API_URL", "https://api.example.exchange/funding"),
            ohlcv_api_url: env_or("OHLCV_API_URL", "https://api.example.exchange/ohlcv"),
            geo_api_url: env_or("GEO_API_URL", "https://geo.example.exchange/country"),
            settings_path: env_or("SETTINGS_PATH", "terminal-settings.json"),
            metrics_enabled: env_or("METRICS_ENABLED", "true") == "true",
            intervals: PollIntervals {
                group_cache: env_secs("POLL_GROUP_CACHE_SECS", defaults.group_cache),
                open_orders: env_secs("POLL_OPEN_ORDERS_SECS", defaults.open_orders),
                account: env_secs("POLL_ACCOUNT_SECS", defaults.account),
                group: env_secs("POLL_GROUP_SECS", defaults.group),
                candles: env_secs("POLL_CANDLES_SECS", defaults.candles),
                fills: env_secs("POLL_FILLS_SECS", defaults.fills),
                funding: env_secs("POLL_FUNDING_SECS", defaults.funding),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_market_has_an_icon() {
        for cluster in [Cluster::Mainnet, Cluster::Devnet] {
            for market in markets_for(cluster) {
                assert_ne!(
                    icon_for_symbol(&market.base_symbol),
                    ICON_FALLBACK,
                    "no icon mapped for {}",
                    market.base_symbol
                );
            }
        }
    }

    #[test]
    fn market_lookup() {
        let m = find_market(Cluster::Mainnet, "BTC-PERP").unwrap();
        assert_eq!(m.kind, MarketKind::Perp);
        assert!(find_market(Cluster::Devnet, "SRM/USDC").is_none());
    }

    #[test]
    fn unknown_symbol_falls_back() {
        assert_eq!(icon_for_symbol("XYZ"), ICON_FALLBACK);
    }
}
