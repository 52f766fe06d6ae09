//! Persisted user preferences. A JSON file stands in for the browser's
//! key-value storage; losing it only loses preferences, so load falls
//! back to defaults and save errors are logged rather than propagated.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rpc_endpoint: String,
    pub default_market: String,
    pub hidden_markets: Vec<String>,
    pub favorite_markets: Vec<String>,
    /// Fractional pad applied to market-order prices, e.g. 0.025 = 2.5%.
    pub max_slippage: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_endpoint: "https://rpc.example.exchange".to_string(),
            default_market: "BTC-PERP".to_string(),
            hidden_markets: Vec::new(),
            favorite_markets: Vec::new(),
            max_slippage: 0.025,
        }
    }
}

impl Settings {
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "settings file unreadable, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let result = serde_json::to_string_pretty(self)
            .map_err(anyhow::Error::from)
            .and_then(|raw| std::fs::write(path, raw).map_err(anyhow::Error::from));
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "failed to save settings");
        }
    }

    pub fn is_favorite(&self, market: &str) -> bool {
        self.favorite_markets.iter().any(|m| m == market)
    }

    pub fn is_hidden(&self, market: &str) -> bool {
        self.hidden_markets.iter().any(|m| m == market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let mut settings = Settings::default();
        settings.favorite_markets.push("SOL-PERP".to_string());
        settings.max_slippage = 0.01;

        let raw = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let back: Settings = serde_json::from_str(r#"{"default_market":"ETH-PERP"}"#).unwrap();
        assert_eq!(back.default_market, "ETH-PERP");
        assert_eq!(back.max_slippage, Settings::default().max_slippage);
    }

    #[test]
    fn missing_file_is_defaults() {
        let settings = Settings::load_or_default("/definitely/not/here.json");
        assert_eq!(settings, Settings::default());
    }
}
