//! Client-side engine for a perp/spot margin exchange terminal: session
//! state store, data hydration, order sizing and order submission. The
//! exchange's own margin math and transaction mechanics stay behind the
//! `ExchangeClient` and `MarginEngine` traits.

pub mod config;
pub mod console;
pub mod execution;
pub mod hydration;
pub mod market_data;
pub mod metrics;
pub mod notify;
pub mod settings;
pub mod sizing;
pub mod state;
pub mod util;
