//! The single order-sizing policy. Every order-entry surface reads its
//! maximum tradable size from here; presentation code carries no sizing
//! math of its own.

pub mod price;

use crate::config::MarketConfig;
use crate::market_data::types::{MarketKind, Side};
use crate::state::snapshots::{AccountSnapshot, CacheSnapshot, GroupSnapshot};

/// Scale-down applied to the engine's raw margin headroom, absorbing fee
/// and rounding drift against the exchange's own computation.
pub const PERP_SAFETY_FACTOR: f64 = 0.99;
pub const SPOT_SAFETY_FACTOR: f64 = 0.95;

/// The exchange SDK's health/leverage primitives, consumed as an opaque
/// boundary. Not reimplemented here.
pub trait MarginEngine: Send + Sync {
    /// Quote-denominated headroom for adding exposure on `side` in
    /// `market`, given current collateral and positions.
    fn margin_available(
        &self,
        account: &AccountSnapshot,
        group: &GroupSnapshot,
        cache: &CacheSnapshot,
        market: &MarketConfig,
        side: Side,
    ) -> f64;

    /// Collateral sufficiency ratio, for display.
    fn health_ratio(
        &self,
        account: &AccountSnapshot,
        group: &GroupSnapshot,
        cache: &CacheSnapshot,
    ) -> f64;

    /// Notional / equity, for display.
    fn leverage(
        &self,
        account: &AccountSnapshot,
        group: &GroupSnapshot,
        cache: &CacheSnapshot,
    ) -> f64;
}

/// Result of a max-size estimation. `max` is the base-asset ceiling; zero
/// means "trading disabled", never a computed limit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeEstimate {
    pub max: f64,
    pub deposits: f64,
    pub borrows: f64,
}

/// Leverage strategy chosen by comparing the requested side against the
/// current position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizingPath {
    /// Same direction (or flat): new exposure only.
    Extend,
    /// Flips the position: the closing leg consumes no headroom and
    /// releases the margin backing it.
    Cross,
}

fn sizing_path(base_position: f64, side: Side) -> SizingPath {
    if base_position == 0.0 || base_position.signum() == side.sign() {
        SizingPath::Extend
    } else {
        SizingPath::Cross
    }
}

/// Maximum tradable base size for the requested side at `price`.
///
/// Absent account/group/cache/market state, or a non-positive price,
/// yields an all-zero estimate. Results are only as fresh as the price
/// cache behind `engine` — two calls with identical inputs can differ
/// across a cache refresh.
pub fn estimate_max_size(
    engine: &dyn MarginEngine,
    account: Option<&AccountSnapshot>,
    group: Option<&GroupSnapshot>,
    cache: Option<&CacheSnapshot>,
    market: Option<&MarketConfig>,
    side: Side,
    price: f64,
) -> SizeEstimate {
    let (Some(account), Some(group), Some(cache), Some(market)) = (account, group, cache, market)
    else {
        return SizeEstimate::default();
    };
    if price <= 0.0 {
        return SizeEstimate::default();
    }

    let mut raw = engine.margin_available(account, group, cache, market, side);

    if market.kind == MarketKind::Perp {
        let position = account.perp_base_position(&market.name);
        if sizing_path(position, side) == SizingPath::Cross {
            // Closing |position| costs no new margin and frees what was
            // backing it, so the crossing budget gains both.
            raw += 2.0 * position.abs() * price;
        }
    }

    let (deposits, borrows) = match market.kind {
        MarketKind::Spot => (
            account.token_deposits(&market.base_symbol),
            account.token_borrows(&market.base_symbol),
        ),
        MarketKind::Perp => (0.0, 0.0),
    };

    // Exhausted headroom disables trading but the balances are still real.
    if raw <= 0.0 {
        return SizeEstimate {
            max: 0.0,
            deposits,
            borrows,
        };
    }

    let factor = match market.kind {
        MarketKind::Perp => PERP_SAFETY_FACTOR,
        MarketKind::Spot => SPOT_SAFETY_FACTOR,
    };

    SizeEstimate {
        max: raw * factor / price,
        deposits,
        borrows,
    }
}
