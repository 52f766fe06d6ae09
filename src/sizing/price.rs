//! Order-price resolution: turn an order kind plus the local book into a
//! concrete limit price (and trigger condition) to submit.

use crate::market_data::book::OrderBookSnapshot;
use crate::market_data::types::{OrderKind, Side, TriggerCondition};

/// Volume-weighted price for taking `size` off the opposing side of the
/// book. None when the book lacks depth — callers must abort submission
/// and surface "price unavailable", never a partial-fill price.
pub fn market_price_for_size(book: &OrderBookSnapshot, side: Side, size: f64) -> Option<f64> {
    if size <= 0.0 {
        return None;
    }

    let mut remaining = size;
    let mut notional = 0.0;

    for level in book.opposing_levels(side) {
        let take = remaining.min(level.size);
        notional += take * level.price;
        remaining -= take;
        if remaining <= 0.0 {
            return Some(notional / size);
        }
    }

    None
}

/// Trigger direction implied by side and order kind.
///
/// A stop loss protects an existing position, so it fires when the price
/// moves against it: sell stops fire below, buy stops above. Take profits
/// fire on favorable moves: the mirror image.
pub fn trigger_condition(kind: OrderKind, side: Side) -> Option<TriggerCondition> {
    match (kind, side) {
        (OrderKind::StopLoss | OrderKind::StopLimit, Side::Sell) => Some(TriggerCondition::Below),
        (OrderKind::StopLoss | OrderKind::StopLimit, Side::Buy) => Some(TriggerCondition::Above),
        (OrderKind::TakeProfit | OrderKind::TakeProfitLimit, Side::Sell) => {
            Some(TriggerCondition::Above)
        }
        (OrderKind::TakeProfit | OrderKind::TakeProfitLimit, Side::Buy) => {
            Some(TriggerCondition::Below)
        }
        _ => None,
    }
}

/// A fully resolved price ready for submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOrder {
    pub limit_price: f64,
    pub trigger: Option<(TriggerCondition, f64)>,
}

/// Resolve the price to submit for an order of `kind`.
///
/// Limit-priced kinds pass the user's price through and need no book.
/// Market-style kinds walk the book and pad the weighted price by
/// `max_slippage` so the taker limit still crosses after small book
/// moves. Trigger kinds attach the trigger condition and price.
pub fn resolve_order_price(
    kind: OrderKind,
    side: Side,
    book: Option<&OrderBookSnapshot>,
    limit_price: Option<f64>,
    trigger_price: Option<f64>,
    size: f64,
    max_slippage: f64,
) -> Option<ResolvedOrder> {
    let trigger = if kind.is_trigger() {
        let price = trigger_price.filter(|p| *p > 0.0)?;
        let condition = trigger_condition(kind, side)?;
        Some((condition, price))
    } else {
        None
    };

    let limit_price = if kind.is_limit_priced() {
        limit_price.filter(|p| *p > 0.0)?
    } else {
        let weighted = market_price_for_size(book?, side, size)?;
        match side {
            Side::Buy => weighted * (1.0 + max_slippage),
            Side::Sell => weighted * (1.0 - max_slippage),
        }
    };

    Some(ResolvedOrder {
        limit_price,
        trigger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::BookLevel;

    fn lvl(price: f64, size: f64) -> BookLevel {
        BookLevel { price, size }
    }

    fn book() -> OrderBookSnapshot {
        OrderBookSnapshot {
            market: "BTC-PERP".into(),
            bids: vec![lvl(99.0, 3.0), lvl(98.0, 10.0)],
            asks: vec![lvl(100.0, 2.0), lvl(101.0, 3.0)],
            seq: 1,
            ts_recv_ms: 0,
        }
    }

    #[test]
    fn weighted_buy_across_levels() {
        // 2 @ 100 + 2 @ 101 over size 4 → 100.5
        let price = market_price_for_size(&book(), Side::Buy, 4.0).unwrap();
        assert!((price - 100.5).abs() < 1e-9);
    }

    #[test]
    fn weighted_sell_uses_bids() {
        let price = market_price_for_size(&book(), Side::Sell, 3.0).unwrap();
        assert!((price - 99.0).abs() < 1e-9);
    }

    #[test]
    fn insufficient_depth_is_none() {
        // Total ask depth is 5
        assert_eq!(market_price_for_size(&book(), Side::Buy, 6.0), None);
        assert_eq!(market_price_for_size(&book(), Side::Buy, 0.0), None);
    }

    #[test]
    fn trigger_table() {
        use OrderKind::*;
        use TriggerCondition::*;
        assert_eq!(trigger_condition(StopLoss, Side::Sell), Some(Below));
        assert_eq!(trigger_condition(StopLoss, Side::Buy), Some(Above));
        assert_eq!(trigger_condition(TakeProfit, Side::Sell), Some(Above));
        assert_eq!(trigger_condition(TakeProfit, Side::Buy), Some(Below));
        assert_eq!(trigger_condition(Limit, Side::Buy), None);
        assert_eq!(trigger_condition(Market, Side::Sell), None);
    }

    #[test]
    fn market_order_pads_by_slippage() {
        let resolved =
            resolve_order_price(OrderKind::Market, Side::Buy, Some(&book()), None, None, 2.0, 0.01)
                .unwrap();
        assert!((resolved.limit_price - 101.0).abs() < 1e-9); // 100 * 1.01
        assert_eq!(resolved.trigger, None);
    }

    #[test]
    fn limit_passes_through() {
        let resolved = resolve_order_price(
            OrderKind::Limit,
            Side::Sell,
            None,
            Some(99.5),
            None,
            1.0,
            0.01,
        )
        .unwrap();
        assert_eq!(resolved.limit_price, 99.5);
    }

    #[test]
    fn stop_limit_attaches_trigger() {
        let resolved = resolve_order_price(
            OrderKind::StopLimit,
            Side::Sell,
            Some(&book()),
            Some(95.0),
            Some(96.0),
            1.0,
            0.01,
        )
        .unwrap();
        assert_eq!(resolved.limit_price, 95.0);
        assert_eq!(resolved.trigger, Some((TriggerCondition::Below, 96.0)));
    }

    #[test]
    fn stop_loss_market_without_depth_fails() {
        let thin = OrderBookSnapshot::new("BTC-PERP", 1, 0);
        let resolved = resolve_order_price(
            OrderKind::StopLoss,
            Side::Sell,
            Some(&thin),
            None,
            Some(96.0),
            1.0,
            0.01,
        );
        assert_eq!(resolved, None);
    }

    #[test]
    fn missing_user_price_fails() {
        assert_eq!(
            resolve_order_price(OrderKind::Limit, Side::Buy, None, None, None, 1.0, 0.0),
            None
        );
        assert_eq!(
            resolve_order_price(
                OrderKind::StopLoss,
                Side::Buy,
                Some(&book()),
                None,
                None,
                1.0,
                0.0
            ),
            None
        );
    }
}
