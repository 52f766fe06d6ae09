//! Ephemeral order-entry state. Lives only in the store; reset on market
//! change, never persisted.

use crate::market_data::types::{OrderKind, Side};

#[derive(Debug, Clone, PartialEq)]
pub struct TradeForm {
    pub side: Side,
    pub kind: OrderKind,
    pub price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub base_size: Option<f64>,
    pub quote_size: Option<f64>,
    pub post_only: bool,
    pub ioc: bool,
    pub reduce_only: bool,
}

impl Default for TradeForm {
    fn default() -> Self {
        Self {
            side: Side::Buy,
            kind: OrderKind::Limit,
            price: None,
            trigger_price: None,
            base_size: None,
            quote_size: None,
            post_only: false,
            ioc: false,
            reduce_only: false,
        }
    }
}

impl TradeForm {
    /// Clear user input when the selected market changes. Side and order
    /// kind survive the switch; prices and sizes do not.
    pub fn reset_for_market(&mut self) {
        let side = self.side;
        let kind = self.kind;
        *self = TradeForm::default();
        self.side = side;
        self.kind = kind;
    }

    pub fn set_base_size(&mut self, size: Option<f64>, reference_price: Option<f64>) {
        self.base_size = size;
        self.quote_size = match (size, reference_price) {
            (Some(s), Some(p)) if p > 0.0 => Some(s * p),
            _ => None,
        };
    }

    pub fn set_quote_size(&mut self, size: Option<f64>, reference_price: Option<f64>) {
        self.quote_size = size;
        self.base_size = match (size, reference_price) {
            (Some(s), Some(p)) if p > 0.0 => Some(s / p),
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_side_and_kind() {
        let mut form = TradeForm {
            side: Side::Sell,
            kind: OrderKind::StopLimit,
            price: Some(100.0),
            trigger_price: Some(95.0),
            base_size: Some(2.0),
            quote_size: Some(200.0),
            post_only: true,
            ioc: false,
            reduce_only: true,
        };
        form.reset_for_market();

        assert_eq!(form.side, Side::Sell);
        assert_eq!(form.kind, OrderKind::StopLimit);
        assert_eq!(form.price, None);
        assert_eq!(form.base_size, None);
        assert!(!form.post_only);
        assert!(!form.reduce_only);
    }

    #[test]
    fn size_fields_stay_linked() {
        let mut form = TradeForm::default();
        form.set_base_size(Some(2.0), Some(50.0));
        assert_eq!(form.quote_size, Some(100.0));

        form.set_quote_size(Some(25.0), Some(50.0));
        assert_eq!(form.base_size, Some(0.5));

        // No reference price: the paired field cannot be derived
        form.set_base_size(Some(1.0), None);
        assert_eq!(form.quote_size, None);
    }
}
