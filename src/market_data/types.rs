use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buy, -1 for sell. Used for sign comparisons against positions.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Spot,
    Perp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
    StopLoss,
    TakeProfit,
    StopLimit,
    TakeProfitLimit,
}

impl OrderKind {
    /// Trigger kinds carry a trigger price and condition.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            OrderKind::StopLoss
                | OrderKind::TakeProfit
                | OrderKind::StopLimit
                | OrderKind::TakeProfitLimit
        )
    }

    /// Kinds whose limit price comes from user input rather than the book.
    pub fn is_limit_priced(&self) -> bool {
        matches!(
            self,
            OrderKind::Limit | OrderKind::StopLimit | OrderKind::TakeProfitLimit
        )
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            OrderKind::Limit => write!(f, "Limit"),
            OrderKind::Market => write!(f, "Market"),
            OrderKind::StopLoss => write!(f, "Stop Loss"),
            OrderKind::TakeProfit => write!(f, "Take Profit"),
            OrderKind::StopLimit => write!(f, "Stop Limit"),
            OrderKind::TakeProfitLimit => write!(f, "Take Profit Limit"),
        }
    }
}

/// Condition under which a trigger order activates, relative to the
/// oracle price crossing the trigger price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerCondition {
    Above,
    Below,
}

/// One price level of an L2 book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}
