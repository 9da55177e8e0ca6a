//! Enumerations used throughout the terminal.
//!
//! Wire spellings follow the exchange conventions the backend forwards
//! (`"BUY"`, `"LONG"`, `"STOP_MARKET"`, ...).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Buy or sell side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Position side opened by an order of this side (BUY opens LONG).
    pub fn position_side(self) -> PositionSide {
        match self {
            Self::Buy => PositionSide::Long,
            Self::Sell => PositionSide::Short,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

/// Hedge-mode position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    #[default]
    Long,
    Short,
}

impl PositionSide {
    /// Order side that opens this position side.
    pub fn side(self) -> Side {
        match self {
            Self::Long => Side::Buy,
            Self::Short => Side::Sell,
        }
    }

    /// Direction implied by an entry/stop pair.
    ///
    /// Entry above stop is LONG, below is SHORT. Equal (or non-finite) levels
    /// have no direction and return `None`.
    pub fn from_levels(entry: f64, stop: f64) -> Option<Self> {
        if !entry.is_finite() || !stop.is_finite() {
            return None;
        }
        if entry > stop {
            Some(Self::Long)
        } else if entry < stop {
            Some(Self::Short)
        } else {
            None
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => f.write_str("LONG"),
            Self::Short => f.write_str("SHORT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Order enums
// ---------------------------------------------------------------------------

/// Conditional (algo) order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlgoOrderType {
    StopMarket,
    TakeProfitMarket,
    #[serde(other)]
    Other,
}

/// Order status as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_from_levels() {
        assert_eq!(PositionSide::from_levels(100.0, 95.0), Some(PositionSide::Long));
        assert_eq!(PositionSide::from_levels(100.0, 105.0), Some(PositionSide::Short));
        assert_eq!(PositionSide::from_levels(100.0, 100.0), None);
        assert_eq!(PositionSide::from_levels(f64::NAN, 100.0), None);
        assert_eq!(PositionSide::Long.side(), Side::Buy);
        assert_eq!(Side::Sell.position_side(), PositionSide::Short);
    }

    #[test]
    fn wire_spelling() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&PositionSide::Short).unwrap(), "\"SHORT\"");
        let t: AlgoOrderType = serde_json::from_str("\"TAKE_PROFIT_MARKET\"").unwrap();
        assert_eq!(t, AlgoOrderType::TakeProfitMarket);
        let t: AlgoOrderType = serde_json::from_str("\"TRAILING_STOP_MARKET\"").unwrap();
        assert_eq!(t, AlgoOrderType::Other);
        let s: OrderStatus = serde_json::from_str("\"PARTIALLY_FILLED\"").unwrap();
        assert_eq!(s, OrderStatus::PartiallyFilled);
    }
}
