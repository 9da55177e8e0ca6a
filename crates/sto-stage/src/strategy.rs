//! Strategy helpers: take-profit projection, mirroring a confirmed position,
//! and percent distances for display.

use sto_core::error::StoError;
use sto_core::types::{Position, StagedStrategy};

/// Default take-profit distance as a multiple of the stop distance.
pub const REWARD_RATIO: f64 = 3.0;

/// `entry + (entry - stop) × ratio`: the target on the far side of entry.
pub fn take_profit_for(entry: f64, stop: f64, ratio: f64) -> f64 {
    entry + (entry - stop) * ratio
}

/// Editable mirror of a confirmed position. Missing protective legs read as 0.
pub fn mirror_position(position: &Position) -> StagedStrategy {
    let mut s = StagedStrategy::empty(position.symbol.clone(), position.notional.abs());
    s.set_position_side(position.position_side);
    s.entry_price = position.entry_price;
    s.stop_loss = position.stop_trigger().unwrap_or(0.0);
    s.take_profit = position.take_profit_trigger().unwrap_or(0.0);
    s
}

/// Stop and take-profit distances from entry, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentFromEntry {
    /// Always <= 0.
    pub stop: f64,
    /// Always >= 0.
    pub take_profit: f64,
}

pub fn percents_from_entry(entry: f64, stop: f64, take_profit: f64) -> Result<PercentFromEntry, StoError> {
    if !(entry > 0.0) {
        return Err(StoError::InvalidLevels(format!("entry must be > 0, got {entry}")));
    }
    Ok(PercentFromEntry {
        stop: round2(-((stop - entry) / entry * 100.0).abs()),
        take_profit: round2(((take_profit - entry) / entry * 100.0).abs()),
    })
}

/// Two decimals, halves rounded up.
fn round2(value: f64) -> f64 {
    let r = (value * 100.0 + 0.5).floor() / 100.0;
    if r == 0.0 { 0.0 } else { r }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sto_core::types::{PositionSide, Side};

    use super::*;

    #[test]
    fn take_profit_projection() {
        assert_eq!(take_profit_for(50_000.0, 49_000.0, REWARD_RATIO), 53_000.0);
        assert_eq!(take_profit_for(50_000.0, 51_000.0, REWARD_RATIO), 47_000.0);
        assert_eq!(take_profit_for(100.0, 100.0, REWARD_RATIO), 100.0);
    }

    #[test]
    fn percents() {
        let p = percents_from_entry(50_000.0, 49_000.0, 53_000.0).unwrap();
        assert_eq!(p.stop, -2.0);
        assert_eq!(p.take_profit, 6.0);

        let p = percents_from_entry(3.0, 3.1, 2.5).unwrap();
        assert_eq!(p.stop, -3.33);
        assert_eq!(p.take_profit, 16.67);

        assert_eq!(percents_from_entry(100.0, 100.0, 100.0).unwrap().stop, 0.0);
        assert!(matches!(percents_from_entry(0.0, 1.0, 2.0), Err(StoError::InvalidLevels(_))));
    }

    #[test]
    fn mirror_copies_confirmed_levels() {
        let position: Position = serde_json::from_value(json!({
            "symbol": "BTCUSDT", "positionSide": "SHORT", "entryPrice": 50000, "notional": "-2500",
            "stopLoss": {"algoId": 1, "orderType": "STOP_MARKET", "triggerPrice": 51000}
        }))
        .unwrap();
        let s = mirror_position(&position);
        assert_eq!(s.position_side, PositionSide::Short);
        assert_eq!(s.side, Side::Sell);
        assert_eq!(s.entry_price, 50_000.0);
        assert_eq!(s.stop_loss, 51_000.0);
        assert_eq!(s.take_profit, 0.0);
        assert_eq!(s.usd_amount, 2500.0);
    }
}
