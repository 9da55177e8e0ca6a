//! Risk sizing: turn (deposit, entry, stop) into a position notional that
//! risks a fixed fraction of the deposit.

use sto_core::error::StoError;
use sto_core::types::PositionSide;

/// Default fraction of the deposit risked per trade.
pub const RISK_FRACTION: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSizer {
    pub risk_fraction: f64,
    pub leverage: f64,
}

/// Result of a validated sizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub usd_amount: f64,
    pub position_side: PositionSide,
    /// Distance from entry to stop in percent of entry.
    pub stop_percent: f64,
}

impl Default for RiskSizer {
    fn default() -> Self {
        Self { risk_fraction: RISK_FRACTION, leverage: 1.0 }
    }
}

impl RiskSizer {
    pub fn new(risk_fraction: f64, leverage: u32) -> Self {
        Self { risk_fraction, leverage: leverage.max(1) as f64 }
    }

    /// Position notional for the given levels.
    ///
    /// `floor(budget / stop_fraction)` capped at the deposit, times leverage.
    /// Assumes `entry > 0` and `stop != entry`; use [`checked_size`](Self::checked_size)
    /// for untrusted input.
    pub fn size(&self, deposit: f64, entry: f64, stop: f64) -> f64 {
        let budget = deposit * self.risk_fraction;
        // budget / (|entry - stop| / entry), kept in one division so exact
        // inputs stay exact before the floor.
        let raw = (budget * entry / (entry - stop).abs()).floor();
        raw.min(deposit) * self.leverage
    }

    /// Validate the levels, then size them.
    pub fn checked_size(&self, deposit: f64, entry: f64, stop: f64) -> Result<Sizing, StoError> {
        if !(entry.is_finite() && entry > 0.0) {
            return Err(StoError::InvalidLevels(format!("entry must be > 0, got {entry}")));
        }
        if !(deposit.is_finite() && deposit >= 0.0) {
            return Err(StoError::InvalidLevels(format!("deposit must be >= 0, got {deposit}")));
        }
        let position_side = PositionSide::from_levels(entry, stop)
            .ok_or_else(|| StoError::InvalidLevels(format!("stop {stop} must differ from entry {entry}")))?;
        Ok(Sizing {
            usd_amount: self.size(deposit, entry, stop),
            position_side,
            stop_percent: (entry - stop).abs() / entry * 100.0,
        })
    }
}
