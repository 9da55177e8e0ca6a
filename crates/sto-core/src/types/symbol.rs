//! Symbol metadata and tick-size rounding.
//!
//! [`SymbolInfo`] is the numeric contract for the active trading pair. It is
//! replaced wholesale whenever the backend answers a `symbolInfo` request, and
//! every price that enters the state store goes through [`round_to_tick`]
//! with the tick size in force at that moment.

use serde::{Deserialize, Serialize};

use crate::json_util::de_f64;

/// Rounding/formatting contract for one trading pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    /// Minimum order quantity.
    #[serde(deserialize_with = "de_f64")]
    pub min_qty: f64,
    /// Display precision (decimal places) for USD amounts.
    #[serde(default)]
    pub precision: u32,
    /// Quantity increment.
    #[serde(deserialize_with = "de_f64")]
    pub step_size: f64,
    /// Price increment.
    #[serde(deserialize_with = "de_f64")]
    pub tick_size: f64,
}

impl Default for SymbolInfo {
    /// Placeholder used until the first `symbolInfo` reply arrives.
    fn default() -> Self {
        Self { min_qty: 100.0, precision: 1, step_size: 0.1, tick_size: 1.0 }
    }
}

impl SymbolInfo {
    /// Round a price to this symbol's tick size.
    #[inline]
    pub fn round_price(&self, price: f64) -> f64 {
        round_to_tick(price, self.tick_size)
    }

    /// Format a USD amount with the symbol's display precision.
    pub fn format_usd(&self, amount: f64) -> String {
        format!("{amount:.prec$}", prec = self.precision as usize)
    }
}

/// Beyond this many ticks a value is already finer than f64 can snap reliably.
const MAX_EXACT_STEPS: f64 = (1u64 << 40) as f64;

/// Number of decimal places needed to represent multiples of `tick`.
///
/// `0.01` → 2, `0.5` → 1, `1.0` → 0. Capped at 12.
pub fn tick_decimals(tick: f64) -> u32 {
    if !tick.is_finite() || tick <= 0.0 {
        return 0;
    }
    let mut decimals = 0;
    let mut scaled = tick;
    while decimals < 12 && (scaled - scaled.round()).abs() > 1e-9 * scaled.abs().max(1.0) {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}

/// Round `value` to the nearest multiple of `tick`.
///
/// The result is snapped to the tick's decimal count so that binary noise
/// (`0.30000000000000004`) does not leak into stored prices. Rounding is
/// idempotent: applying it twice yields the same value. A non-positive or
/// non-finite tick, a non-finite value, or a value too large to scale is
/// returned unchanged.
pub fn round_to_tick(value: f64, tick: f64) -> f64 {
    if !value.is_finite() || !tick.is_finite() || tick <= 0.0 {
        return value;
    }
    let steps = (value / tick).round();
    if !steps.is_finite() || steps.abs() > MAX_EXACT_STEPS {
        return value;
    }
    let snapped = steps * tick;
    let scale = 10f64.powi(tick_decimals(tick) as i32);
    let cleaned = (snapped * scale).round() / scale;
    if cleaned.is_finite() { cleaned } else { snapped }
}
