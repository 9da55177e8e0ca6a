//! Chart bar type shared by the chart-control interface and the market feed.

use serde::{Deserialize, Serialize};

/// One OHLCV candle. `date` is the bar open time in milliseconds since epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Whether this bar closed above its open.
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }
}
