//! Realtime kline feed for the active symbol.
//!
//! A thin adapter over a [`WsSession`] on the exchange's public stream: one
//! kline subscription, each update turned into a [`PriceBar`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use sto_core::config::MarketConfig;
use sto_core::json_util::{parse_f64_field, parse_str_u64};
use sto_core::types::PriceBar;
use sto_core::ws::{WsConnConfig, WsSession};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Session id of the feed in log lines; the terminal backend is session 0.
const FEED_SESSION_ID: usize = 1;

pub struct KlineFeed {
    session: WsSession,
}

impl KlineFeed {
    /// Connect and subscribe. Bars arrive on the returned receiver.
    pub fn start(
        market: &MarketConfig,
        symbol: &str,
        reconnect_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<PriceBar>) {
        let stream = stream_name(symbol, &market.interval);
        let mut ws = WsConnConfig::new(&market.stream_url, reconnect_interval);
        ws.subscribe_msg = Some(json!({ "method": "SUBSCRIBE", "params": [stream], "id": 1 }).to_string());
        ws.id = FEED_SESSION_ID;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = WsSession::new(ws);
        session.start(Arc::new(move |_, text: &str| match parse_kline(text) {
            Some(bar) => {
                let _ = tx.send(bar);
            }
            None => debug!("[feed] skipped: {text}"),
        }));
        info!("[feed] {stream} via {}", market.stream_url);
        (Self { session }, rx)
    }

    pub async fn stop(&mut self) {
        self.session.stop().await;
    }
}

/// `btcusdt@kline_4h`
pub fn stream_name(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{interval}", symbol.to_lowercase())
}

/// Bar from a kline event; `None` for anything else (subscription acks).
pub fn parse_kline(text: &str) -> Option<PriceBar> {
    let v: Value = serde_json::from_str(text).ok()?;
    let k = v.get("k")?;
    Some(PriceBar {
        date: parse_str_u64(k.get("t"))?,
        open: parse_f64_field(k, "o")?,
        high: parse_f64_field(k, "h")?,
        low: parse_f64_field(k, "l")?,
        close: parse_f64_field(k, "c")?,
        volume: parse_f64_field(k, "v").unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kline_event_becomes_bar() {
        let text = r#"{"e":"kline","E":1700000001000,"s":"BTCUSDT","k":{"t":1699990000000,"T":1700004399999,
            "s":"BTCUSDT","i":"4h","o":"50000.10","h":"50600.00","l":"49800.5","c":"50500.00","v":"1234.5","x":false}}"#;
        let bar = parse_kline(text).unwrap();
        assert_eq!(bar.date, 1_699_990_000_000);
        assert_eq!((bar.open, bar.high, bar.low, bar.close), (50_000.1, 50_600.0, 49_800.5, 50_500.0));
        assert_eq!(bar.volume, 1234.5);
        assert!(bar.is_up());
    }

    #[test]
    fn acks_and_garbage_are_skipped() {
        assert_eq!(parse_kline(r#"{"result":null,"id":1}"#), None);
        assert_eq!(parse_kline("not json"), None);
        assert_eq!(parse_kline(r#"{"k":{"t":1,"o":"x","h":"1","l":"1","c":"1"}}"#), None);
    }

    #[test]
    fn stream_name_is_lowercase() {
        assert_eq!(stream_name("BTCUSDT", "4h"), "btcusdt@kline_4h");
    }
}
