//! Trading-related data structures: positions, orders, account and the staged
//! strategy.
//!
//! Inbound structs deserialize from the backend's camelCase JSON and accept
//! numeric fields as either strings or numbers. Outbound structs serialize
//! back to camelCase.

use serde::{Deserialize, Serialize};

use super::enums::{AlgoOrderType, OrderStatus, PositionSide, Side};
use super::symbol::round_to_tick;
use crate::json_util::{de_f64, de_u64};

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// A conditional stop-loss / take-profit order. Identity key: `algo_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgoOrder {
    #[serde(deserialize_with = "de_u64")]
    pub algo_id: u64,
    pub order_type: AlgoOrderType,
    #[serde(deserialize_with = "de_f64")]
    pub trigger_price: f64,
    #[serde(default)]
    pub position_side: PositionSide,
    #[serde(default, deserialize_with = "de_f64")]
    pub quantity: f64,
    #[serde(default, alias = "algoStatus")]
    pub status: OrderStatus,
    #[serde(default)]
    pub symbol: String,
}

/// A resting limit entry order. Identity key: `client_order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrder {
    pub client_order_id: String,
    #[serde(default, deserialize_with = "de_u64")]
    pub order_id: u64,
    #[serde(deserialize_with = "de_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub orig_qty: f64,
    pub side: Side,
    #[serde(default)]
    pub position_side: PositionSide,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub symbol: String,
}

/// One entry of the merged "all open orders" view.
///
/// Algo orders are recognised by their `algoId`; anything else carrying a
/// `clientOrderId` is a limit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenOrder {
    Algo(AlgoOrder),
    Limit(LimitOrder),
}

impl OpenOrder {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Algo(o) => &o.symbol,
            Self::Limit(o) => &o.symbol,
        }
    }

    /// Whether this order is identified by `key` (a clientOrderId or an algoId).
    pub fn matches(&self, key: &OrderKey) -> bool {
        match (self, key) {
            (Self::Algo(o), OrderKey::Algo(id)) => o.algo_id == *id,
            (Self::Limit(o), OrderKey::Client(id)) => o.client_order_id == *id,
            _ => false,
        }
    }
}

/// Identity of an open order, used for cancellation and optimistic removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderKey {
    Client(String),
    Algo(u64),
}

impl OrderKey {
    /// Interpret a user-supplied identifier: all-digit strings are algo ids.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(id) => Self::Algo(id),
            Err(_) => Self::Client(raw.to_string()),
        }
    }
}

/// Payload of a `getAllOpenOrders` reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrders {
    #[serde(default)]
    pub algo_orders: Vec<AlgoOrder>,
    #[serde(default)]
    pub limit_orders: Vec<LimitOrder>,
    #[serde(default)]
    pub all: Vec<OpenOrder>,
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// An exchange-reported open position with its attached protective orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub position_side: PositionSide,
    #[serde(deserialize_with = "de_f64")]
    pub entry_price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub break_even_price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub mark_price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub liquidation_price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub notional: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub initial_margin: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub unrealized_profit: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub position_amt: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub leverage: f64,
    #[serde(default)]
    pub isolated: bool,
    #[serde(default, deserialize_with = "de_u64")]
    pub update_time: u64,
    #[serde(default)]
    pub stop_loss: Option<AlgoOrder>,
    #[serde(default)]
    pub take_profit: Option<AlgoOrder>,
}

impl Position {
    /// Round every price/amount field to `tick`.
    ///
    /// Top-level fields and the nested stop/take-profit trigger prices are
    /// rounded independently; the backend reports them with different
    /// precision. Quantities and leverage are not prices and stay untouched.
    pub fn round_to_tick(&mut self, tick: f64) {
        for field in [
            &mut self.entry_price,
            &mut self.break_even_price,
            &mut self.mark_price,
            &mut self.liquidation_price,
            &mut self.notional,
            &mut self.initial_margin,
            &mut self.unrealized_profit,
        ] {
            *field = round_to_tick(*field, tick);
        }
        for leg in [self.stop_loss.as_mut(), self.take_profit.as_mut()].into_iter().flatten() {
            leg.trigger_price = round_to_tick(leg.trigger_price, tick);
        }
    }

    /// Confirmed stop-loss trigger, if a stop order is attached.
    pub fn stop_trigger(&self) -> Option<f64> {
        self.stop_loss.as_ref().map(|o| o.trigger_price)
    }

    /// Confirmed take-profit trigger, if a take-profit order is attached.
    pub fn take_profit_trigger(&self) -> Option<f64> {
        self.take_profit.as_ref().map(|o| o.trigger_price)
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Payload of an `accountInfo` reply. Only the fields the terminal uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default, deserialize_with = "de_f64")]
    pub available_balance: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub total_wallet_balance: f64,
}

impl AccountInfo {
    /// Available balance truncated to whole units.
    pub fn deposit(&self) -> f64 {
        if self.available_balance.is_finite() { self.available_balance.trunc() } else { 0.0 }
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// The trader's order plan: either a draft sketched on the chart or an
/// editable mirror of a confirmed position's protective orders.
///
/// `side` always follows `position_side` (LONG buys, SHORT sells).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedStrategy {
    pub symbol: String,
    pub side: Side,
    pub position_side: PositionSide,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub usd_amount: f64,
}

impl StagedStrategy {
    /// Empty plan for `symbol` sized to `usd_amount`.
    pub fn empty(symbol: impl Into<String>, usd_amount: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Buy,
            position_side: PositionSide::Long,
            entry_price: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            usd_amount,
        }
    }

    /// Set the position side and the derived order side together.
    pub fn set_position_side(&mut self, position_side: PositionSide) {
        self.position_side = position_side;
        self.side = position_side.side();
    }
}

/// The plan already resting on the exchange (limit entry + algo legs) but not
/// yet filled into a position. Zero means "leg absent".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UnrealizedStrategy {
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
    pub position_side: PositionSide,
    pub is_full: bool,
}

impl UnrealizedStrategy {
    /// Project the merged open-order list onto entry/stop/take-profit legs.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a OpenOrder>) -> Self {
        let mut result = Self::default();
        for order in orders {
            match order {
                OpenOrder::Algo(o) => match o.order_type {
                    AlgoOrderType::TakeProfitMarket => result.tp = o.trigger_price,
                    AlgoOrderType::StopMarket => result.sl = o.trigger_price,
                    AlgoOrderType::Other => {}
                },
                OpenOrder::Limit(o) => {
                    result.entry = o.price;
                    result.position_side = o.position_side;
                }
            }
        }
        result.is_full = result.entry != 0.0 && result.sl != 0.0 && result.tp != 0.0;
        result
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn position_json() -> serde_json::Value {
        json!({
            "symbol": "BTCUSDT",
            "positionSide": "LONG",
            "entryPrice": "50012.345",
            "notional": "1000.04",
            "leverage": "10",
            "unrealizedProfit": "-1.234",
            "positionAmt": "0.02",
            "updateTime": 1700000000000u64,
            "stopLoss": {"algoId": 11, "orderType": "STOP_MARKET", "triggerPrice": "49000.06",
                         "positionSide": "LONG", "quantity": "0.02", "algoStatus": "NEW"},
            "takeProfit": {"algoId": "12", "orderType": "TAKE_PROFIT_MARKET", "triggerPrice": 53000.04,
                           "positionSide": "LONG", "quantity": "0.02"}
        })
    }

    #[test]
    fn position_rounding_covers_nested_triggers() {
        let mut p: Position = serde_json::from_value(position_json()).unwrap();
        p.round_to_tick(0.1);
        assert_eq!(p.entry_price, 50012.3);
        assert_eq!(p.notional, 1000.0);
        assert_eq!(p.unrealized_profit, -1.2);
        assert_eq!(p.stop_trigger(), Some(49000.1));
        assert_eq!(p.take_profit_trigger(), Some(53000.0));
        assert_eq!(p.take_profit.as_ref().unwrap().algo_id, 12);
        // quantities are not prices
        assert_eq!(p.position_amt, 0.02);
        assert_eq!(p.stop_loss.as_ref().unwrap().quantity, 0.02);
    }

    #[test]
    fn position_without_protective_orders() {
        let p: Position = serde_json::from_value(json!({
            "symbol": "ETHUSDT", "positionSide": "SHORT", "entryPrice": 3000,
            "stopLoss": null
        }))
        .unwrap();
        assert_eq!(p.stop_trigger(), None);
        assert_eq!(p.take_profit_trigger(), None);
    }

    #[test]
    fn merged_orders_deserialize_by_shape() {
        let orders: OpenOrders = serde_json::from_value(json!({
            "algoOrders": [],
            "limitOrders": [],
            "all": [
                {"clientOrderId": "abc", "price": "49500", "origQty": "0.01", "side": "BUY",
                 "positionSide": "LONG", "status": "NEW", "type": "LIMIT", "symbol": "BTCUSDT"},
                {"algoId": 7, "orderType": "STOP_MARKET", "triggerPrice": "48000",
                 "positionSide": "LONG", "quantity": "0.01", "symbol": "BTCUSDT"},
                {"algoId": 8, "orderType": "TAKE_PROFIT_MARKET", "triggerPrice": "54000",
                 "positionSide": "LONG", "quantity": "0.01", "symbol": "BTCUSDT"}
            ]
        }))
        .unwrap();
        assert!(matches!(orders.all[0], OpenOrder::Limit(_)));
        assert!(matches!(orders.all[1], OpenOrder::Algo(_)));
        assert!(orders.all[1].matches(&OrderKey::Algo(7)));
        assert!(orders.all[0].matches(&OrderKey::Client("abc".into())));

        let u = UnrealizedStrategy::from_orders(&orders.all);
        assert_eq!(u.entry, 49500.0);
        assert_eq!(u.sl, 48000.0);
        assert_eq!(u.tp, 54000.0);
        assert!(u.is_full);

        let partial = UnrealizedStrategy::from_orders(&orders.all[..2]);
        assert!(!partial.is_full);
    }

    #[test]
    fn account_deposit_truncates() {
        let info: AccountInfo =
            serde_json::from_value(json!({"availableBalance": "1234.99"})).unwrap();
        assert_eq!(info.deposit(), 1234.0);
    }

    #[test]
    fn order_key_parsing() {
        assert_eq!(OrderKey::parse("123"), OrderKey::Algo(123));
        assert_eq!(OrderKey::parse("web_abc"), OrderKey::Client("web_abc".into()));
    }
}
