//! Wire protocol of the terminal backend.
//!
//! Outbound traffic is modelled as [`Request`], inbound as [`Inbound`]; both
//! map to and from the generic [`Envelope`]. Requests carry no id, so each
//! request names the tag its reply arrives under (if any).

use serde::Serialize;
use serde_json::{Value, json};
use sto_core::error::StoError;
use sto_core::types::*;

/// Envelope tags.
pub mod tags {
    pub const SYMBOL_INFO: &str = "symbolInfo";
    pub const ACCOUNT_INFO: &str = "accountInfo";
    pub const GET_POSITIONS: &str = "getPositions";
    pub const POSITIONS: &str = "positions";
    pub const GET_ALL_OPEN_ORDERS: &str = "getAllOpenOrders";
    pub const MARKET_ORDER: &str = "marketOrder";
    pub const STRATEGY: &str = "strategy";
    pub const TP_MODIFY: &str = "tp:modify";
    pub const SL_MODIFY: &str = "sl:modify";
    pub const CANCEL_ALL_ORDERS: &str = "cancelAllOrders";
    pub const CANCEL_ORDER: &str = "cancelOrder";
    pub const CANCEL_ALGO_ORDER: &str = "cancelAlgoOrder";
    pub const STATUS: &str = "status";
    pub const ERROR: &str = "error";
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderPayload {
    pub symbol: String,
    pub side: Side,
    pub usd_amount: f64,
    pub position_side: PositionSide,
}

impl MarketOrderPayload {
    /// BUY opens LONG, SELL opens SHORT.
    pub fn new(symbol: impl Into<String>, side: Side, usd_amount: f64) -> Self {
        Self { symbol: symbol.into(), side, usd_amount, position_side: side.position_side() }
    }
}

/// Move one protective order to a new trigger price.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerModification {
    pub symbol: String,
    pub algo_id: u64,
    pub new_trigger_price: f64,
    pub position_side: PositionSide,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderPayload {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

/// Every request the terminal sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SymbolInfo { symbol: String },
    AccountInfo,
    GetPositions,
    GetAllOpenOrders,
    MarketOrder(MarketOrderPayload),
    Strategy(StagedStrategy),
    ModifyTakeProfit(TriggerModification),
    ModifyStopLoss(TriggerModification),
    CancelAllOrders { symbol: String },
    CancelOrder(CancelOrderPayload),
    CancelAlgoOrder { algo_id: u64 },
}

impl Request {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SymbolInfo { .. } => tags::SYMBOL_INFO,
            Self::AccountInfo => tags::ACCOUNT_INFO,
            Self::GetPositions => tags::GET_POSITIONS,
            Self::GetAllOpenOrders => tags::GET_ALL_OPEN_ORDERS,
            Self::MarketOrder(_) => tags::MARKET_ORDER,
            Self::Strategy(_) => tags::STRATEGY,
            Self::ModifyTakeProfit(_) => tags::TP_MODIFY,
            Self::ModifyStopLoss(_) => tags::SL_MODIFY,
            Self::CancelAllOrders { .. } => tags::CANCEL_ALL_ORDERS,
            Self::CancelOrder(_) => tags::CANCEL_ORDER,
            Self::CancelAlgoOrder { .. } => tags::CANCEL_ALGO_ORDER,
        }
    }

    /// Tag of the reply that completes this request; `None` for
    /// fire-and-forget requests.
    pub fn reply_tag(&self) -> Option<&'static str> {
        match self {
            Self::GetPositions => Some(tags::POSITIONS),
            Self::MarketOrder(_) | Self::ModifyTakeProfit(_) | Self::ModifyStopLoss(_) => None,
            other => Some(other.tag()),
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        let payload = match self {
            Self::SymbolInfo { symbol } => Some(json!({ "symbol": symbol })),
            Self::AccountInfo | Self::GetPositions | Self::GetAllOpenOrders => None,
            Self::MarketOrder(p) => to_value(p),
            Self::Strategy(s) => to_value(s),
            Self::ModifyTakeProfit(m) | Self::ModifyStopLoss(m) => to_value(m),
            Self::CancelAllOrders { symbol } => Some(json!({ "symbol": symbol })),
            Self::CancelOrder(p) => to_value(p),
            Self::CancelAlgoOrder { algo_id } => Some(json!({ "algoId": algo_id })),
        };
        Envelope::request(self.tag(), payload)
    }
}

fn to_value<T: Serialize>(v: &T) -> Option<Value> {
    // Plain structs of strings and numbers always serialize.
    serde_json::to_value(v).ok()
}

/// Deltas that move a live position's protective orders to the staged levels.
///
/// A leg is modified only when its staged price differs from the confirmed
/// trigger; legs without a confirmed order cannot be modified and are skipped.
/// An empty result means nothing changed.
pub fn trigger_modifications(strategy: &StagedStrategy, position: &Position) -> Vec<Request> {
    let mut out = Vec::with_capacity(2);
    let modification = |leg: &AlgoOrder, price: f64| TriggerModification {
        symbol: position.symbol.clone(),
        algo_id: leg.algo_id,
        new_trigger_price: price,
        position_side: strategy.position_side,
    };
    if let Some(tp) = &position.take_profit {
        if tp.trigger_price != strategy.take_profit {
            out.push(Request::ModifyTakeProfit(modification(tp, strategy.take_profit)));
        }
    }
    if let Some(sl) = &position.stop_loss {
        if sl.trigger_price != strategy.stop_loss {
            out.push(Request::ModifyStopLoss(modification(sl, strategy.stop_loss)));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Positions(Vec<Position>),
    SymbolInfo(SymbolInfo),
    AccountInfo(AccountInfo),
    OpenOrders(OpenOrders),
    /// Strategy accepted; the body is informational.
    Strategy(Option<Value>),
    CancelAllOrders,
    CancelOrder,
    CancelAlgoOrder,
    Status(String),
    Error(String),
    /// A tag this client does not act on (still resolves the ledger).
    Unknown(String),
}

impl Inbound {
    pub fn decode(env: &Envelope) -> Result<Self, StoError> {
        let msg = match env.kind.as_str() {
            tags::POSITIONS => Self::Positions(data(env)?),
            tags::SYMBOL_INFO => Self::SymbolInfo(data(env)?),
            tags::ACCOUNT_INFO => Self::AccountInfo(data(env)?),
            tags::GET_ALL_OPEN_ORDERS => Self::OpenOrders(data(env)?),
            tags::STRATEGY => Self::Strategy(env.data.clone()),
            tags::CANCEL_ALL_ORDERS => Self::CancelAllOrders,
            tags::CANCEL_ORDER => Self::CancelOrder,
            tags::CANCEL_ALGO_ORDER => Self::CancelAlgoOrder,
            tags::STATUS => Self::Status(env.data.as_ref().and_then(Value::as_str).unwrap_or_default().to_string()),
            tags::ERROR => Self::Error(
                env.message
                    .clone()
                    .or_else(|| env.data.as_ref().map(Value::to_string))
                    .unwrap_or_else(|| "unspecified error".to_string()),
            ),
            other => Self::Unknown(other.to_string()),
        };
        Ok(msg)
    }
}

fn data<T: serde::de::DeserializeOwned>(env: &Envelope) -> Result<T, StoError> {
    let body = env
        .data
        .as_ref()
        .ok_or_else(|| StoError::Parse(format!("'{}' without data", env.kind)))?;
    T::deserialize(body).map_err(|e| StoError::Parse(format!("'{}' data: {e}", env.kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        serde_json::from_value(json!({
            "symbol": "BTCUSDT", "positionSide": "LONG", "entryPrice": 50000,
            "stopLoss": {"algoId": 11, "orderType": "STOP_MARKET", "triggerPrice": 49000, "positionSide": "LONG"},
            "takeProfit": {"algoId": 12, "orderType": "TAKE_PROFIT_MARKET", "triggerPrice": 53000, "positionSide": "LONG"}
        }))
        .unwrap()
    }

    fn strategy(sl: f64, tp: f64) -> StagedStrategy {
        let mut s = StagedStrategy::empty("BTCUSDT", 1000.0);
        s.entry_price = 50000.0;
        s.stop_loss = sl;
        s.take_profit = tp;
        s
    }

    #[test]
    fn reply_tags() {
        assert_eq!(Request::GetPositions.reply_tag(), Some("positions"));
        assert_eq!(Request::AccountInfo.reply_tag(), Some("accountInfo"));
        assert_eq!(Request::CancelAlgoOrder { algo_id: 1 }.reply_tag(), Some("cancelAlgoOrder"));
        let order = MarketOrderPayload::new("BTCUSDT", Side::Sell, 100.0);
        assert_eq!(Request::MarketOrder(order).reply_tag(), None);
    }

    #[test]
    fn market_order_wire_format() {
        let env = Request::MarketOrder(MarketOrderPayload::new("BTCUSDT", Side::Sell, 250.0)).to_envelope();
        let v: Value = serde_json::from_str(&env.to_json()).unwrap();
        assert_eq!(
            v,
            json!({"type": "marketOrder", "payload": {
                "symbol": "BTCUSDT", "side": "SELL", "usdAmount": 250.0, "positionSide": "SHORT"
            }})
        );
    }

    #[test]
    fn cancel_wire_formats() {
        let env = Request::CancelAllOrders { symbol: "BTCUSDT".into() }.to_envelope();
        assert_eq!(env.payload, Some(json!({"symbol": "BTCUSDT"})));

        let env = Request::CancelOrder(CancelOrderPayload {
            symbol: "BTCUSDT".into(),
            order_id: None,
            client_order_id: Some("web_1".into()),
        })
        .to_envelope();
        assert_eq!(env.payload, Some(json!({"symbol": "BTCUSDT", "clientOrderId": "web_1"})));
    }

    #[test]
    fn modifications_only_for_changed_legs() {
        let p = position();
        assert!(trigger_modifications(&strategy(49000.0, 53000.0), &p).is_empty());

        let reqs = trigger_modifications(&strategy(49500.0, 53000.0), &p);
        assert_eq!(reqs.len(), 1);
        let Request::ModifyStopLoss(m) = &reqs[0] else { panic!("expected sl:modify") };
        assert_eq!(m.algo_id, 11);
        assert_eq!(m.new_trigger_price, 49500.0);
        let v = reqs[0].to_envelope().payload.unwrap();
        assert_eq!(v, json!({"symbol": "BTCUSDT", "algoId": 11, "newTriggerPrice": 49500.0, "positionSide": "LONG"}));

        let reqs = trigger_modifications(&strategy(49500.0, 54000.0), &p);
        assert_eq!(reqs.iter().map(Request::tag).collect::<Vec<_>>(), vec!["tp:modify", "sl:modify"]);
    }

    #[test]
    fn decode_inbound() {
        let env = Envelope::parse(r#"{"type":"error","message":"margin"}"#).unwrap();
        assert_eq!(Inbound::decode(&env).unwrap(), Inbound::Error("margin".into()));

        let env = Envelope::parse(r#"{"type":"positions","data":[]}"#).unwrap();
        assert_eq!(Inbound::decode(&env).unwrap(), Inbound::Positions(vec![]));

        let env = Envelope::parse(r#"{"type":"positions","data":{"bad":1}}"#).unwrap();
        assert!(Inbound::decode(&env).is_err());

        let env = Envelope::parse(r#"{"type":"candles","data":[]}"#).unwrap();
        assert_eq!(Inbound::decode(&env).unwrap(), Inbound::Unknown("candles".into()));
    }
}
