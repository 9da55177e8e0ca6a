//! Terminal client: one backend session, the ledger, and the store.
//!
//! # Architecture
//!
//! ```text
//! TerminalClient (Clone, Arc<Inner>)
//! ├── WsSession            (reconnecting socket, outbound buffer)
//! ├── dispatcher task      (text → Envelope → store + ledger → events)
//! ├── connectivity task    (watch<bool> → Connected / Disconnected)
//! ├── PendingLedger        (one waiter per reply tag)
//! ├── Mutex<AccountStore>  (never held across an await)
//! └── EventBus             (fan-out to subscribers)
//! ```
//!
//! Inbound envelopes are applied to the store before the ledger is resolved,
//! so a caller woken by a reply always reads the updated state. A reply whose
//! payload does not decode fails its waiter with a parse error.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sto_core::config::TerminalConfig;
use sto_core::error::StoError;
use sto_core::types::*;
use sto_core::ws::{PingPayload, SessionHandle, WsConnConfig, WsSession};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::TerminalApi;
use crate::event::{EventBus, StateChange, TerminalEvent, TerminalEventReceiver};
use crate::ledger::PendingLedger;
use crate::protocol::{CancelOrderPayload, Inbound, MarketOrderPayload, Request, trigger_modifications};
use crate::store::{AccountStore, MarketSnapshot, StoreCommand};

/// Handle to the terminal backend. Cheap to clone.
#[derive(Clone)]
pub struct TerminalClient {
    inner: Arc<Inner>,
}

struct Inner {
    session: SessionHandle,
    ledger: PendingLedger,
    store: Mutex<AccountStore>,
    bus: EventBus,
    request_timeout: Option<Duration>,
    runtime: Mutex<Runtime>,
}

#[derive(Default)]
struct Runtime {
    session: Option<WsSession>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl TerminalClient {
    /// Open the backend session and start the background tasks.
    ///
    /// Returns the client and a receiver for [`TerminalEvent`]s. Must be
    /// called inside a tokio runtime.
    pub fn start(config: &TerminalConfig) -> (Self, TerminalEventReceiver) {
        let mut ws_config = WsConnConfig::new(config.session.url.clone(), config.session.reconnect_interval());
        ws_config.extra_headers = config.session.extra_headers.clone();
        ws_config.ping_interval = config.session.ping_interval();
        ws_config.ping_payload = ws_config.ping_interval.map(|_| PingPayload::WebSocketPing);

        let mut session = WsSession::new(ws_config);
        let (text_tx, text_rx) = mpsc::unbounded_channel::<String>();
        session.start(Arc::new(move |_, text: &str| {
            let _ = text_tx.send(text.to_string());
        }));

        let inner = Arc::new(Inner {
            session: session.handle(),
            ledger: PendingLedger::new(config.session.overlap_policy),
            store: Mutex::new(AccountStore::new(config.trading.symbol.clone(), config.trading.leverage)),
            bus: EventBus::default(),
            request_timeout: config.session.request_timeout(),
            runtime: Mutex::new(Runtime::default()),
        });
        let events = inner.bus.subscribe();

        let dispatcher = tokio::spawn(dispatch_loop(Arc::clone(&inner), text_rx));
        let watcher = tokio::spawn(watch_connectivity(Arc::clone(&inner), session.handle().connectivity()));
        {
            let mut rt = inner.runtime();
            rt.session = Some(session);
            rt.tasks.push(dispatcher);
            rt.tasks.push(watcher);
        }

        info!(
            "[terminal] started: url={} symbol={} timeout={:?} overlap={:?}",
            config.session.url,
            config.trading.symbol,
            config.session.request_timeout(),
            config.session.overlap_policy,
        );
        (Self { inner }, events)
    }

    /// Additional event subscription.
    pub fn subscribe(&self) -> TerminalEventReceiver {
        self.inner.bus.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.session.is_connected()
    }

    /// Run a local command against the store and publish its changes.
    pub fn apply_command(&self, cmd: StoreCommand) {
        let changes = self.inner.store().execute(cmd);
        self.inner.publish_changes(changes);
    }

    /// Run `f` against the current store state.
    pub fn with_store<R>(&self, f: impl FnOnce(&AccountStore) -> R) -> R {
        f(&self.inner.store())
    }

    /// Reply tags still awaited.
    pub fn pending_requests(&self) -> Vec<String> {
        self.inner.ledger.pending_tags()
    }

    pub fn is_loading_any(&self) -> bool {
        self.inner.ledger.is_loading_any()
    }

    /// Send `req` and wait for its reply (if it has one).
    async fn request(&self, req: Request) -> Result<Option<Value>, StoError> {
        self.request_then(req, || {}).await
    }

    /// [`request`](Self::request) with a local step that runs only once the
    /// reply waiter is registered, right before the request is sent.
    async fn request_then(&self, req: Request, local: impl FnOnce()) -> Result<Option<Value>, StoError> {
        let inner = &self.inner;
        let Some(reply) = req.reply_tag() else {
            local();
            inner.send(&req)?;
            return Ok(None);
        };
        let ticket = inner.ledger.register(reply)?;
        local();
        if let Err(e) = inner.send(&req) {
            inner.ledger.cancel(&ticket);
            return Err(e);
        }
        inner.ledger.wait(ticket, inner.request_timeout).await
    }

    /// Like [`request`](Self::request), but when the reply is already awaited
    /// the request is re-sent without a second waiter.
    async fn refresh(&self, req: Request) -> Result<(), StoError> {
        match self.request(req.clone()).await {
            Err(StoError::RequestInFlight { op }) => {
                debug!("[terminal] '{op}' already in flight, re-sending only");
                self.inner.send(&req)
            }
            other => other.map(|_| ()),
        }
    }
}

impl Inner {
    fn store(&self) -> MutexGuard<'_, AccountStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn symbol(&self) -> String {
        self.store().symbol().to_string()
    }

    fn send(&self, req: &Request) -> Result<(), StoError> {
        if !self.session.is_connected() {
            debug!("[terminal] '{}' buffered until reconnect", req.tag());
        }
        debug!("[terminal] -> {}", req.tag());
        self.session.send(req.to_envelope().to_json())
    }

    fn publish_changes(&self, changes: Vec<StateChange>) {
        for change in changes {
            self.bus.publish(TerminalEvent::Changed(change));
        }
    }

    /// Apply one inbound text frame. Malformed frames are logged and dropped.
    fn handle_text(&self, text: &str) {
        let env = match Envelope::parse(text) {
            Ok(env) => env,
            Err(e) => {
                warn!("[terminal] dropping frame: {e}");
                return;
            }
        };

        let changes = match Inbound::decode(&env) {
            Ok(msg) => {
                let changes = self.store().apply(&msg);
                self.ledger.resolve(&env.kind, env.data);
                changes
            }
            Err(e) => {
                warn!("[terminal] {e}");
                self.ledger.fail(&env.kind, e);
                Vec::new()
            }
        };

        let stale = changes.contains(&StateChange::OrdersStale);
        self.publish_changes(changes);
        if stale {
            if let Err(e) = self.send(&Request::GetAllOpenOrders) {
                warn!("[terminal] open orders refresh not sent: {e}");
            }
        }
    }
}

async fn dispatch_loop(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        inner.handle_text(&text);
    }
    debug!("[terminal] dispatcher finished");
}

async fn watch_connectivity(inner: Arc<Inner>, mut rx: watch::Receiver<bool>) {
    while rx.changed().await.is_ok() {
        let up = *rx.borrow_and_update();
        if up {
            info!("[terminal] connected");
            inner.bus.publish(TerminalEvent::Connected);
        } else {
            warn!("[terminal] disconnected");
            inner.bus.publish(TerminalEvent::Disconnected);
        }
    }
}

#[async_trait]
impl TerminalApi for TerminalClient {
    fn snapshot(&self) -> MarketSnapshot {
        self.inner.store().snapshot()
    }

    fn is_loading(&self, tags: &[&str]) -> bool {
        self.inner.ledger.has(tags)
    }

    async fn symbol_info(&self) -> Result<SymbolInfo> {
        let symbol = self.inner.symbol();
        self.request(Request::SymbolInfo { symbol }).await?;
        Ok(*self.inner.store().symbol_info())
    }

    async fn account_info(&self) -> Result<f64> {
        self.request(Request::AccountInfo).await?;
        Ok(self.inner.store().deposit())
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        self.request(Request::GetPositions).await?;
        Ok(self.inner.store().positions().to_vec())
    }

    async fn open_orders(&self) -> Result<OpenOrders> {
        self.request(Request::GetAllOpenOrders).await?;
        Ok(self.inner.store().open_orders().clone())
    }

    async fn market_order(&self, side: Side, usd_amount: f64) -> Result<()> {
        if !(usd_amount.is_finite() && usd_amount > 0.0) {
            return Err(StoError::InvalidLevels(format!("usd amount must be > 0, got {usd_amount}")).into());
        }
        let symbol = self.inner.symbol();
        info!("[terminal] market {side} {symbol} ${usd_amount}");
        self.request(Request::MarketOrder(MarketOrderPayload::new(symbol, side, usd_amount))).await?;
        Ok(())
    }

    async fn run_strategy(&self, strategy: &StagedStrategy) -> Result<()> {
        if !(strategy.entry_price > 0.0) {
            return Err(StoError::InvalidLevels(format!("entry must be > 0, got {}", strategy.entry_price)).into());
        }
        if PositionSide::from_levels(strategy.entry_price, strategy.stop_loss) != Some(strategy.position_side) {
            return Err(StoError::InvalidLevels(format!(
                "{} entry {} does not match stop {}",
                strategy.position_side, strategy.entry_price, strategy.stop_loss
            ))
            .into());
        }
        info!(
            "[terminal] strategy {} {} entry={} sl={} tp={} usd={}",
            strategy.symbol,
            strategy.position_side,
            strategy.entry_price,
            strategy.stop_loss,
            strategy.take_profit,
            strategy.usd_amount,
        );
        self.request(Request::Strategy(strategy.clone())).await?;
        Ok(())
    }

    async fn update_strategy(&self, strategy: &StagedStrategy) -> Result<()> {
        let symbol = self.inner.symbol();
        let position = self
            .inner
            .store()
            .current_position(&symbol)
            .cloned()
            .ok_or(StoError::NoPosition { symbol: symbol.clone() })?;

        let modifications = trigger_modifications(strategy, &position);
        if modifications.is_empty() {
            debug!("[terminal] strategy unchanged, re-fetching positions");
            self.refresh(Request::GetPositions).await?;
            return Ok(());
        }
        for req in &modifications {
            info!("[terminal] {} {symbol}", req.tag());
            self.inner.send(req)?;
        }
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<()> {
        let symbol = self.inner.symbol();
        info!("[terminal] cancel all orders {symbol}");
        self.request(Request::CancelAllOrders { symbol }).await?;
        Ok(())
    }

    async fn cancel_order(&self, client_order_id: &str) -> Result<()> {
        let (symbol, order_id) = {
            let store = self.inner.store();
            let order_id = store
                .open_orders()
                .limit_orders
                .iter()
                .find(|o| o.client_order_id == client_order_id)
                .map(|o| o.order_id)
                .filter(|id| *id != 0);
            (store.symbol().to_string(), order_id)
        };
        info!("[terminal] cancel order {client_order_id}");
        let req = Request::CancelOrder(CancelOrderPayload {
            symbol,
            order_id,
            client_order_id: Some(client_order_id.to_string()),
        });
        self.request_then(req, || {
            self.apply_command(StoreCommand::RemoveOrder(OrderKey::Client(client_order_id.to_string())))
        })
        .await?;
        Ok(())
    }

    async fn cancel_algo_order(&self, algo_id: u64) -> Result<()> {
        info!("[terminal] cancel algo order {algo_id}");
        self.request_then(Request::CancelAlgoOrder { algo_id }, || {
            self.apply_command(StoreCommand::RemoveOrder(OrderKey::Algo(algo_id)))
        })
        .await?;
        Ok(())
    }

    async fn bootstrap(&self) -> Result<()> {
        let symbol = self.inner.symbol();
        let (info, account, positions, orders) = tokio::join!(
            self.refresh(Request::SymbolInfo { symbol }),
            self.refresh(Request::AccountInfo),
            self.refresh(Request::GetPositions),
            self.refresh(Request::GetAllOpenOrders),
        );
        info?;
        account?;
        positions?;
        orders?;
        info!("[terminal] bootstrap complete");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let (session, tasks) = {
            let mut rt = self.inner.runtime();
            (rt.session.take(), std::mem::take(&mut rt.tasks))
        };
        if let Some(mut session) = session {
            session.stop().await;
        }
        for task in tasks {
            task.abort();
        }
        info!("[terminal] stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{WebSocketStream, accept_async};

    use super::*;

    struct Backend {
        ws: WebSocketStream<TcpStream>,
    }

    impl Backend {
        async fn recv(&mut self) -> Value {
            loop {
                let msg = tokio::time::timeout(Duration::from_secs(2), self.ws.next())
                    .await
                    .expect("backend recv timed out")
                    .unwrap()
                    .unwrap();
                if let Message::Text(t) = msg {
                    return serde_json::from_str(t.as_str()).unwrap();
                }
            }
        }

        async fn push(&mut self, v: Value) {
            self.ws.send(Message::Text(v.to_string().into())).await.unwrap();
        }

        async fn push_raw(&mut self, s: &str) {
            self.ws.send(Message::Text(s.to_string().into())).await.unwrap();
        }
    }

    async fn setup(timeout_ms: Option<u64>) -> (TerminalClient, TerminalEventReceiver, Backend) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = TerminalConfig::default();
        config.session.url = format!("ws://{}", listener.local_addr().unwrap());
        config.session.reconnect_interval_ms = 50;
        config.session.request_timeout_ms = timeout_ms;
        let (client, events) = TerminalClient::start(&config);
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        (client, events, Backend { ws })
    }

    async fn wait_for_event(rx: &mut TerminalEventReceiver, want: impl Fn(&TerminalEvent) -> bool) -> TerminalEvent {
        loop {
            let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("event timed out")
                .expect("bus closed");
            if want(&ev) {
                return ev;
            }
        }
    }

    async fn wait_loading(client: &TerminalClient, tag: &str) {
        for _ in 0..200 {
            if client.is_loading(&[tag]) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("'{tag}' never registered");
    }

    fn btc_position() -> Value {
        json!({
            "symbol": "BTCUSDT", "positionSide": "LONG", "entryPrice": "50000.4",
            "stopLoss": {"algoId": 11, "orderType": "STOP_MARKET", "triggerPrice": "49000"},
            "takeProfit": {"algoId": 12, "orderType": "TAKE_PROFIT_MARKET", "triggerPrice": "53000"}
        })
    }

    #[tokio::test]
    async fn connected_event_and_positions_round_trip() {
        let (client, mut events, mut backend) = setup(Some(2000)).await;
        wait_for_event(&mut events, |e| *e == TerminalEvent::Connected).await;

        let c = client.clone();
        let call = tokio::spawn(async move { c.positions().await });

        assert_eq!(backend.recv().await, json!({"type": "getPositions"}));
        assert!(client.is_loading(&["positions"]));
        backend.push(json!({"type": "positions", "data": [btc_position()]})).await;

        let positions = call.await.unwrap().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].entry_price, 50000.0);
        assert!(!client.is_loading_any());
        assert!(client.snapshot().position.is_some());

        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn missing_reply_times_out_and_clears_loading() {
        let (client, _events, mut backend) = setup(Some(50)).await;
        let err = client.account_info().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoError>(), Some(StoError::RequestTimeout { op, .. }) if op == "accountInfo"));
        assert_eq!(backend.recv().await, json!({"type": "accountInfo"}));
        assert!(!client.is_loading(&["accountInfo"]));
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn overlapping_request_is_rejected() {
        let (client, _events, mut backend) = setup(Some(2000)).await;
        let c = client.clone();
        let first = tokio::spawn(async move { c.open_orders().await });
        wait_loading(&client, "getAllOpenOrders").await;

        let err = client.open_orders().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoError>(), Some(StoError::RequestInFlight { .. })));

        backend.recv().await;
        backend.push(json!({"type": "getAllOpenOrders", "data": {"algoOrders": [], "limitOrders": [], "all": []}})).await;
        assert!(first.await.unwrap().unwrap().all.is_empty());
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_and_error_frames_do_not_break_the_session() {
        let (client, mut events, mut backend) = setup(Some(2000)).await;
        backend.push_raw("{{ not json").await;
        backend.push(json!({"type": "error", "message": "insufficient margin"})).await;
        backend.push(json!({"type": "positions", "data": [btc_position()]})).await;

        let ev = wait_for_event(&mut events, |e| matches!(e, TerminalEvent::Changed(StateChange::ServerError(_)))).await;
        assert_eq!(ev, TerminalEvent::Changed(StateChange::ServerError("insufficient margin".into())));
        wait_for_event(&mut events, |e| {
            *e == TerminalEvent::Changed(StateChange::PositionsReplaced { touches_active: true })
        })
        .await;
        assert!(client.with_store(|s| s.has_position("BTCUSDT")));
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_reply_fails_the_waiter() {
        let (client, _events, mut backend) = setup(Some(2000)).await;
        backend.push(json!({"type": "positions", "data": [btc_position()]})).await;
        wait_until(|| client.with_store(|s| s.has_position("BTCUSDT"))).await;

        let c = client.clone();
        let call = tokio::spawn(async move { c.positions().await });
        assert_eq!(backend.recv().await, json!({"type": "getPositions"}));
        backend.push(json!({"type": "positions", "data": {"bad": 1}})).await;

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err.downcast_ref::<StoError>(), Some(StoError::Parse(_))));
        assert!(!client.is_loading_any());
        // the previous state is untouched
        assert!(client.with_store(|s| s.has_position("BTCUSDT")));
        client.stop().await.unwrap();
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never held");
    }

    #[tokio::test]
    async fn overlapping_cancel_keeps_the_order() {
        let (client, _events, mut backend) = setup(Some(2000)).await;
        let limit = |id: &str, order_id: u64| {
            json!({"clientOrderId": id, "orderId": order_id, "price": "48000", "origQty": "0.1", "side": "BUY", "symbol": "BTCUSDT"})
        };
        backend
            .push(json!({"type": "getAllOpenOrders", "data": {
                "algoOrders": [],
                "limitOrders": [limit("a", 1), limit("b", 2)],
                "all": [limit("a", 1), limit("b", 2)]
            }}))
            .await;
        wait_until(|| client.with_store(|s| s.open_orders().limit_orders.len() == 2)).await;

        let c = client.clone();
        let first = tokio::spawn(async move { c.cancel_order("a").await });
        assert_eq!(backend.recv().await["type"], "cancelOrder");
        wait_loading(&client, "cancelOrder").await;

        let err = client.cancel_order("b").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoError>(), Some(StoError::RequestInFlight { .. })));
        let left: Vec<String> =
            client.with_store(|s| s.open_orders().limit_orders.iter().map(|o| o.client_order_id.clone()).collect());
        assert_eq!(left, vec!["b".to_string()]);

        backend.push(json!({"type": "cancelOrder", "data": {"ok": true}})).await;
        first.await.unwrap().unwrap();
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn bootstrap_resends_in_flight_tag_without_second_waiter() {
        let (client, _events, mut backend) = setup(Some(2000)).await;
        let held = client.inner.ledger.register("positions").unwrap();

        let c = client.clone();
        let boot = tokio::spawn(async move { c.bootstrap().await });

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(backend.recv().await["type"].as_str().unwrap().to_string());
        }
        seen.sort();
        assert_eq!(seen, vec!["accountInfo", "getAllOpenOrders", "getPositions", "symbolInfo"]);
        assert_eq!(client.pending_requests(), vec!["accountInfo", "getAllOpenOrders", "positions", "symbolInfo"]);

        backend
            .push(json!({"type": "symbolInfo", "data": {"minQty": "0.001", "precision": 2, "stepSize": "0.001", "tickSize": "0.1"}}))
            .await;
        backend.push(json!({"type": "accountInfo", "data": {"availableBalance": "1000.5"}})).await;
        backend.push(json!({"type": "getAllOpenOrders", "data": {"algoOrders": [], "limitOrders": [], "all": []}})).await;
        boot.await.unwrap().unwrap();

        // the re-sent tag is still served by the one waiter registered earlier
        assert_eq!(client.pending_requests(), vec!["positions"]);
        backend.push(json!({"type": "positions", "data": [btc_position()]})).await;
        let data = client.inner.ledger.wait(held, Some(Duration::from_secs(2))).await.unwrap();
        assert!(data.is_some());
        assert!(!client.is_loading_any());
        assert_eq!(client.snapshot().deposit, 1000.0);
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_ack_triggers_open_orders_refresh() {
        let (client, _events, mut backend) = setup(Some(2000)).await;
        backend
            .push(json!({"type": "getAllOpenOrders", "data": {
                "algoOrders": [{"algoId": 7, "orderType": "STOP_MARKET", "triggerPrice": 48000}],
                "limitOrders": [],
                "all": [{"algoId": 7, "orderType": "STOP_MARKET", "triggerPrice": 48000}]
            }}))
            .await;
        for _ in 0..200 {
            if !client.with_store(|s| s.open_orders().all.is_empty()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let c = client.clone();
        let call = tokio::spawn(async move { c.cancel_algo_order(7).await });
        assert_eq!(backend.recv().await, json!({"type": "cancelAlgoOrder", "payload": {"algoId": 7}}));
        // optimistic removal happened before the ack
        assert!(client.with_store(|s| s.open_orders().all.is_empty()));

        backend.push(json!({"type": "cancelAlgoOrder", "data": {"ok": true}})).await;
        call.await.unwrap().unwrap();
        assert_eq!(backend.recv().await, json!({"type": "getAllOpenOrders"}));
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn update_strategy_sends_only_changed_legs() {
        let (client, mut events, mut backend) = setup(Some(2000)).await;

        let mut staged = StagedStrategy::empty("BTCUSDT", 1000.0);
        staged.entry_price = 50000.0;
        staged.stop_loss = 49500.0;
        staged.take_profit = 53000.0;
        let err = client.update_strategy(&staged).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoError>(), Some(StoError::NoPosition { .. })));

        backend.push(json!({"type": "positions", "data": [btc_position()]})).await;
        wait_for_event(&mut events, |e| matches!(e, TerminalEvent::Changed(StateChange::PositionsReplaced { .. }))).await;

        client.update_strategy(&staged).await.unwrap();
        assert_eq!(
            backend.recv().await,
            json!({"type": "sl:modify", "payload": {
                "symbol": "BTCUSDT", "algoId": 11, "newTriggerPrice": 49500.0, "positionSide": "LONG"
            }})
        );
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_strategy_is_rejected_before_sending() {
        let (client, _events, _backend) = setup(Some(2000)).await;
        let mut staged = StagedStrategy::empty("BTCUSDT", 1000.0);
        staged.entry_price = 100.0;
        staged.stop_loss = 100.0;
        let err = client.run_strategy(&staged).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StoError>(), Some(StoError::InvalidLevels(_))));
        assert!(!client.is_loading_any());
        client.stop().await.unwrap();
    }
}
