//! Single WebSocket session with auto-reconnect and outbound buffering.
//!
//! Each `WsSession` runs as a tokio task that:
//! 1. Connects to the configured endpoint.
//! 2. Sends the optional subscription message, then flushes every outbound
//!    message queued while disconnected, in arrival order.
//! 3. Reads text frames and forwards them to a callback.
//! 4. Sends periodic ping messages when configured.
//! 5. Reconnects after a fixed interval on any drop, until stopped.
//!
//! `send` never drops a message: while the socket is down messages wait in
//! the queue and go out on the next connection. Delivery is in order within
//! one connection; a message whose write fails is re-queued at the front.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::{debug, error, info, warn};

use crate::error::StoError;

/// Callback invoked for each received text message.
///
/// Parameters: `(session_id, message_text)`
pub type OnMessageCallback = Arc<dyn Fn(usize, &str) + Send + Sync>;

/// Ping payload format.
#[derive(Debug, Clone)]
pub enum PingPayload {
    /// Send a text frame (e.g. `"ping"`).
    Text(String),
    /// Send a JSON object as text.
    Json(serde_json::Value),
    /// Use the standard WebSocket ping frame.
    WebSocketPing,
}

/// Configuration for a single WebSocket session.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL (e.g. `ws://localhost:3001`).
    pub url: String,
    /// Message sent immediately after every (re)connect, before the queue flush.
    pub subscribe_msg: Option<String>,
    /// Extra HTTP headers for the handshake.
    pub extra_headers: HashMap<String, String>,
    /// Constant delay between a drop (or failed attempt) and the next attempt.
    pub reconnect_interval: Duration,
    /// Interval between ping messages.
    pub ping_interval: Option<Duration>,
    /// Ping message format.
    pub ping_payload: Option<PingPayload>,
    /// Session identifier, used in log lines and passed to the callback.
    pub id: usize,
}

impl WsConnConfig {
    /// Config with no subscription, headers, or ping.
    pub fn new(url: impl Into<String>, reconnect_interval: Duration) -> Self {
        Self {
            url: url.into(),
            subscribe_msg: None,
            extra_headers: HashMap::new(),
            reconnect_interval,
            ping_interval: None,
            ping_payload: None,
            id: 0,
        }
    }
}

/// Cloneable sending side of a session plus its connectivity signal.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    outbound_tx: mpsc::UnboundedSender<String>,
    connected_rx: watch::Receiver<bool>,
}

impl SessionHandle {
    /// Queue a text message. It goes out now if connected, otherwise on the
    /// next connection.
    pub fn send(&self, msg: String) -> Result<(), StoError> {
        self.outbound_tx
            .send(msg)
            .map_err(|_| StoError::WebSocket("session stopped".into()))
    }

    /// Current connectivity.
    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Watch channel that flips on every connect / disconnect.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }
}

/// A WebSocket session managed by a background tokio task.
pub struct WsSession {
    /// Session configuration.
    pub config: WsConnConfig,
    /// Sending side shared with callers.
    handle: SessionHandle,
    /// Receiving side of the outbound queue, moved into the task on start.
    outbound_rx: Option<mpsc::UnboundedReceiver<String>>,
    /// Connectivity publisher, moved into the task on start.
    connected_tx: Option<watch::Sender<bool>>,
    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Task join handle.
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsSession {
    /// Create a new (not yet started) session. Messages sent through its
    /// handle before `start` are queued.
    pub fn new(config: WsConnConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = watch::channel(false);
        Self {
            config,
            handle: SessionHandle { outbound_tx, connected_rx },
            outbound_rx: Some(outbound_rx),
            connected_tx: Some(connected_tx),
            shutdown_tx: None,
            task: None,
        }
    }

    /// Sending handle; clone freely.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Start the session task. Text frames are forwarded to `on_text`.
    ///
    /// Calling `start` twice is a no-op.
    pub fn start(&mut self, on_text: OnMessageCallback) {
        let (Some(outbound_rx), Some(connected_tx)) =
            (self.outbound_rx.take(), self.connected_tx.take())
        else {
            warn!("[session-{}] already started", self.config.id);
            return;
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            session_loop(config, on_text, outbound_rx, connected_tx, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Send a text message on this session.
    pub fn send(&self, msg: String) -> Result<(), StoError> {
        self.handle.send(msg)
    }

    /// Current connectivity.
    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    /// Stop the session and wait for the task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Why the inner read/write loop ended.
enum LoopExit {
    Shutdown,
    Dropped,
}

/// Main session loop: connect, flush, read/write, reconnect.
async fn session_loop(
    config: WsConnConfig,
    on_text: OnMessageCallback,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    connected_tx: watch::Sender<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let id = config.id;
    let mut pending: VecDeque<String> = VecDeque::new();

    loop {
        if *shutdown_rx.borrow() {
            info!("[session-{id}] shutdown requested");
            return;
        }

        info!("[session-{id}] connecting to {}", config.url);

        let attempt = tokio::select! {
            res = connect_ws(&config) => res,
            _ = shutdown_rx.changed() => return,
        };

        match attempt {
            Ok(ws_stream) => {
                info!("[session-{id}] connected");
                let _ = connected_tx.send(true);
                let exit = run_connection(
                    &config,
                    ws_stream,
                    &on_text,
                    &mut outbound_rx,
                    &mut pending,
                    &mut shutdown_rx,
                )
                .await;
                let _ = connected_tx.send(false);
                if matches!(exit, LoopExit::Shutdown) {
                    return;
                }
                warn!(
                    "[session-{id}] disconnected, {} message(s) buffered, reconnecting in {:?}",
                    pending.len(),
                    config.reconnect_interval
                );
            }
            Err(e) => {
                error!(
                    "[session-{id}] connection failed: {e}, retrying in {:?}",
                    config.reconnect_interval
                );
            }
        }

        // Wait out the constant backoff while still accepting outbound messages.
        let sleep = tokio::time::sleep(config.reconnect_interval);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                _ = shutdown_rx.changed() => return,
                Some(msg) = outbound_rx.recv() => pending.push_back(msg),
            }
        }
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Drive one established connection until it drops or shutdown is signalled.
async fn run_connection(
    config: &WsConnConfig,
    ws_stream: WsStream,
    on_text: &OnMessageCallback,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    pending: &mut VecDeque<String>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> LoopExit {
    let id = config.id;
    let (mut ws_write, mut ws_read) = ws_stream.split();

    if let Some(ref sub_msg) = config.subscribe_msg {
        debug!("[session-{id}] subscribing: {sub_msg}");
        if let Err(e) = ws_write.send(Message::Text(sub_msg.clone().into())).await {
            error!("[session-{id}] subscribe send failed: {e}");
            return LoopExit::Dropped;
        }
    }

    // Flush everything queued while we were away, oldest first.
    if !pending.is_empty() {
        info!("[session-{id}] flushing {} buffered message(s)", pending.len());
    }
    while let Some(msg) = pending.pop_front() {
        if let Err(e) = ws_write.send(Message::Text(msg.clone().into())).await {
            error!("[session-{id}] flush send error: {e}");
            pending.push_front(msg);
            return LoopExit::Dropped;
        }
    }

    let mut ping_interval = config.ping_interval.map(|every| {
        tokio::time::interval_at(tokio::time::Instant::now() + every, every)
    });

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!("[session-{id}] shutdown signal received");
                let _ = ws_write.close().await;
                return LoopExit::Shutdown;
            }

            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => on_text(id, text.as_str()),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        warn!("[session-{id}] received close frame");
                        return LoopExit::Dropped;
                    }
                    Some(Err(e)) => {
                        error!("[session-{id}] read error: {e}");
                        return LoopExit::Dropped;
                    }
                    None => {
                        warn!("[session-{id}] stream ended");
                        return LoopExit::Dropped;
                    }
                    _ => {} // Binary, Pong, Frame
                }
            }

            Some(msg) = outbound_rx.recv() => {
                if let Err(e) = ws_write.send(Message::Text(msg.clone().into())).await {
                    error!("[session-{id}] send error: {e}");
                    pending.push_front(msg);
                    return LoopExit::Dropped;
                }
            }

            _ = next_ping(ping_interval.as_mut()) => {
                let ping_msg = match &config.ping_payload {
                    Some(PingPayload::Text(t)) => Message::Text(t.clone().into()),
                    Some(PingPayload::Json(j)) => Message::Text(j.to_string().into()),
                    Some(PingPayload::WebSocketPing) | None => Message::Ping(Vec::new().into()),
                };
                if let Err(e) = ws_write.send(ping_msg).await {
                    error!("[session-{id}] ping send error: {e}");
                    return LoopExit::Dropped;
                }
            }
        }
    }
}

/// Establish a WebSocket connection (plain or TLS, by URL scheme).
async fn connect_ws(config: &WsConnConfig) -> anyhow::Result<WsStream> {
    let mut request = config.url.as_str().into_client_request()?;
    for (key, value) in &config.extra_headers {
        request
            .headers_mut()
            .insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(value)?);
    }
    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

/// Resolves on the next ping tick; never resolves when pinging is off.
async fn next_ping(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
