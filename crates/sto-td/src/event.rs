//! Events emitted by the terminal client to downstream consumers (the desk,
//! the runner's console).
//!
//! Consumers subscribe to a [`TerminalEventReceiver`] and react to connection
//! lifecycle and typed state changes. They never observe raw envelopes.

use std::sync::Mutex;

/// A typed change of the account/market state, produced by the store's
/// reducer for one inbound envelope or one local command.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// The position list was replaced. `touches_active` is true when the
    /// active symbol had or now has a position, so the staged strategy must
    /// be reconciled.
    PositionsReplaced { touches_active: bool },

    /// Symbol metadata was replaced; rounding uses the new tick from now on.
    SymbolInfoReplaced,

    /// Deposit changed. `initial` is set for the first balance since start.
    CapacityChanged {
        /// `deposit × leverage`.
        notional: f64,
        initial: bool,
    },

    /// Open orders were replaced (or optimistically trimmed).
    OrdersReplaced,

    /// A cancel was acknowledged; the open-order set must be re-fetched.
    OrdersStale,

    /// A new last-known market price.
    PriceTick(f64),

    /// The backend accepted a staged strategy.
    StrategyAccepted,

    /// Backend status push (`connecting`, `connected`, ...).
    ServerStatus(String),

    /// The backend answered with an `error` envelope.
    ServerError(String),
}

/// A typed event emitted by the terminal client.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalEvent {
    /// The backend socket connected (first time or after a drop).
    Connected,

    /// The backend socket dropped; the session is retrying.
    Disconnected,

    /// The account/market state changed.
    Changed(StateChange),
}

/// Sender half of the terminal event channel.
pub type TerminalEventSender = tokio::sync::mpsc::UnboundedSender<TerminalEvent>;

/// Receiver half of the terminal event channel.
pub type TerminalEventReceiver = tokio::sync::mpsc::UnboundedReceiver<TerminalEvent>;

/// Fan-out of events to any number of subscribers. Closed subscribers are
/// pruned on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<TerminalEventSender>>,
}

impl EventBus {
    pub fn subscribe(&self) -> TerminalEventReceiver {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).push(tx);
        rx
    }

    pub fn publish(&self, event: TerminalEvent) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
