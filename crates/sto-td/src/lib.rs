//! # sto-td
//!
//! Terminal backend access: the request/response protocol over the session
//! socket, the pending-request ledger, and the account/market store.
//!
//! [`TerminalClient`] implements the [`TerminalApi`] trait, which is what the
//! staging desk talks to. The lifecycle is: `TerminalClient::start(config)` →
//! `bootstrap()` on every connect → trading operations → `stop()`.
//!
//! ## Data flow
//!
//! ```text
//! socket text ─► Envelope ─► Inbound ─► AccountStore::apply ─► StateChange ─► EventBus
//!                               └──────► PendingLedger::resolve(tag, data)
//! ```

pub mod client;
pub mod event;
pub mod ledger;
pub mod protocol;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;
use sto_core::types::*;

pub use client::TerminalClient;
pub use event::{StateChange, TerminalEvent, TerminalEventReceiver};
pub use store::{AccountStore, MarketSnapshot, StoreCommand};

/// Operations of the terminal backend.
///
/// All methods take `&self` so the desk, the console, and background tasks
/// can share one client.
#[async_trait]
pub trait TerminalApi: Send + Sync {
    /// Current market/account view of the active symbol.
    fn snapshot(&self) -> MarketSnapshot;

    /// Whether any of the given reply tags is still awaited.
    fn is_loading(&self, tags: &[&str]) -> bool;

    /// Fetch symbol metadata for the active symbol.
    async fn symbol_info(&self) -> Result<SymbolInfo>;

    /// Fetch the balance; returns the truncated deposit.
    async fn account_info(&self) -> Result<f64>;

    /// Fetch all open positions (every symbol).
    async fn positions(&self) -> Result<Vec<Position>>;

    /// Fetch all open limit and algo orders.
    async fn open_orders(&self) -> Result<OpenOrders>;

    /// Market order for `usd_amount`; BUY opens LONG, SELL opens SHORT.
    async fn market_order(&self, side: Side, usd_amount: f64) -> Result<()>;

    /// Submit a staged strategy as entry + protective orders.
    async fn run_strategy(&self, strategy: &StagedStrategy) -> Result<()>;

    /// Move the live position's protective orders to the staged levels.
    ///
    /// Sends only the legs that changed; when nothing changed, re-fetches
    /// positions instead. Fails with `NoPosition` without a live position.
    async fn update_strategy(&self, strategy: &StagedStrategy) -> Result<()>;

    /// Cancel every open order of the active symbol.
    async fn cancel_all_orders(&self) -> Result<()>;

    /// Cancel one limit order by client order id.
    async fn cancel_order(&self, client_order_id: &str) -> Result<()>;

    /// Cancel one algo (stop / take-profit) order.
    async fn cancel_algo_order(&self, algo_id: u64) -> Result<()>;

    /// Load symbol info, balance, positions and open orders.
    async fn bootstrap(&self) -> Result<()>;

    /// Close the session and stop background tasks.
    async fn stop(&self) -> Result<()>;
}
