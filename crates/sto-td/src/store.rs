//! Account/market state: the single source of truth for what the backend has
//! confirmed.
//!
//! [`AccountStore`] is a typed reducer. Inbound envelopes go through
//! [`AccountStore::apply`], local commands through [`AccountStore::execute`];
//! both return the [`StateChange`]s they caused so the client can notify
//! subscribers. Nothing else mutates the store.

use sto_core::types::*;
use tracing::{debug, error, info, warn};

use crate::event::StateChange;
use crate::protocol::Inbound;

/// Local mutations that do not come from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    /// Latest market price from the realtime feed.
    PriceTick(f64),
    /// Optimistically drop an order the trader just cancelled.
    RemoveOrder(OrderKey),
}

/// Read-only view used by the staging desk.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub current_price: f64,
    pub tick_size: f64,
    pub deposit: f64,
    pub leverage: u32,
    /// Confirmed position of the active symbol.
    pub position: Option<Position>,
}

impl MarketSnapshot {
    pub fn notional_capacity(&self) -> f64 {
        self.deposit * self.leverage as f64
    }
}

#[derive(Debug, Clone)]
pub struct AccountStore {
    symbol: String,
    leverage: u32,
    current_price: f64,
    deposit: f64,
    symbol_info: SymbolInfo,
    positions: Vec<Position>,
    open_orders: OpenOrders,
    balance_seen: bool,
    last_status: Option<String>,
}

impl AccountStore {
    pub fn new(symbol: impl Into<String>, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            leverage,
            current_price: 0.0,
            deposit: 0.0,
            symbol_info: SymbolInfo::default(),
            positions: Vec::new(),
            open_orders: OpenOrders::default(),
            balance_seen: false,
            last_status: None,
        }
    }

    // -----------------------------------------------------------------------
    // Reducer
    // -----------------------------------------------------------------------

    pub fn apply(&mut self, msg: &Inbound) -> Vec<StateChange> {
        match msg {
            Inbound::Positions(list) => {
                let before = self.current_position(&self.symbol).cloned();
                let tick = self.symbol_info.tick_size;
                self.positions = list
                    .iter()
                    .cloned()
                    .map(|mut p| {
                        p.round_to_tick(tick);
                        p
                    })
                    .collect();
                let after = self.current_position(&self.symbol);
                let touches_active = after.is_some() || before.is_some();
                debug!("[store] {} position(s), active touched={touches_active}", self.positions.len());
                vec![StateChange::PositionsReplaced { touches_active }]
            }
            Inbound::SymbolInfo(info) => {
                info!("[store] symbol info: tick={} step={} minQty={}", info.tick_size, info.step_size, info.min_qty);
                self.symbol_info = *info;
                vec![StateChange::SymbolInfoReplaced]
            }
            Inbound::AccountInfo(account) => {
                self.deposit = account.deposit();
                let initial = !self.balance_seen;
                self.balance_seen = true;
                vec![StateChange::CapacityChanged { notional: self.notional_capacity(), initial }]
            }
            Inbound::OpenOrders(orders) => {
                self.open_orders = orders.clone();
                vec![StateChange::OrdersReplaced]
            }
            Inbound::Strategy(body) => {
                info!("[store] strategy accepted: {}", body.as_ref().map(|v| v.to_string()).unwrap_or_default());
                vec![StateChange::StrategyAccepted]
            }
            Inbound::CancelAllOrders | Inbound::CancelOrder | Inbound::CancelAlgoOrder => {
                vec![StateChange::OrdersStale]
            }
            Inbound::Status(status) => {
                self.last_status = Some(status.clone());
                vec![StateChange::ServerStatus(status.clone())]
            }
            Inbound::Error(message) => {
                error!("[store] server error: {message}");
                vec![StateChange::ServerError(message.clone())]
            }
            Inbound::Unknown(tag) => {
                debug!("[store] ignoring '{tag}'");
                Vec::new()
            }
        }
    }

    pub fn execute(&mut self, cmd: StoreCommand) -> Vec<StateChange> {
        match cmd {
            StoreCommand::PriceTick(price) => {
                if !(price.is_finite() && price > 0.0) {
                    warn!("[store] ignoring price tick {price}");
                    return Vec::new();
                }
                self.current_price = price;
                vec![StateChange::PriceTick(price)]
            }
            StoreCommand::RemoveOrder(key) => {
                let before = self.open_orders.all.len()
                    + self.open_orders.algo_orders.len()
                    + self.open_orders.limit_orders.len();
                self.open_orders.all.retain(|o| !o.matches(&key));
                match &key {
                    OrderKey::Algo(id) => self.open_orders.algo_orders.retain(|o| o.algo_id != *id),
                    OrderKey::Client(id) => self.open_orders.limit_orders.retain(|o| &o.client_order_id != id),
                }
                let after = self.open_orders.all.len()
                    + self.open_orders.algo_orders.len()
                    + self.open_orders.limit_orders.len();
                if after == before {
                    return Vec::new();
                }
                vec![StateChange::OrdersReplaced]
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn deposit(&self) -> f64 {
        self.deposit
    }

    pub fn symbol_info(&self) -> &SymbolInfo {
        &self.symbol_info
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn open_orders(&self) -> &OpenOrders {
        &self.open_orders
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.iter().any(|p| p.symbol == symbol)
    }

    pub fn current_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// `deposit × leverage`.
    pub fn notional_capacity(&self) -> f64 {
        self.deposit * self.leverage as f64
    }

    /// The plan resting on the exchange as open orders.
    pub fn unrealized_strategy(&self) -> UnrealizedStrategy {
        UnrealizedStrategy::from_orders(&self.open_orders.all)
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            symbol: self.symbol.clone(),
            current_price: self.current_price,
            tick_size: self.symbol_info.tick_size,
            deposit: self.deposit,
            leverage: self.leverage,
            position: self.current_position(&self.symbol).cloned(),
        }
    }
}
