//! Interactive staging controller.
//!
//! A pure reducer from pointer input (already converted to prices) to the
//! staged strategy. It never touches the chart; [`crate::render`] reads
//! [`StagingController::view`] to place annotations.
//!
//! ```text
//!            press (no position)        release (stop != entry)
//!   Idle ───────────────────────► Drafting ─────────────────────► Staged
//!    ▲                               │ release (stop == entry)       │
//!    └───────────────────────────────┘◄──────── clear ───────────────┘
//!
//!   any phase ── reconcile(Some(position)) ──► Live ── reconcile(None) ──► Idle
//! ```
//!
//! Every input carries a fresh [`MarketContext`], so clamps always use the
//! latest market price rather than one captured when the gesture began.

use sto_core::types::{Position, PositionSide, StagedStrategy, round_to_tick};
use sto_td::MarketSnapshot;
use tracing::{debug, info};

use crate::risk::RiskSizer;
use crate::strategy::{mirror_position, take_profit_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing staged.
    #[default]
    Idle,
    /// Secondary button held; the stop follows the pointer.
    Drafting,
    /// A finished plan waiting for confirmation.
    Staged,
    /// Mirrors a confirmed position; only stop and take-profit are editable.
    Live,
}

/// One of the three staged price lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Entry,
    StopLoss,
    TakeProfit,
}

/// Pointer input, in price space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageInput {
    SecondaryDown { price: f64 },
    Move { price: f64 },
    Release,
    LineDrag { line: Line, price: f64 },
    LineDrop { line: Line },
}

/// Market facts the controller reads on every input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    pub current_price: f64,
    pub tick_size: f64,
    pub deposit: f64,
    /// A confirmed position exists for the active symbol.
    pub has_position: bool,
}

impl From<&MarketSnapshot> for MarketContext {
    fn from(s: &MarketSnapshot) -> Self {
        Self {
            current_price: s.current_price,
            tick_size: s.tick_size,
            deposit: s.deposit,
            has_position: s.position.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Input does not apply in the current phase.
    Ignored,
    /// Candidate level violates a constraint; the previous level is kept.
    Rejected,
    /// Levels changed.
    Updated,
    /// A draft was finished and is ready to confirm.
    Published(StagedStrategy),
    /// A degenerate draft was dropped.
    Discarded,
    /// Live levels were edited; the backend should move the protective orders.
    UpdateRequested(StagedStrategy),
}

/// What the rendering adapter draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelsView {
    pub phase: Phase,
    pub entry: f64,
    pub stop: f64,
    pub take_profit: f64,
    pub position_side: PositionSide,
}

impl LevelsView {
    pub fn is_live(&self) -> bool {
        self.phase == Phase::Live
    }
}

pub struct StagingController {
    symbol: String,
    phase: Phase,
    strategy: StagedStrategy,
    sizer: RiskSizer,
    reward_ratio: f64,
    capacity: f64,
    pinned_tp: Option<f64>,
    confirmed_sl: Option<f64>,
}

impl StagingController {
    pub fn new(symbol: impl Into<String>, sizer: RiskSizer, reward_ratio: f64) -> Self {
        let symbol = symbol.into();
        Self {
            strategy: StagedStrategy::empty(symbol.clone(), 0.0),
            symbol,
            phase: Phase::Idle,
            sizer,
            reward_ratio,
            capacity: 0.0,
            pinned_tp: None,
            confirmed_sl: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn strategy(&self) -> &StagedStrategy {
        &self.strategy
    }

    /// Stop trigger of the confirmed position, when live.
    pub fn confirmed_stop(&self) -> Option<f64> {
        self.confirmed_sl
    }

    pub fn handle(&mut self, input: StageInput, ctx: &MarketContext) -> Outcome {
        match input {
            StageInput::SecondaryDown { price } => self.press(price, ctx),
            StageInput::Move { price } => self.drag_stop(price, ctx),
            StageInput::Release => self.release(),
            StageInput::LineDrag { line, price } => self.drag_live(line, price, ctx),
            StageInput::LineDrop { line } => self.drop_live(line),
        }
    }

    // -----------------------------------------------------------------------
    // Drafting
    // -----------------------------------------------------------------------

    fn press(&mut self, price: f64, ctx: &MarketContext) -> Outcome {
        if ctx.has_position || matches!(self.phase, Phase::Drafting | Phase::Live) {
            return Outcome::Ignored;
        }
        let entry = round_to_tick(price, ctx.tick_size);
        if !(entry.is_finite() && entry > 0.0 && ctx.current_price > 0.0) {
            return Outcome::Rejected;
        }
        // Entry above the market fills a SHORT, below it a LONG.
        let side = if entry > ctx.current_price { PositionSide::Short } else { PositionSide::Long };

        let mut draft = StagedStrategy::empty(self.symbol.clone(), self.capacity);
        draft.set_position_side(side);
        draft.entry_price = entry;
        draft.stop_loss = entry;
        draft.take_profit = entry;
        self.strategy = draft;
        self.pinned_tp = None;
        self.phase = Phase::Drafting;
        debug!("[stage] draft {side} entry={entry} (market {})", ctx.current_price);
        Outcome::Updated
    }

    fn drag_stop(&mut self, price: f64, ctx: &MarketContext) -> Outcome {
        if self.phase != Phase::Drafting {
            return Outcome::Ignored;
        }
        let candidate = round_to_tick(price, ctx.tick_size);
        if !(candidate.is_finite() && candidate > 0.0) {
            return Outcome::Rejected;
        }
        let entry = self.strategy.entry_price;
        let current = ctx.current_price;
        let valid = match self.strategy.position_side {
            PositionSide::Long => candidate <= current && candidate <= entry,
            PositionSide::Short => candidate >= current && candidate >= entry,
        };
        if !valid {
            return Outcome::Rejected;
        }

        self.strategy.stop_loss = candidate;
        self.strategy.take_profit = self.projected_take_profit(ctx.tick_size);
        if let Ok(sizing) = self.sizer.checked_size(ctx.deposit, entry, candidate) {
            self.strategy.usd_amount = sizing.usd_amount;
        }
        Outcome::Updated
    }

    fn release(&mut self) -> Outcome {
        if self.phase != Phase::Drafting {
            return Outcome::Ignored;
        }
        match PositionSide::from_levels(self.strategy.entry_price, self.strategy.stop_loss) {
            Some(side) => {
                self.strategy.set_position_side(side);
                self.phase = Phase::Staged;
                let s = &self.strategy;
                info!(
                    "[stage] staged {} entry={} sl={} tp={} usd={}",
                    s.position_side, s.entry_price, s.stop_loss, s.take_profit, s.usd_amount
                );
                Outcome::Published(self.strategy.clone())
            }
            None => {
                debug!("[stage] stop == entry, draft discarded");
                self.reset();
                Outcome::Discarded
            }
        }
    }

    // -----------------------------------------------------------------------
    // Live position edits
    // -----------------------------------------------------------------------

    fn drag_live(&mut self, line: Line, price: f64, ctx: &MarketContext) -> Outcome {
        if self.phase != Phase::Live {
            return Outcome::Ignored;
        }
        let candidate = round_to_tick(price, ctx.tick_size);
        if !(candidate.is_finite() && candidate > 0.0) {
            return Outcome::Rejected;
        }
        let current = (ctx.current_price > 0.0).then_some(ctx.current_price);
        let long = self.strategy.position_side == PositionSide::Long;

        match line {
            Line::Entry => Outcome::Rejected,
            Line::StopLoss => {
                // The stop never crosses the market nor moves beyond the
                // confirmed trigger.
                let bounds = current.into_iter().chain(self.confirmed_sl.filter(|p| *p > 0.0));
                let stop = if long {
                    bounds.fold(candidate, f64::min)
                } else {
                    bounds.fold(candidate, f64::max)
                };
                if stop == self.strategy.stop_loss {
                    return Outcome::Rejected;
                }
                self.strategy.stop_loss = stop;
                self.strategy.take_profit = self.projected_take_profit(ctx.tick_size);
                Outcome::Updated
            }
            Line::TakeProfit => {
                let tp = match current {
                    Some(c) if long => candidate.max(c),
                    Some(c) => candidate.min(c),
                    None => candidate,
                };
                if tp == self.strategy.take_profit {
                    return Outcome::Rejected;
                }
                self.strategy.take_profit = tp;
                self.pinned_tp = Some(tp);
                Outcome::Updated
            }
        }
    }

    fn drop_live(&mut self, line: Line) -> Outcome {
        if self.phase != Phase::Live || line == Line::Entry {
            return Outcome::Ignored;
        }
        Outcome::UpdateRequested(self.strategy.clone())
    }

    fn projected_take_profit(&self, tick: f64) -> f64 {
        self.pinned_tp.unwrap_or_else(|| {
            let s = &self.strategy;
            round_to_tick(take_profit_for(s.entry_price, s.stop_loss, self.reward_ratio), tick)
        })
    }

    // -----------------------------------------------------------------------
    // External state
    // -----------------------------------------------------------------------

    /// Align with the confirmed position of the active symbol.
    ///
    /// A position always overwrites local edits. Without one, only a live
    /// mirror is cleared; an unconfirmed draft is left alone. Returns whether
    /// anything changed.
    pub fn reconcile(&mut self, position: Option<&Position>) -> bool {
        match position {
            Some(p) => {
                self.strategy = mirror_position(p);
                self.pinned_tp = p.take_profit_trigger();
                self.confirmed_sl = p.stop_trigger();
                if self.phase != Phase::Live {
                    info!("[stage] live {} entry={}", p.position_side, p.entry_price);
                }
                self.phase = Phase::Live;
                true
            }
            None if self.phase == Phase::Live => {
                info!("[stage] position closed");
                self.reset();
                true
            }
            None => false,
        }
    }

    /// New notional capacity. A live mirror keeps its size; a draft or staged
    /// plan only takes the first capacity after start.
    pub fn on_capacity(&mut self, notional: f64, initial: bool) {
        self.capacity = notional;
        match self.phase {
            Phase::Live => {}
            Phase::Idle => self.strategy.usd_amount = notional,
            Phase::Drafting | Phase::Staged => {
                if initial {
                    self.strategy.usd_amount = notional;
                }
            }
        }
    }

    /// Drop a draft or staged plan. A live mirror cannot be cleared.
    pub fn clear(&mut self) -> bool {
        if matches!(self.phase, Phase::Live | Phase::Idle) {
            return false;
        }
        self.reset();
        true
    }

    fn reset(&mut self) {
        self.strategy = StagedStrategy::empty(self.symbol.clone(), self.capacity);
        self.pinned_tp = None;
        self.confirmed_sl = None;
        self.phase = Phase::Idle;
    }

    pub fn view(&self) -> Option<LevelsView> {
        if self.phase == Phase::Idle {
            return None;
        }
        Some(LevelsView {
            phase: self.phase,
            entry: self.strategy.entry_price,
            stop: self.strategy.stop_loss,
            take_profit: self.strategy.take_profit,
            position_side: self.strategy.position_side,
        })
    }
}
