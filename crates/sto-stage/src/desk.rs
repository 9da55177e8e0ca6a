//! Trading desk: the chart, the staging controller and the terminal backend
//! wired together.
//!
//! Pointer input arrives in pixels, is converted to a price by the chart,
//! reduced by the controller against a fresh market snapshot, and the result
//! is drawn back through [`AnnotationSync`]. Terminal events reconcile the
//! controller with confirmed state.

use std::sync::Arc;

use anyhow::Result;
use sto_core::error::StoError;
use sto_core::types::{PriceBar, StagedStrategy};
use sto_td::{StateChange, TerminalApi, TerminalEvent};
use tracing::{info, warn};

use crate::chart::ChartSurface;
use crate::controller::{Line, MarketContext, Outcome, Phase, StageInput, StagingController};
use crate::render::AnnotationSync;
use crate::strategy::percents_from_entry;

/// Pointer input in chart pixels (vertical offset from the plot top).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    SecondaryDown { y: f64 },
    Move { y: f64 },
    Release,
    LineDrag { line: Line, y: f64 },
    LineDrop { line: Line },
}

pub struct TradingDesk<C: ChartSurface, A: TerminalApi> {
    chart: C,
    api: Arc<A>,
    controller: StagingController,
    annotations: AnnotationSync,
}

impl<C: ChartSurface, A: TerminalApi> TradingDesk<C, A> {
    pub fn new(chart: C, api: Arc<A>, controller: StagingController) -> Self {
        Self { chart, api, controller, annotations: AnnotationSync::new() }
    }

    pub fn chart(&self) -> &C {
        &self.chart
    }

    pub fn chart_mut(&mut self) -> &mut C {
        &mut self.chart
    }

    pub fn controller(&self) -> &StagingController {
        &self.controller
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Feed one pointer event. Live edits dropped on a line are pushed to
    /// the backend before returning.
    pub async fn pointer(&mut self, input: PointerInput) -> Result<Outcome> {
        let stage = match input {
            PointerInput::SecondaryDown { y } => self.price_at(y).map(|price| StageInput::SecondaryDown { price }),
            PointerInput::Move { y } => self.price_at(y).map(|price| StageInput::Move { price }),
            PointerInput::Release => Some(StageInput::Release),
            PointerInput::LineDrag { line, y } => self.price_at(y).map(|price| StageInput::LineDrag { line, price }),
            PointerInput::LineDrop { line } => Some(StageInput::LineDrop { line }),
        };
        let Some(stage) = stage else {
            return Ok(Outcome::Ignored);
        };

        let ctx = MarketContext::from(&self.api.snapshot());
        let outcome = self.controller.handle(stage, &ctx);
        if !matches!(outcome, Outcome::Ignored | Outcome::Rejected) {
            self.redraw();
        }
        if let Outcome::UpdateRequested(strategy) = &outcome {
            info!("[desk] moving protective orders: sl={} tp={}", strategy.stop_loss, strategy.take_profit);
            self.api.update_strategy(strategy).await?;
        }
        Ok(outcome)
    }

    fn price_at(&self, y: f64) -> Option<f64> {
        let price = self.chart.price_at(y);
        if price.is_none() {
            warn!("[desk] no price scale for y={y}");
        }
        price
    }

    /// React to a terminal event. Returns whether the staged levels changed.
    pub fn on_event(&mut self, event: &TerminalEvent) -> bool {
        match event {
            TerminalEvent::Changed(StateChange::PositionsReplaced { touches_active: true }) => {
                let snapshot = self.api.snapshot();
                let changed = self.controller.reconcile(snapshot.position.as_ref());
                if changed {
                    self.redraw();
                }
                changed
            }
            TerminalEvent::Changed(StateChange::CapacityChanged { notional, initial }) => {
                self.controller.on_capacity(*notional, *initial);
                false
            }
            _ => false,
        }
    }

    /// Submit the staged plan.
    pub async fn confirm(&mut self) -> Result<StagedStrategy> {
        if self.controller.phase() != Phase::Staged {
            return Err(StoError::InvalidLevels(format!("nothing staged ({:?})", self.controller.phase())).into());
        }
        let strategy = self.controller.strategy().clone();
        self.api.run_strategy(&strategy).await?;
        info!("[desk] strategy submitted: {}", self.status_line());
        Ok(strategy)
    }

    /// Drop a draft or staged plan.
    pub fn clear(&mut self) -> bool {
        let cleared = self.controller.clear();
        if cleared {
            self.redraw();
        }
        cleared
    }

    /// Append a realtime bar to the chart.
    pub fn on_bar(&mut self, bar: PriceBar) {
        self.chart.on_new_trade(bar);
    }

    pub fn status_line(&self) -> String {
        let Some(v) = self.controller.view() else {
            return "idle".to_string();
        };
        let usd = self.controller.strategy().usd_amount;
        match percents_from_entry(v.entry, v.stop, v.take_profit) {
            Ok(p) => format!(
                "{:?} {} entry={} sl={} ({}%) tp={} (+{}%) usd={usd}",
                v.phase, v.position_side, v.entry, v.stop, p.stop, v.take_profit, p.take_profit
            ),
            Err(_) => format!("{:?} {}", v.phase, v.position_side),
        }
    }

    fn redraw(&mut self) {
        let view = self.controller.view();
        self.annotations.sync(&mut self.chart, view.as_ref());
    }
}
