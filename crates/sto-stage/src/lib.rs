//! # sto-stage
//!
//! Order staging on the chart: risk sizing, the staged strategy, the
//! pointer-driven staging controller and the annotation adapter.
//!
//! - **Risk** (`risk`): position notional from deposit, entry and stop
//! - **Strategy** (`strategy`): take-profit projection, position mirroring, percent distances
//! - **Chart** (`chart`): chart-control interface and `HeadlessChart`
//! - **Controller** (`controller`): `StagingController`, a pure reducer over price input
//! - **Render** (`render`): `AnnotationSync`, draws controller state on a chart
//! - **Desk** (`desk`): `TradingDesk`, the controller wired to a chart and a `TerminalApi`

pub mod chart;
pub mod controller;
pub mod desk;
pub mod render;
pub mod risk;
pub mod strategy;

pub use chart::{ChartSurface, HeadlessChart};
pub use controller::{Line, Outcome, Phase, StagingController};
pub use desk::{PointerInput, TradingDesk};
pub use risk::RiskSizer;
