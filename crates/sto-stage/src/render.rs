//! Annotation adapter: places entry / stop / take-profit lines and the risk
//! zone on a [`ChartSurface`] from a [`LevelsView`]. Reads controller state
//! only; never writes it.

use crate::chart::{AnnotationId, ChartSurface, LineStyle, ZoneStyle};
use crate::controller::LevelsView;

const ENTRY_COLOR: &str = "#2962FF";
const STOP_COLOR: &str = "#E53935";
const TAKE_PROFIT_COLOR: &str = "#00C853";
const RISK_FILL: &str = "rgba(229, 57, 53, 0.15)";

#[derive(Debug, Default)]
pub struct AnnotationSync {
    entry: Option<AnnotationId>,
    stop: Option<AnnotationId>,
    take_profit: Option<AnnotationId>,
    zone: Option<AnnotationId>,
    /// Style set of the lines on the chart: live or draft.
    live: bool,
}

impl AnnotationSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the chart in line with `view`. `None` removes everything.
    pub fn sync(&mut self, chart: &mut dyn ChartSurface, view: Option<&LevelsView>) {
        let Some(v) = view else {
            self.clear(chart);
            return;
        };
        // Entry editability differs between draft and live lines.
        if v.is_live() != self.live {
            self.clear(chart);
            self.live = v.is_live();
        }
        let editable_entry = !self.live;

        sync_line(chart, &mut self.entry, v.entry, &line_style("Entry", ENTRY_COLOR, false, editable_entry));
        sync_line(chart, &mut self.stop, v.stop, &line_style("SL", STOP_COLOR, true, true));
        sync_line(chart, &mut self.take_profit, v.take_profit, &line_style("TP", TAKE_PROFIT_COLOR, true, true));

        // A missing protective leg on a live position reads as 0: no zone then.
        let (lo, hi) = (v.entry.min(v.stop), v.entry.max(v.stop));
        match self.zone {
            Some(id) if lo > 0.0 => chart.move_zone(id, lo, hi),
            Some(id) => {
                chart.remove(id);
                self.zone = None;
            }
            None if lo > 0.0 => {
                let style = ZoneStyle { label: "risk".into(), fill: RISK_FILL.into() };
                self.zone = Some(chart.add_zone(lo, hi, &style));
            }
            None => {}
        }
    }

    pub fn clear(&mut self, chart: &mut dyn ChartSurface) {
        for id in [self.entry.take(), self.stop.take(), self.take_profit.take(), self.zone.take()]
            .into_iter()
            .flatten()
        {
            chart.remove(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none() && self.stop.is_none() && self.take_profit.is_none() && self.zone.is_none()
    }
}

fn line_style(label: &str, color: &str, dashed: bool, editable: bool) -> LineStyle {
    LineStyle { label: label.into(), color: color.into(), dashed, editable }
}

/// Add, move or remove one line. Non-positive prices hide it.
fn sync_line(chart: &mut dyn ChartSurface, slot: &mut Option<AnnotationId>, price: f64, style: &LineStyle) {
    if !(price > 0.0) {
        if let Some(id) = slot.take() {
            chart.remove(id);
        }
        return;
    }
    match slot {
        Some(id) => chart.move_line(*id, price),
        None => *slot = Some(chart.add_line(price, style)),
    }
}

#[cfg(test)]
mod tests {
    use sto_core::types::PositionSide;

    use super::*;
    use crate::chart::{Annotation, HeadlessChart};
    use crate::controller::Phase;

    fn view(phase: Phase, entry: f64, stop: f64, tp: f64) -> LevelsView {
        LevelsView { phase, entry, stop, take_profit: tp, position_side: PositionSide::Long }
    }

    fn lines(chart: &HeadlessChart) -> Vec<(String, f64, bool)> {
        chart
            .annotations()
            .filter_map(|(_, a)| match a {
                Annotation::Line { price, style } => Some((style.label.clone(), *price, style.editable)),
                Annotation::Zone { .. } => None,
            })
            .collect()
    }

    #[test]
    fn draft_lines_follow_view() {
        let mut chart = HeadlessChart::new(100.0);
        let mut sync = AnnotationSync::new();

        sync.sync(&mut chart, Some(&view(Phase::Drafting, 50_000.0, 50_000.0, 50_000.0)));
        assert_eq!(chart.annotations().count(), 4);

        sync.sync(&mut chart, Some(&view(Phase::Drafting, 50_000.0, 49_000.0, 53_000.0)));
        assert_eq!(
            lines(&chart),
            vec![("Entry".into(), 50_000.0, true), ("SL".into(), 49_000.0, true), ("TP".into(), 53_000.0, true)]
        );
        let zone = chart.annotations().find_map(|(_, a)| match a {
            Annotation::Zone { from, to, .. } => Some((*from, *to)),
            _ => None,
        });
        assert_eq!(zone, Some((49_000.0, 50_000.0)));

        sync.sync(&mut chart, None);
        assert_eq!(chart.annotations().count(), 0);
        assert!(sync.is_empty());
    }

    #[test]
    fn live_entry_is_locked_and_missing_legs_are_hidden() {
        let mut chart = HeadlessChart::new(100.0);
        let mut sync = AnnotationSync::new();
        sync.sync(&mut chart, Some(&view(Phase::Live, 50_000.0, 0.0, 53_000.0)));
        assert_eq!(lines(&chart), vec![("Entry".into(), 50_000.0, false), ("TP".into(), 53_000.0, true)]);
        assert!(chart.annotations().all(|(_, a)| matches!(a, Annotation::Line { .. })));
    }

    #[test]
    fn switching_to_live_recreates_entry_line() {
        let mut chart = HeadlessChart::new(100.0);
        let mut sync = AnnotationSync::new();
        sync.sync(&mut chart, Some(&view(Phase::Staged, 50_000.0, 49_000.0, 53_000.0)));
        sync.sync(&mut chart, Some(&view(Phase::Live, 50_000.0, 49_000.0, 53_000.0)));
        assert_eq!(lines(&chart)[0], ("Entry".into(), 50_000.0, false));
        assert_eq!(chart.annotations().count(), 4);
    }
}
