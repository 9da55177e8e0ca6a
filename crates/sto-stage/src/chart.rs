//! Chart-control interface and a headless implementation.
//!
//! The desk only needs a handful of primitives from the charting surface:
//! bar data, a visible range, horizontal price lines, shaded price zones, and
//! a pixel → price conversion. [`HeadlessChart`] implements them on a linear
//! price scale and logs every annotation change.

use std::collections::BTreeMap;

use sto_core::types::PriceBar;
use tracing::debug;

pub type AnnotationId = u64;

/// Appearance of a horizontal price line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub label: String,
    pub color: String,
    pub dashed: bool,
    /// Whether the trader may drag this line.
    pub editable: bool,
}

/// Appearance of a shaded price zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStyle {
    pub label: String,
    pub fill: String,
}

pub trait ChartSurface: Send {
    /// Replace all bars.
    fn set_data(&mut self, label: &str, bars: &[PriceBar]);
    /// Append a bar, or update the last one when it has the same open time.
    fn on_new_trade(&mut self, bar: PriceBar);
    /// Visible time range, ms since epoch.
    fn set_x_range(&mut self, start_ms: u64, end_ms: u64);
    fn add_line(&mut self, price: f64, style: &LineStyle) -> AnnotationId;
    fn move_line(&mut self, id: AnnotationId, price: f64);
    fn add_zone(&mut self, from: f64, to: f64, style: &ZoneStyle) -> AnnotationId;
    fn move_zone(&mut self, id: AnnotationId, from: f64, to: f64);
    fn remove(&mut self, id: AnnotationId);
    /// Price under a vertical pixel offset from the top of the plot area.
    fn price_at(&self, y_px: f64) -> Option<f64>;
}

// ---------------------------------------------------------------------------
// Headless chart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Line { price: f64, style: LineStyle },
    Zone { from: f64, to: f64, style: ZoneStyle },
}

/// Linear vertical scale: `top` at y = 0, `bottom` at y = `height_px`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    pub top: f64,
    pub bottom: f64,
    pub height_px: f64,
}

impl PriceScale {
    pub fn price_at(&self, y_px: f64) -> Option<f64> {
        if !(y_px.is_finite() && self.height_px > 0.0 && self.top > self.bottom) {
            return None;
        }
        Some(self.top - y_px / self.height_px * (self.top - self.bottom))
    }

    pub fn y_for(&self, price: f64) -> Option<f64> {
        if !(price.is_finite() && self.height_px > 0.0 && self.top > self.bottom) {
            return None;
        }
        Some((self.top - price) / (self.top - self.bottom) * self.height_px)
    }
}

/// Fraction of the bar range added above and below when fitting the scale.
const FIT_PADDING: f64 = 0.05;

pub struct HeadlessChart {
    label: String,
    bars: Vec<PriceBar>,
    x_range: Option<(u64, u64)>,
    scale: PriceScale,
    annotations: BTreeMap<AnnotationId, Annotation>,
    latest_price_line: Option<AnnotationId>,
    next_id: AnnotationId,
}

impl HeadlessChart {
    pub fn new(height_px: f64) -> Self {
        Self {
            label: String::new(),
            bars: Vec::new(),
            x_range: None,
            scale: PriceScale { top: 0.0, bottom: 0.0, height_px },
            annotations: BTreeMap::new(),
            latest_price_line: None,
            next_id: 1,
        }
    }

    pub fn set_scale(&mut self, top: f64, bottom: f64) {
        self.scale.top = top;
        self.scale.bottom = bottom;
    }

    pub fn scale(&self) -> PriceScale {
        self.scale
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn x_range(&self) -> Option<(u64, u64)> {
        self.x_range
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    /// Annotations placed through the trait (the latest-price marker excluded).
    pub fn annotations(&self) -> impl Iterator<Item = (AnnotationId, &Annotation)> {
        let marker = self.latest_price_line;
        self.annotations.iter().filter(move |(id, _)| Some(**id) != marker).map(|(id, a)| (*id, a))
    }

    /// Price and color of the latest-price marker.
    pub fn latest_price(&self) -> Option<(f64, &str)> {
        match self.latest_price_line.and_then(|id| self.annotations.get(&id)) {
            Some(Annotation::Line { price, style }) => Some((*price, style.color.as_str())),
            _ => None,
        }
    }

    fn fit_scale(&mut self) {
        let (lo, hi) = self
            .bars
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| (lo.min(b.low), hi.max(b.high)));
        if lo.is_finite() && hi.is_finite() {
            let pad = ((hi - lo) * FIT_PADDING).max(hi.abs() * 1e-6);
            self.scale.top = hi + pad;
            self.scale.bottom = lo - pad;
        }
    }

    fn update_latest_price(&mut self, bar: &PriceBar) {
        let color = if bar.is_up() { "#00C853" } else { "#E53935" };
        if let Some(Annotation::Line { price, style }) =
            self.latest_price_line.and_then(|id| self.annotations.get_mut(&id))
        {
            *price = bar.close;
            style.color = color.to_string();
            return;
        }
        let id = self.insert(Annotation::Line {
            price: bar.close,
            style: LineStyle { label: String::new(), color: color.to_string(), dashed: true, editable: false },
        });
        self.latest_price_line = Some(id);
    }

    fn insert(&mut self, annotation: Annotation) -> AnnotationId {
        let id = self.next_id;
        self.next_id += 1;
        self.annotations.insert(id, annotation);
        id
    }
}

impl ChartSurface for HeadlessChart {
    fn set_data(&mut self, label: &str, bars: &[PriceBar]) {
        self.label = label.to_string();
        self.bars = bars.to_vec();
        self.fit_scale();
        if let Some(last) = bars.last() {
            self.update_latest_price(last);
        }
        debug!("[chart] {label}: {} bars, scale {:.2}..{:.2}", bars.len(), self.scale.bottom, self.scale.top);
    }

    fn on_new_trade(&mut self, bar: PriceBar) {
        match self.bars.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => self.bars.push(bar),
        }
        if bar.high > self.scale.top || bar.low < self.scale.bottom {
            self.fit_scale();
        }
        self.update_latest_price(&bar);
    }

    fn set_x_range(&mut self, start_ms: u64, end_ms: u64) {
        self.x_range = Some((start_ms, end_ms));
    }

    fn add_line(&mut self, price: f64, style: &LineStyle) -> AnnotationId {
        let id = self.insert(Annotation::Line { price, style: style.clone() });
        debug!("[chart] + line #{id} '{}' @ {price}", style.label);
        id
    }

    fn move_line(&mut self, id: AnnotationId, price: f64) {
        if let Some(Annotation::Line { price: p, style }) = self.annotations.get_mut(&id) {
            *p = price;
            debug!("[chart] ~ line #{id} '{}' @ {price}", style.label);
        }
    }

    fn add_zone(&mut self, from: f64, to: f64, style: &ZoneStyle) -> AnnotationId {
        let id = self.insert(Annotation::Zone { from, to, style: style.clone() });
        debug!("[chart] + zone #{id} '{}' {from}..{to}", style.label);
        id
    }

    fn move_zone(&mut self, id: AnnotationId, from: f64, to: f64) {
        if let Some(Annotation::Zone { from: f, to: t, .. }) = self.annotations.get_mut(&id) {
            *f = from;
            *t = to;
        }
    }

    fn remove(&mut self, id: AnnotationId) {
        if self.annotations.remove(&id).is_some() {
            debug!("[chart] - #{id}");
        }
    }

    fn price_at(&self, y_px: f64) -> Option<f64> {
        self.scale.price_at(y_px)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: u64, open: f64, close: f64) -> PriceBar {
        PriceBar { date, open, high: open.max(close) + 10.0, low: open.min(close) - 10.0, close, volume: 1.0 }
    }

    #[test]
    fn linear_scale_round_trip() {
        let mut chart = HeadlessChart::new(2000.0);
        assert_eq!(chart.price_at(10.0), None);
        chart.set_scale(51_000.0, 49_000.0);
        assert_eq!(chart.price_at(0.0), Some(51_000.0));
        assert_eq!(chart.price_at(1000.0), Some(50_000.0));
        assert_eq!(chart.price_at(2000.0), Some(49_000.0));
        assert_eq!(chart.scale().y_for(50_000.0), Some(1000.0));
        assert_eq!(chart.price_at(f64::NAN), None);
    }

    #[test]
    fn trades_update_last_bar_and_marker() {
        let mut chart = HeadlessChart::new(500.0);
        chart.set_data("BTC/USDT", &[bar(1, 100.0, 110.0), bar(2, 110.0, 120.0)]);
        assert_eq!(chart.latest_price(), Some((120.0, "#00C853")));

        chart.on_new_trade(bar(2, 110.0, 105.0));
        assert_eq!(chart.bars().len(), 2);
        assert_eq!(chart.latest_price(), Some((105.0, "#E53935")));

        chart.on_new_trade(bar(3, 105.0, 300.0));
        assert_eq!(chart.bars().len(), 3);
        assert!(chart.scale().top > 300.0);
        assert_eq!(chart.annotations().count(), 0);
    }

    #[test]
    fn annotations_lifecycle() {
        let mut chart = HeadlessChart::new(500.0);
        let style = LineStyle { label: "SL".into(), color: "red".into(), dashed: true, editable: true };
        let line = chart.add_line(49_000.0, &style);
        let zone = chart.add_zone(49_000.0, 50_000.0, &ZoneStyle { label: "risk".into(), fill: "red".into() });

        chart.move_line(line, 49_500.0);
        chart.move_zone(zone, 49_500.0, 50_000.0);
        assert!(matches!(chart.annotation(line), Some(Annotation::Line { price, .. }) if *price == 49_500.0));
        assert!(matches!(chart.annotation(zone), Some(Annotation::Zone { from, .. }) if *from == 49_500.0));

        chart.remove(line);
        assert!(chart.annotation(line).is_none());
        assert_eq!(chart.annotations().count(), 1);
    }
}
