//! Close-price line chart rendered as standalone SVG

use crate::model::PriceSeries;
use chrono::NaiveDate;
use std::fmt::Write;

const WIDTH: f64 = 860.0;
const HEIGHT: f64 = 420.0;
const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 150.0;
const MARGIN_TOP: f64 = 24.0;
const MARGIN_BOTTOM: f64 = 40.0;
const Y_TICKS: usize = 5;

const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#17becf",
];

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One polyline of closes per series on shared axes, with a legend
///
/// The x axis spans the earliest to the latest date across all series and
/// the y axis the lowest to the highest close.
pub fn render_svg(series: &[PriceSeries]) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    svg.push_str(r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);

    let Some(bounds) = Bounds::of(series) else {
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle">No price data</text></svg>"#,
            WIDTH / 2.0,
            HEIGHT / 2.0
        );
        return svg;
    };

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let bottom = MARGIN_TOP + plot_h;
    let right = MARGIN_LEFT + plot_w;

    let x = |date: NaiveDate| {
        let days = (date - bounds.start).num_days() as f64;
        MARGIN_LEFT + days / bounds.span_days * plot_w
    };
    let y = |close: f64| bottom - (close - bounds.low) / bounds.range * plot_h;

    // Axes and horizontal grid
    let _ = write!(
        svg,
        r##"<g stroke="#444" stroke-width="1"><line x1="{MARGIN_LEFT}" y1="{bottom}" x2="{right}" y2="{bottom}"/><line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{bottom}"/></g>"##
    );
    for i in 0..=Y_TICKS {
        let value = bounds.low + bounds.range * i as f64 / Y_TICKS as f64;
        let ty = y(value);
        let _ = write!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{ty:.1}" x2="{right}" y2="{ty:.1}" stroke="#ddd"/><text x="{}" y="{:.1}" text-anchor="end">{value:.2}</text>"##,
            MARGIN_LEFT - 6.0,
            ty + 4.0
        );
    }
    let _ = write!(
        svg,
        r#"<text x="{MARGIN_LEFT}" y="{}" text-anchor="start">{}</text><text x="{right}" y="{}" text-anchor="end">{}</text>"#,
        bottom + 18.0,
        bounds.start,
        bottom + 18.0,
        bounds.end
    );

    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let label = escape(s.ticker());

        let points: Vec<String> = s
            .bars()
            .iter()
            .map(|b| format!("{:.1},{:.1}", x(b.date), y(b.close)))
            .collect();

        let _ = write!(
            svg,
            r#"<polyline data-ticker="{label}" fill="none" stroke="{color}" stroke-width="1.5" points="{}"/>"#,
            points.join(" ")
        );

        let ly = MARGIN_TOP + 10.0 + i as f64 * 20.0;
        let _ = write!(
            svg,
            r#"<g class="legend"><line x1="{}" y1="{ly}" x2="{}" y2="{ly}" stroke="{color}" stroke-width="3"/><text x="{}" y="{}">{label}</text></g>"#,
            right + 16.0,
            right + 36.0,
            right + 42.0,
            ly + 4.0
        );
    }

    svg.push_str("</svg>");
    svg
}

struct Bounds {
    start: NaiveDate,
    end: NaiveDate,
    span_days: f64,
    low: f64,
    range: f64,
}

impl Bounds {
    fn of(series: &[PriceSeries]) -> Option<Self> {
        let bars = || series.iter().flat_map(PriceSeries::bars);

        let start = bars().map(|b| b.date).min()?;
        let end = bars().map(|b| b.date).max()?;
        let low = bars().map(|b| b.close).fold(f64::INFINITY, f64::min);
        let high = bars().map(|b| b.close).fold(f64::NEG_INFINITY, f64::max);

        // A single day or a flat line still needs a non-zero span
        let span_days = ((end - start).num_days() as f64).max(1.0);
        let range = if high > low { high - low } else { 1.0 };

        Some(Self {
            start,
            end,
            span_days,
            low,
            range,
        })
    }
}
