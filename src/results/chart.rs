//! Per-node diagnostic chart (PNG)
//!
//! Three panels:
//! - cumulative profit with a zero line
//! - displayed bid price, y-axis clipped to its 2nd-98th percentile
//! - DA and RT prices, y-axis clipped to the DA 2nd-98th percentile
//!
//! Captions, axis labels and legends need a font backend and are drawn only
//! with the `chart-text` feature.

use chrono::{DateTime, Duration, TimeZone, Utc};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

use crate::error::{BacktestError, BacktestResult};
use crate::results::quantile;
use crate::types::EvaluationRow;

const WIDTH: u32 = 1800;
const HEIGHT: u32 = 1200;
const DRAW_TEXT: bool = cfg!(feature = "chart-text");

const PROFIT_COLOR: RGBColor = RGBColor(31, 119, 180);
const BID_COLOR: RGBColor = RGBColor(0, 0, 255);
const DA_COLOR: RGBColor = RGBColor(31, 119, 180);
const RT_COLOR: RGBColor = RGBColor(255, 127, 14);

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

struct Line<'a> {
    label: &'a str,
    color: RGBColor,
    points: Vec<(DateTime<Utc>, f64)>,
}

fn chart_err(e: impl std::fmt::Display) -> BacktestError {
    BacktestError::Chart(e.to_string())
}

/// Pad a degenerate or NaN range so plotters always gets a usable span
fn usable_range(lo: f64, hi: f64) -> Range<f64> {
    match (lo.is_finite(), hi.is_finite()) {
        (true, true) if hi > lo => lo..hi,
        (true, true) => (lo - 1.0)..(lo + 1.0),
        _ => -1.0..1.0,
    }
}

/// Clamp values into the y-range so clipped points stay inside the panel
fn clipped(
    times: &[DateTime<Utc>],
    values: impl Iterator<Item = f64>,
    range: &Range<f64>,
) -> Vec<(DateTime<Utc>, f64)> {
    times
        .iter()
        .copied()
        .zip(values)
        .filter(|(_, v)| !v.is_nan())
        .map(|(t, v)| (t, v.clamp(range.start, range.end)))
        .collect()
}

fn draw_panel(
    area: &Area<'_>,
    caption: &str,
    x_range: Range<DateTime<Utc>>,
    y_range: Range<f64>,
    lines: Vec<Line<'_>>,
    zero_line: bool,
) -> BacktestResult<()> {
    let mut builder = ChartBuilder::on(area);
    builder.margin(15);
    if DRAW_TEXT {
        builder
            .caption(caption, ("sans-serif", 22))
            .x_label_area_size(40)
            .y_label_area_size(80);
    }

    let mut chart = builder
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(chart_err)?;

    if DRAW_TEXT {
        chart
            .configure_mesh()
            .x_labels(8)
            .y_labels(8)
            .x_label_formatter(&|dt| dt.format("%Y-%m-%d").to_string())
            .y_desc("USD")
            .draw()
            .map_err(chart_err)?;
    }

    if zero_line && y_range.start <= 0.0 && y_range.end >= 0.0 {
        chart
            .draw_series(LineSeries::new(
                vec![(x_range.start, 0.0), (x_range.end, 0.0)],
                &RED,
            ))
            .map_err(chart_err)?;
    }

    for line in lines {
        let color = line.color;
        let drawn = chart
            .draw_series(LineSeries::new(line.points, &color))
            .map_err(chart_err)?;
        if DRAW_TEXT {
            drawn
                .label(line.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }

    if DRAW_TEXT {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(chart_err)?;
    }

    Ok(())
}

/// Render the three-panel chart for one node to `path`
pub fn render_chart(path: &Path, settlement_point: &str, rows: &[EvaluationRow]) -> BacktestResult<()> {
    if rows.is_empty() {
        return Err(BacktestError::Chart(format!(
            "no rows to plot for {}",
            settlement_point
        )));
    }

    let times: Vec<DateTime<Utc>> = rows
        .iter()
        .map(|r| Utc.from_utc_datetime(&r.observation.timestamp))
        .collect();
    let first = times[0];
    let last = times[times.len() - 1].max(first + Duration::hours(1));

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;
    let root = if DRAW_TEXT {
        root.titled(settlement_point, ("sans-serif", 30))
            .map_err(chart_err)?
    } else {
        root
    };

    let halves = root.split_evenly((2, 1));
    let top = halves[0].split_evenly((1, 2));

    // Cumulative profit
    let cum_min = rows.iter().map(|r| r.cum_profit).fold(0.0, f64::min);
    let cum_max = rows.iter().map(|r| r.cum_profit).fold(0.0, f64::max);
    let profit_range = usable_range(cum_min, cum_max);
    draw_panel(
        &top[0],
        "Cumulative profit",
        first..last,
        profit_range.clone(),
        vec![Line {
            label: "Cumulative profit",
            color: PROFIT_COLOR,
            points: clipped(&times, rows.iter().map(|r| r.cum_profit), &profit_range),
        }],
        true,
    )?;

    // Bid price, 2nd-98th percentile
    let bids = || rows.iter().map(|r| r.display_bid_price);
    let bid_range = usable_range(quantile(bids(), 0.02), quantile(bids(), 0.98));
    draw_panel(
        &top[1],
        "Bid price",
        first..last,
        bid_range.clone(),
        vec![Line {
            label: "bid_price",
            color: BID_COLOR,
            points: clipped(&times, bids(), &bid_range),
        }],
        false,
    )?;

    // DA vs RT, clipped on the DA distribution
    let da = || rows.iter().map(|r| r.observation.spp_da);
    let spp_range = usable_range(quantile(da(), 0.02), quantile(da(), 0.98));
    draw_panel(
        &halves[1],
        "Settlement point prices",
        first..last,
        spp_range.clone(),
        vec![
            Line {
                label: "SPP_DA",
                color: DA_COLOR,
                points: clipped(&times, da(), &spp_range),
            },
            Line {
                label: "SPP_RT",
                color: RT_COLOR,
                points: clipped(&times, rows.iter().map(|r| r.observation.spp_rt), &spp_range),
            },
        ],
        false,
    )?;

    root.present().map_err(chart_err)?;
    debug!(node = settlement_point, path = %path.display(), "Chart written");
    Ok(())
}
