use plotters::coord::Shift;
use plotters::prelude::*;
use polars::prelude::PolarsResult;

use crate::analysis::kde::KdeCurve;
use crate::models::polars_err;

/// seaborn "deep" palette, cycled in hue order.
const DEEP_PALETTE: [RGBColor; 10] = [
    RGBColor(76, 114, 176),
    RGBColor(221, 132, 82),
    RGBColor(85, 168, 104),
    RGBColor(196, 78, 82),
    RGBColor(129, 114, 179),
    RGBColor(147, 120, 96),
    RGBColor(218, 139, 195),
    RGBColor(140, 140, 140),
    RGBColor(204, 185, 116),
    RGBColor(100, 181, 205),
];
const GRID_GREY: RGBColor = RGBColor(204, 204, 204);
const TEXT_GREY: RGBColor = RGBColor(38, 38, 38);

// Font sizes in points
const TITLE_PT: f64 = 16.0;
const AXIS_LABEL_PT: f64 = 12.0;
const TICK_PT: f64 = 11.0;
const LEGEND_PT: f64 = 11.0;

/// Everything needed to draw one super-population figure.
pub struct DensityPage<'a> {
    pub super_pop: &'a str,
    /// One curve per sub-population, in hue order
    pub curves: &'a [(String, KdeCurve)],
    /// Shared across all pages
    pub x_range: (f64, f64),
    /// Points
    pub line_width: f64,
}

pub fn palette_color(idx: usize) -> RGBColor {
    DEEP_PALETTE[idx % DEEP_PALETTE.len()]
}

pub fn page_title(super_pop: &str) -> String {
    format!("GDR Distribution : {}", super_pop)
}

/// Widen a zero-width range so the axis can still be built.
pub fn axis_range((lo, hi): (f64, f64)) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        let pad = if lo == 0.0 { 0.5 } else { lo.abs() * 0.05 };
        (lo - pad, hi + pad)
    }
}

/// Points of `xs`/`ys` inside `[lo, hi]`, with interpolated end points where
/// the curve crosses the bounds.
pub fn clip_to_range(xs: &[f64], ys: &[f64], lo: f64, hi: f64) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(xs.len());
    for i in 0..xs.len().min(ys.len()) {
        let (x, y) = (xs[i], ys[i]);
        if i > 0 {
            let (px, py) = (xs[i - 1], ys[i - 1]);
            for bound in [lo, hi] {
                let crosses = (px < bound && x > bound) || (px > bound && x < bound);
                if crosses {
                    let t = (bound - px) / (x - px);
                    out.push((bound, py + t * (y - py)));
                }
            }
        }
        if x >= lo && x <= hi {
            out.push((x, y));
        }
    }
    out
}

fn px(points: f64, px_per_inch: f64) -> f64 {
    points * px_per_inch / 72.0
}

/// Draw one figure onto `root`. `px_per_inch` is the backend's resolution,
/// used to turn point sizes into backend pixels.
pub fn draw_density_page<DB>(
    root: DrawingArea<DB, Shift>,
    page: &DensityPage,
    px_per_inch: f64,
) -> PolarsResult<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let font = |pt: f64| ("sans-serif", px(pt, px_per_inch));
    let (x_lo, x_hi) = axis_range(page.x_range);
    let y_max = page
        .curves
        .iter()
        .map(|(_, c)| c.max_density())
        .fold(0.0, f64::max);
    let y_hi = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(page_title(page.super_pop), font(TITLE_PT).into_font().color(&TEXT_GREY))
        .margin((0.15 * px_per_inch) as u32)
        .x_label_area_size((0.6 * px_per_inch) as u32)
        .y_label_area_size((0.8 * px_per_inch) as u32)
        .build_cartesian_2d(x_lo..x_hi, 0f64..y_hi)
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .configure_mesh()
        .x_desc("GDR Value")
        .y_desc("Density")
        .axis_desc_style(font(AXIS_LABEL_PT).into_font().color(&TEXT_GREY))
        .label_style(font(TICK_PT).into_font().color(&TEXT_GREY))
        .bold_line_style(GRID_GREY.stroke_width(px(0.8, px_per_inch).max(1.0) as u32))
        .light_line_style(TRANSPARENT)
        .axis_style(GRID_GREY.stroke_width(px(1.25, px_per_inch).max(1.0) as u32))
        .x_labels(8)
        .y_labels(6)
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    let stroke = px(page.line_width, px_per_inch).max(1.0) as u32;
    for (idx, (sub, curve)) in page.curves.iter().enumerate() {
        let colour = palette_color(idx);
        let points = clip_to_range(&curve.xs, &curve.ys, x_lo, x_hi);
        let legend_len = px(20.0, px_per_inch) as i32;
        chart
            .draw_series(LineSeries::new(points, colour.stroke_width(stroke)))
            .map_err(|e| polars_err(Box::new(e)))?
            .label(sub.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + legend_len, y)], colour.stroke_width(stroke))
            });
    }

    if !page.curves.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(GRID_GREY)
            .label_font(font(LEGEND_PT).into_font().color(&TEXT_GREY))
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(|e| polars_err(Box::new(e)))?;
    }

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    Ok(())
}
