//! Gaussian kernel density estimate with a Scott bandwidth.

use statrs::distribution::{Continuous, Normal};
use statrs::statistics::Statistics;

use crate::config::PlotSettings;

#[derive(Debug, Clone)]
pub struct KdeCurve {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub bandwidth: f64,
}

impl KdeCurve {
    pub fn max_density(&self) -> f64 {
        self.ys.iter().cloned().fold(0.0, f64::max)
    }
}

pub fn scott_bandwidth(values: &[f64], bw_adjust: f64) -> f64 {
    let n = values.len() as f64;
    values.iter().std_dev() * n.powf(-0.2) * bw_adjust
}

/// `None` when the sample is too small or has zero variance; there is no
/// meaningful density to draw in that case.
pub fn gaussian_kde(values: &[f64], settings: &PlotSettings) -> Option<KdeCurve> {
    if values.len() < 2 || settings.grid_size < 2 {
        return None;
    }
    let bandwidth = scott_bandwidth(values, settings.bw_adjust);
    if !bandwidth.is_finite() || bandwidth <= 0.0 {
        return None;
    }
    let kernel = Normal::new(0.0, 1.0).ok()?;

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let lo = min - settings.cut * bandwidth;
    let hi = max + settings.cut * bandwidth;
    let step = (hi - lo) / (settings.grid_size - 1) as f64;

    let n = values.len() as f64;
    let xs: Vec<f64> = (0..settings.grid_size).map(|i| lo + i as f64 * step).collect();
    let ys = xs
        .iter()
        .map(|&x| {
            values.iter().map(|&xi| kernel.pdf((x - xi) / bandwidth)).sum::<f64>() / (n * bandwidth)
        })
        .collect();

    Some(KdeCurve { xs, ys, bandwidth })
}
