//! Weighted Gaussian kernel density estimate of each posterior proportion column.
//!
//! Curves are evaluated on a uniform grid over [0, 1] and area-normalized one
//! at a time, so each source's curve integrates to 1 on its own.

use serde::Serialize;

use crate::inference::{effective_sample_size, Posterior};
use crate::model::SOURCE_COUNT;

/// Grid points per curve unless configured otherwise.
pub const DEFAULT_GRID_SIZE: usize = 200;

/// One density curve over the proportion axis.
#[derive(Debug, Clone, Serialize)]
pub struct DensityCurve {
    pub source: String,
    pub bandwidth: f64,
    pub x: Vec<f64>,
    pub density: Vec<f64>,
}

impl DensityCurve {
    pub fn peak(&self) -> f64 {
        self.density.iter().copied().fold(0.0, f64::max)
    }

    /// Trapezoidal area under the curve.
    pub fn area(&self) -> f64 {
        trapezoid(&self.x, &self.density)
    }
}

/// Uniform grid over [0, 1], at least two points.
pub fn build_grid(steps: usize) -> Vec<f64> {
    let count = steps.max(2);
    let denom = (count - 1) as f64;
    (0..count).map(|i| i as f64 / denom).collect()
}

/// Scott's rule with Kish effective sample size and the unbiased weighted
/// standard deviation. `None` when the spread is zero or undefined.
pub fn scott_bandwidth(values: &[f64], weights: &[f64]) -> Option<f64> {
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    let denom = 1.0 - sum_sq;
    if denom <= 0.0 {
        return None;
    }
    let mean: f64 = values.iter().zip(weights).map(|(x, w)| x * w).sum();
    let var = values
        .iter()
        .zip(weights)
        .map(|(x, w)| w * (x - mean) * (x - mean))
        .sum::<f64>()
        / denom;
    let neff = effective_sample_size(weights);
    let bw = var.sqrt() * neff.powf(-0.2);
    (bw.is_finite() && bw > 0.0).then_some(bw)
}

/// Weighted KDE of `values` on `grid`. Weights must already sum to 1.
pub fn weighted_kde(values: &[f64], weights: &[f64], grid: &[f64], bandwidth: f64) -> Vec<f64> {
    let norm = 1.0 / (bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    grid.iter()
        .map(|&g| {
            values
                .iter()
                .zip(weights)
                .filter(|(_, &w)| w > 0.0)
                .map(|(&x, &w)| {
                    let z = (g - x) / bandwidth;
                    w * (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm
        })
        .collect()
}

/// One area-normalized curve per source, in source order.
pub fn estimate_curves(
    posterior: &Posterior,
    names: [&str; SOURCE_COUNT],
    grid_size: usize,
) -> Vec<DensityCurve> {
    let grid = build_grid(grid_size);
    let step = grid[1] - grid[0];
    let weights = posterior.weights();

    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let column = posterior.column(idx);
            // narrower kernels fall between grid points
            let bandwidth = scott_bandwidth(&column, weights)
                .unwrap_or(step)
                .max(step);
            let mut density = weighted_kde(&column, weights, &grid, bandwidth);
            let area = trapezoid(&grid, &density);
            if area > 0.0 {
                for d in &mut density {
                    *d /= area;
                }
            }
            DensityCurve {
                source: name.to_string(),
                bandwidth,
                x: grid.clone(),
                density,
            }
        })
        .collect()
}

fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (ys[0] + ys[1]) * (xs[1] - xs[0]))
        .sum()
}
