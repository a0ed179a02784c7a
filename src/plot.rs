//! PNG rendering of posterior density curves.
//! One translucent filled curve per source over the [0, 1] proportion axis.

use image::{Rgb, RgbImage};
use std::path::Path;

use crate::density::DensityCurve;
use crate::error::RenderError;

/// Matplotlib's first three cycle colours.
const PALETTE: [[u8; 3]; 3] = [[31, 119, 180], [255, 127, 14], [44, 160, 44]];

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const FILL_ALPHA: f32 = 0.25;

const MARGIN_LEFT: u32 = 60;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 20;
const MARGIN_BOTTOM: u32 = 50;

/// Default figure size, 12×5 at 100 dpi.
pub const DEFAULT_SIZE: (u32, u32) = (1200, 500);

pub fn render_curves(curves: &[DensityCurve], width: u32, height: u32) -> Result<RgbImage, RenderError> {
    if curves.is_empty() {
        return Err(RenderError::Empty("no curves"));
    }
    if width <= MARGIN_LEFT + MARGIN_RIGHT + 1 || height <= MARGIN_TOP + MARGIN_BOTTOM + 1 {
        return Err(RenderError::TooSmall { width, height });
    }
    let y_max = curves.iter().map(DensityCurve::peak).fold(0.0, f64::max) * 1.05;
    if !(y_max.is_finite() && y_max > 0.0) {
        return Err(RenderError::Empty("all curves are flat"));
    }

    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    let x0 = MARGIN_LEFT;
    let x1 = width - MARGIN_RIGHT;
    let y_top = MARGIN_TOP;
    let y_base = height - MARGIN_BOTTOM;
    let plot_w = (x1 - x0) as f64;
    let plot_h = (y_base - y_top) as f64;

    for (idx, curve) in curves.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        let mut prev: Option<u32> = None;
        for px in x0..=x1 {
            let t = (px - x0) as f64 / plot_w;
            let value = interp(t, &curve.x, &curve.density);
            let py = y_base - ((value / y_max) * plot_h).round().clamp(0.0, plot_h) as u32;

            for y in py..y_base {
                blend(&mut img, px, y, color, FILL_ALPHA);
            }

            // outline: join to the previous column so steep flanks stay connected
            let (lo, hi) = match prev {
                Some(p) => (p.min(py), p.max(py)),
                None => (py, py),
            };
            for y in lo.saturating_sub(1)..=hi.min(y_base) {
                img.put_pixel(px, y, Rgb(color));
            }
            prev = Some(py);
        }
    }

    draw_axes(&mut img, x0, x1, y_top, y_base);
    Ok(img)
}

pub fn save_png(curves: &[DensityCurve], path: &Path) -> Result<(), RenderError> {
    let (w, h) = DEFAULT_SIZE;
    let img = render_curves(curves, w, h)?;
    img.save(path)?;
    Ok(())
}

fn draw_axes(img: &mut RgbImage, x0: u32, x1: u32, y_top: u32, y_base: u32) {
    for x in x0..=x1 {
        img.put_pixel(x, y_base, AXIS);
    }
    for y in y_top..=y_base {
        img.put_pixel(x0, y, AXIS);
    }
    // ticks every 0.2 on the proportion axis
    for i in 0..=5 {
        let x = x0 + ((x1 - x0) as f64 * i as f64 / 5.0).round() as u32;
        for y in y_base..(y_base + 6).min(img.height()) {
            img.put_pixel(x, y, AXIS);
        }
    }
}

fn blend(img: &mut RgbImage, x: u32, y: u32, color: [u8; 3], alpha: f32) {
    let px = img.get_pixel_mut(x, y);
    for (c, &src) in px.0.iter_mut().zip(&color) {
        *c = (*c as f32 * (1.0 - alpha) + src as f32 * alpha).round() as u8;
    }
}

/// Linear interpolation of `vs` at `x` over ascending `xs`, clamped at the ends.
fn interp(x: f64, xs: &[f64], vs: &[f64]) -> f64 {
    if xs.is_empty() || vs.is_empty() {
        return 0.0;
    }
    if x <= xs[0] {
        return vs[0];
    }
    if x >= xs[xs.len() - 1] {
        return *vs.last().unwrap_or(&0.0);
    }
    let idx = xs.partition_point(|&v| v < x).min(xs.len() - 1);
    if idx == 0 {
        return vs[0];
    }
    let (a, b) = (xs[idx - 1], xs[idx]);
    let t = if b > a { (x - a) / (b - a) } else { 0.0 };
    vs[idx - 1] + (vs[idx] - vs[idx - 1]) * t
}
