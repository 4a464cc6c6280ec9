//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed counts after the decay onset: `o`
//! - fitted curve: `-` line
//!
//! Decays span orders of magnitude, so a log10 count axis is available.

use crate::domain::FitResult;
use crate::models::predict;

/// Vertical axis transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YScale {
    #[default]
    Linear,
    /// log10 of counts; bins with zero counts are not drawn.
    Log,
}

impl YScale {
    fn apply(self, counts: f64) -> f64 {
        match self {
            YScale::Linear => counts,
            YScale::Log if counts > 0.0 => counts.log10(),
            YScale::Log => f64::NAN,
        }
    }

    fn label(self) -> &'static str {
        match self {
            YScale::Linear => "counts",
            YScale::Log => "log10(counts)",
        }
    }
}

/// Render observed counts and the fitted decay, both in original count units.
pub fn render_decay_plot(fit: &FitResult, width: usize, height: usize, scale: YScale) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(f64, f64)> = fit
        .t_data
        .iter()
        .zip(fit.y_data.iter())
        .map(|(&t, &y)| (t, scale.apply(y * fit.scale_factor)))
        .collect();

    let (t_min, t_max) = t_range(&points).unwrap_or((0.0, 1.0));
    let curve: Vec<(f64, f64)> = sample_curve(fit, t_min, t_max, width)
        .into_iter()
        .map(|(t, y)| (t, scale.apply(y)))
        .collect();

    let (y_min, y_max) = y_range(&points, &curve).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    draw_curve(&mut grid, &curve, t_min, t_max, y_min, y_max);

    for &(t, y) in points.iter().filter(|p| p.1.is_finite()) {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        grid[yy][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: channel {} | t=[{t_min:.3}, {t_max:.3}] ns | {}=[{y_min:.2}, {y_max:.2}]\n",
        fit.channel,
        scale.label()
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn t_range(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let min_t = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_t = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    if min_t.is_finite() && max_t.is_finite() && max_t > min_t {
        Some((min_t, max_t))
    } else {
        None
    }
}

fn sample_curve(fit: &FitResult, t_min: f64, t_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let params = fit.parameters.as_slice();
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let t = t_min + u * (t_max - t_min);
            (t, predict(fit.model, t, params) * fit.scale_factor)
        })
        .collect()
}

fn y_range(points: &[(f64, f64)], curve: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in points.iter().chain(curve).filter(|p| p.1.is_finite()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use nalgebra::DVector;

    fn flat_fit() -> FitResult {
        // Zero amplitude: the fitted curve is the flat background.
        FitResult {
            channel: 4,
            model: ModelKind::OneExp,
            x_values: DVector::from_vec(vec![0.0, 9.0]),
            t_data: DVector::from_vec(vec![0.0, 9.0]),
            y_data: DVector::from_vec(vec![100.0, 110.0]),
            fitted_values: DVector::from_vec(vec![100.0, 100.0]),
            residuals: DVector::from_vec(vec![0.0, 10.0]),
            scale_factor: 1.0,
            decay_start: 0,
            parameters: DVector::from_vec(vec![0.0, 1.0, 100.0]),
            goodness_of_fit: 0.0,
            r_squared: 0.0,
            model_description: ModelKind::OneExp.formula().to_string(),
            report: String::new(),
            collapsed: false,
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let txt = render_decay_plot(&flat_fit(), 10, 5, YScale::Linear);
        let expected = concat!(
            "Plot: channel 4 | t=[0.000, 9.000] ns | counts=[99.50, 110.50]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn log_scale_skips_empty_bins() {
        let mut fit = flat_fit();
        fit.t_data = DVector::from_vec(vec![0.0, 4.5, 9.0]);
        fit.y_data = DVector::from_vec(vec![1000.0, 0.0, 10.0]);
        fit.parameters = DVector::from_vec(vec![990.0, 2.0, 10.0]);

        let txt = render_decay_plot(&fit, 10, 5, YScale::Log);
        assert!(txt.starts_with("Plot: channel 4 | t=[0.000, 9.000] ns | log10(counts)="));
        let marks: usize = txt.lines().skip(1).map(|l| l.matches('o').count()).sum();
        assert_eq!(marks, 2);
    }
}
