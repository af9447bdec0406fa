//! Grids of function values over a [`Viewport`], ready for a chart.

use crate::builder::FunctionEvaluator;
use crate::error::{invalid, shape, Result};
use crate::viewport::Viewport;
use serde::Serialize;

/// Samples per axis used by the default curve and surface plots.
pub const DEFAULT_SAMPLES: usize = 100;

/// `n` evenly spaced values from `min` to `max`, both included.
pub fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| min + step * i as f64).collect();
            values[n - 1] = max;
            values
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveSamples {
    pub xs: Vec<f64>,
    pub values: Vec<f64>,
}

/// Row-major grid: `values[j * xs.len() + i] = f(xs[i], ys[j])`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceSamples {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub values: Vec<f64>,
}

impl SurfaceSamples {
    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.values[j * self.xs.len() + i]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Samples {
    Curve(CurveSamples),
    Surface(SurfaceSamples),
}

fn check_request(function: &FunctionEvaluator, viewport: &Viewport, samples: usize) -> Result<()> {
    if samples < 2 {
        return Err(invalid(format!(
            "at least 2 samples per axis are needed, got {samples}"
        )));
    }
    if function.arity() != viewport.dimension() {
        return Err(shape(format!(
            "a function of {} variable(s) cannot be sampled over a {}-dimensional viewport",
            function.arity(),
            viewport.dimension()
        )));
    }
    Ok(())
}

/// Samples a one-variable function across an interval viewport.
pub fn sample_curve(
    function: &FunctionEvaluator,
    viewport: &Viewport,
    samples: usize,
) -> Result<CurveSamples> {
    check_request(function, viewport, samples)?;
    let (x_min, x_max) = viewport.x_range();
    let xs = linspace(x_min, x_max, samples);
    let values = function.evaluate_many(&[xs.as_slice()])?;
    Ok(CurveSamples { xs, values })
}

/// Samples a two-variable function over a rectangle viewport.
pub fn sample_surface(
    function: &FunctionEvaluator,
    viewport: &Viewport,
    samples: usize,
) -> Result<SurfaceSamples> {
    check_request(function, viewport, samples)?;
    let (x_min, x_max) = viewport.x_range();
    let (y_min, y_max) = viewport
        .y_range()
        .ok_or_else(|| shape("surface sampling needs a rectangle viewport"))?;
    let xs = linspace(x_min, x_max, samples);
    let ys = linspace(y_min, y_max, samples);

    let mut grid_x = Vec::with_capacity(samples * samples);
    let mut grid_y = Vec::with_capacity(samples * samples);
    for &y in &ys {
        for &x in &xs {
            grid_x.push(x);
            grid_y.push(y);
        }
    }
    let values = function.evaluate_many(&[grid_x, grid_y])?;
    Ok(SurfaceSamples { xs, ys, values })
}

/// Picks curve or surface sampling from the viewport's dimension.
pub fn sample(
    function: &FunctionEvaluator,
    viewport: &Viewport,
    samples: usize,
) -> Result<Samples> {
    match viewport {
        Viewport::Interval { .. } => sample_curve(function, viewport, samples).map(Samples::Curve),
        Viewport::Rectangle { .. } => {
            sample_surface(function, viewport, samples).map(Samples::Surface)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::error::Error;

    #[test]
    fn linspace_includes_both_ends() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(-0.3, 0.7, 100).last(), Some(&0.7));
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(2.0, 3.0, 0).is_empty());
    }

    #[test]
    fn curve_samples_the_whole_interval() {
        let compiled = build("x**2", &["x"]).expect("formula");
        let viewport = Viewport::Interval {
            x_min: -2.0,
            x_max: 2.0,
        };
        let curve = sample_curve(compiled.function(), &viewport, 5).expect("curve");
        assert_eq!(curve.xs, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(curve.values, vec![4.0, 1.0, 0.0, 1.0, 4.0]);
    }

    #[test]
    fn surface_rows_follow_y() {
        let compiled = build("x - 10*y", &["x", "y"]).expect("formula");
        let viewport = Viewport::Rectangle {
            x_min: 0.0,
            x_max: 2.0,
            y_min: 0.0,
            y_max: 1.0,
        };
        let surface = sample_surface(compiled.function(), &viewport, 3).expect("surface");
        assert_eq!(surface.values.len(), 9);
        assert_eq!(surface.at(2, 0), 2.0);
        assert_eq!(surface.at(0, 2), -10.0);
        assert_eq!(surface.at(1, 1), 1.0 - 5.0);
    }

    #[test]
    fn default_resolution_matches_the_plots() {
        let compiled = build("x**2 + y**2", &["x", "y"]).expect("formula");
        let viewport = Viewport::Rectangle {
            x_min: -1.0,
            x_max: 1.0,
            y_min: -1.0,
            y_max: 1.0,
        };
        match sample(compiled.function(), &viewport, DEFAULT_SAMPLES).expect("samples") {
            Samples::Surface(surface) => {
                assert_eq!(surface.xs.len(), 100);
                assert_eq!(surface.values.len(), 100 * 100);
            }
            other => panic!("expected a surface, got {other:?}"),
        }
    }

    #[test]
    fn singular_samples_stay_in_the_output() {
        let compiled = build("1/x", &["x"]).expect("formula");
        let viewport = Viewport::Interval {
            x_min: -1.0,
            x_max: 1.0,
        };
        let curve = sample_curve(compiled.function(), &viewport, 3).expect("curve");
        assert!(curve.values[1].is_infinite());
    }

    #[test]
    fn mismatched_requests_are_rejected() {
        let compiled = build("x", &["x"]).expect("formula");
        let rectangle = Viewport::Rectangle {
            x_min: 0.0,
            x_max: 1.0,
            y_min: 0.0,
            y_max: 1.0,
        };
        assert!(matches!(
            sample(compiled.function(), &rectangle, 10),
            Err(Error::Shape(_))
        ));
        let interval = Viewport::Interval {
            x_min: 0.0,
            x_max: 1.0,
        };
        assert!(matches!(
            sample(compiled.function(), &interval, 1),
            Err(Error::InvalidArgument(_))
        ));
    }
}
