//! Everything the front end needs for one redraw, computed in one call.

use anyhow::{Context, Result};
use descent_core::sampling::{sample, Samples};
use descent_core::table::{iteration_table, path_values, IterationRow};
use descent_core::{run, CompiledFunction, DescentSettings, FramingSettings, Trajectory, Viewport};
use serde::Serialize;

/// Slider positions the app starts with.
pub(crate) const DEFAULT_LEARNING_RATE: f64 = 0.3;
pub(crate) const DEFAULT_STEPS: usize = 8;
pub(crate) const DEFAULT_INITIAL_COORDINATE: f64 = 3.0;

pub(crate) fn interactive_defaults() -> DescentSettings {
    DescentSettings::new(DEFAULT_LEARNING_RATE, DEFAULT_STEPS)
}

#[derive(Debug, Clone, Serialize)]
pub struct PlotData {
    pub trajectory: Trajectory,
    /// f evaluated at each trajectory point.
    pub path_values: Vec<f64>,
    pub viewport: Viewport,
    pub samples: Samples,
    pub table: Vec<IterationRow>,
}

pub(crate) fn simulate(
    compiled: &CompiledFunction,
    initial_point: &[f64],
    descent: &DescentSettings,
    framing: &FramingSettings,
    samples: usize,
) -> Result<PlotData> {
    let trajectory = run(initial_point, compiled.gradient(), descent)
        .context("Gradient descent failed")?;
    let viewport = trajectory
        .frame(framing)
        .context("Failed to frame the trajectory")?;
    let samples = sample(compiled.function(), &viewport, samples)
        .context("Failed to sample the function")?;
    let path_values = path_values(&trajectory, compiled.function())
        .context("Failed to evaluate the function along the path")?;
    let table = iteration_table(&trajectory, compiled.function(), compiled.gradient())
        .context("Failed to build the iteration table")?;

    Ok(PlotData {
        trajectory,
        path_values,
        viewport,
        samples,
        table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use descent_core::sampling::DEFAULT_SAMPLES;
    use descent_core::{build, Error};

    #[test]
    fn simulate_one_variable_produces_a_curve() {
        let compiled = build("x**2 + 3*x + 1", &["x"]).expect("formula should build");
        let data = simulate(
            &compiled,
            &[DEFAULT_INITIAL_COORDINATE],
            &interactive_defaults(),
            &FramingSettings::default(),
            DEFAULT_SAMPLES,
        )
        .expect("simulation should succeed");

        assert_eq!(data.trajectory.len(), DEFAULT_STEPS + 1);
        assert_eq!(data.table.len(), data.trajectory.len());
        assert_eq!(data.path_values.len(), data.trajectory.len());
        assert_eq!(data.path_values[0], 19.0);
        match &data.samples {
            Samples::Curve(curve) => assert_eq!(curve.xs.len(), DEFAULT_SAMPLES),
            other => panic!("expected a curve, got {other:?}"),
        }
        for point in data.trajectory.points() {
            assert!(data.viewport.contains(point));
        }
    }

    #[test]
    fn simulate_two_variables_produces_a_surface() {
        let compiled = build("x^2 + y^2", &["x", "y"]).expect("formula should build");
        let data = simulate(
            &compiled,
            &[DEFAULT_INITIAL_COORDINATE, DEFAULT_INITIAL_COORDINATE],
            &interactive_defaults(),
            &FramingSettings::default(),
            20,
        )
        .expect("simulation should succeed");

        assert_eq!(data.viewport.dimension(), 2);
        match &data.samples {
            Samples::Surface(surface) => assert_eq!(surface.values.len(), 400),
            other => panic!("expected a surface, got {other:?}"),
        }
    }

    #[test]
    fn descent_failures_keep_their_kind_under_context() {
        let compiled = build("1/x", &["x"]).expect("formula should build");
        let err = simulate(
            &compiled,
            &[-1.0],
            &DescentSettings::new(1.0, 5),
            &FramingSettings::default(),
            DEFAULT_SAMPLES,
        )
        .expect_err("descent hits the singularity");

        assert!(format!("{err:#}").starts_with("Gradient descent failed"));
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Numeric(_))
        ));
    }

    #[test]
    fn three_variables_cannot_be_framed() {
        let compiled = build("x + y + z", &["x", "y", "z"]).expect("formula should build");
        let err = simulate(
            &compiled,
            &[0.0, 0.0, 0.0],
            &DescentSettings::new(0.1, 2),
            &FramingSettings::default(),
            DEFAULT_SAMPLES,
        )
        .expect_err("framing is limited to two dimensions");
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Shape(_))));
    }
}
