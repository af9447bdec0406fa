use crate::builder::{FunctionEvaluator, GradientEvaluator};
use crate::descent::Trajectory;
use crate::error::{shape, Result};
use crate::traits::Gradient;
use serde::Serialize;

/// One line of the per-iteration table shown next to the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRow {
    pub iteration: usize,
    pub point: Vec<f64>,
    pub value: f64,
    pub gradient: Vec<f64>,
}

/// Evaluates f and ∇f at every point of `trajectory`.
///
/// Values are reported as computed, so a row may hold non-finite numbers.
pub fn iteration_table(
    trajectory: &Trajectory,
    function: &FunctionEvaluator,
    gradient: &GradientEvaluator,
) -> Result<Vec<IterationRow>> {
    let dim = trajectory.dimension();
    if function.arity() != dim || gradient.dimension() != dim {
        return Err(shape(format!(
            "evaluators of arity {}/{} do not match a {dim}-dimensional trajectory",
            function.arity(),
            gradient.dimension()
        )));
    }

    trajectory
        .points()
        .iter()
        .enumerate()
        .map(|(iteration, point)| {
            Ok(IterationRow {
                iteration,
                point: point.clone(),
                value: function.evaluate(point)?,
                gradient: gradient.evaluate(point)?,
            })
        })
        .collect()
}

/// Values of f along the trajectory (the z-coordinates of the drawn path).
pub fn path_values(trajectory: &Trajectory, function: &FunctionEvaluator) -> Result<Vec<f64>> {
    trajectory
        .points()
        .iter()
        .map(|point| function.evaluate(point))
        .collect()
}
