use crate::error::{invalid, shape, NumericError, Result};
use crate::traits::Gradient;
use crate::viewport::{frame, FramingSettings, Viewport};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DescentSettings {
    /// Step size α applied to the gradient each iteration.
    pub learning_rate: f64,
    /// Upper bound on the number of update iterations.
    pub max_steps: usize,
    /// Iteration stops once ‖x_{k+1} − x_k‖₂ falls below this threshold.
    pub tolerance: f64,
}

impl Default for DescentSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_steps: 50,
            tolerance: 1e-6,
        }
    }
}

impl DescentSettings {
    pub fn new(learning_rate: f64, max_steps: usize) -> Self {
        Self {
            learning_rate,
            max_steps,
            ..Self::default()
        }
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(invalid(format!(
                "learning rate must be finite and positive, got {}",
                self.learning_rate
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(invalid(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Why a descent run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The last update moved less than the tolerance.
    Converged,
    /// All `max_steps` iterations ran.
    BudgetExhausted,
}

/// Ordered points visited by one descent run, starting with the initial point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    dim: usize,
    points: Vec<Vec<f64>>,
    termination: Termination,
}

impl Trajectory {
    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a trajectory holds at least its initial point.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn initial(&self) -> &[f64] {
        &self.points[0]
    }

    pub fn last(&self) -> &[f64] {
        &self.points[self.points.len() - 1]
    }

    /// Number of updates performed.
    pub fn iterations(&self) -> usize {
        self.points.len() - 1
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }

    /// Values of one coordinate along the path (`path[:, axis]`).
    pub fn coordinates(&self, axis: usize) -> Result<Vec<f64>> {
        if axis >= self.dim {
            return Err(shape(format!(
                "axis {axis} out of range for a {}-dimensional trajectory",
                self.dim
            )));
        }
        Ok(self.points.iter().map(|p| p[axis]).collect())
    }

    pub fn frame(&self, settings: &FramingSettings) -> Result<Viewport> {
        frame(&self.points, settings)
    }
}

/// Runs gradient descent from `initial_point`.
///
/// Each iteration computes `next = x − α∇f(x)`. When ‖next − x‖₂ < tolerance
/// the point is appended and the run stops as converged; otherwise it stops
/// after `max_steps` updates. A gradient evaluation that fails or yields a
/// non-finite component, or an update that leaves the finite range, aborts the
/// run with a [`NumericError`] naming the iteration and the point it started
/// from.
pub fn run<G: Gradient + ?Sized>(
    initial_point: &[f64],
    gradient: &G,
    settings: &DescentSettings,
) -> Result<Trajectory> {
    settings.validate()?;
    let dim = gradient.dimension();
    if initial_point.is_empty() {
        return Err(shape("initial point must have positive dimension"));
    }
    if initial_point.len() != dim {
        return Err(shape(format!(
            "initial point has dimension {}, gradient expects {dim}",
            initial_point.len()
        )));
    }
    if initial_point.iter().any(|v| !v.is_finite()) {
        return Err(invalid(format!(
            "initial point must be finite, got {initial_point:?}"
        )));
    }

    let alpha = settings.learning_rate;
    let mut points = Vec::with_capacity(settings.max_steps.saturating_add(1).min(1024));
    points.push(initial_point.to_vec());
    let mut grad = vec![0.0; dim];
    let mut termination = Termination::BudgetExhausted;

    for iteration in 0..settings.max_steps {
        let current = &points[iteration];
        let fail = |reason: String| NumericError {
            iteration,
            point: current.clone(),
            reason,
        };

        gradient
            .apply(current, &mut grad)
            .map_err(|err| fail(format!("gradient evaluation failed: {err}")))?;
        if let Some(i) = grad.iter().position(|g| !g.is_finite()) {
            return Err(fail(format!("gradient component {i} is {}", grad[i])).into());
        }

        let next: Vec<f64> = current
            .iter()
            .zip(&grad)
            .map(|(x, g)| x - alpha * g)
            .collect();
        if next.iter().any(|v| !v.is_finite()) {
            return Err(fail(format!("update overflowed to {next:?}")).into());
        }

        let delta = l2_distance(&next, current);
        points.push(next);
        if delta < settings.tolerance {
            termination = Termination::Converged;
            break;
        }
    }

    debug!(
        "descent finished after {} of {} steps ({:?})",
        points.len() - 1,
        settings.max_steps,
        termination
    );

    Ok(Trajectory {
        dim,
        points,
        termination,
    })
}

fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
