use crate::error::Result;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types the bytecode VM can evaluate over.
/// Must support basic arithmetic, the elementary functions, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A numeric gradient field ∇f: ℝⁿ → ℝⁿ.
///
/// The descent engine only sees this trait, so it can be driven by a compiled
/// symbolic gradient or by a hand-written closure alike.
pub trait Gradient {
    /// Returns n, the length of both the input point and the output vector.
    fn dimension(&self) -> usize;

    /// Evaluates the gradient at `x`.
    /// x: point of length `dimension()`
    /// out: buffer of length `dimension()` receiving ∂f/∂xᵢ in variable order
    fn apply(&self, x: &[f64], out: &mut [f64]) -> Result<()>;
}

impl<G: Gradient + ?Sized> Gradient for &G {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn apply(&self, x: &[f64], out: &mut [f64]) -> Result<()> {
        (**self).apply(x, out)
    }
}

/// Adapts a closure into a [`Gradient`] of fixed dimension.
pub struct FnGradient<F> {
    dimension: usize,
    f: F,
}

impl<F> FnGradient<F>
where
    F: Fn(&[f64], &mut [f64]),
{
    pub fn new(dimension: usize, f: F) -> Self {
        Self { dimension, f }
    }
}

impl<F> Gradient for FnGradient<F>
where
    F: Fn(&[f64], &mut [f64]),
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn apply(&self, x: &[f64], out: &mut [f64]) -> Result<()> {
        (self.f)(x, out);
        Ok(())
    }
}

/// Adapts a fallible closure into a [`Gradient`]; an `Err` aborts the descent.
pub struct TryFnGradient<F> {
    dimension: usize,
    f: F,
}

impl<F> TryFnGradient<F>
where
    F: Fn(&[f64], &mut [f64]) -> Result<()>,
{
    pub fn new(dimension: usize, f: F) -> Self {
        Self { dimension, f }
    }
}

impl<F> Gradient for TryFnGradient<F>
where
    F: Fn(&[f64], &mut [f64]) -> Result<()>,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn apply(&self, x: &[f64], out: &mut [f64]) -> Result<()> {
        (self.f)(x, out)
    }
}
