//! The `descent_core` crate computes gradient-descent trajectories over
//! user-supplied formulas in one or more variables and frames them for plotting.
//!
//! Key components:
//! - **Equation Engine**: parser, AST and a small bytecode VM for user formulas.
//! - **Differentiation**: symbolic first derivatives of the AST.
//! - **Builder**: `build(text, vars)` turns a formula into a function evaluator
//!   and an exact gradient evaluator; `EvaluatorCache` memoizes it.
//! - **Descent**: the fixed-step gradient-descent loop and its `Trajectory`.
//! - **Viewport**: the padded, floored window around a trajectory.
//! - **Sampling / Table**: curve/surface grids and per-iteration rows for display.
pub mod builder;
pub mod cache;
pub mod descent;
pub mod differentiation;
pub mod equation_engine;
pub mod error;
pub mod sampling;
pub mod table;
pub mod traits;
pub mod viewport;

pub use builder::{build, CompiledFunction, FunctionEvaluator, GradientEvaluator};
pub use cache::EvaluatorCache;
pub use descent::{run, DescentSettings, Termination, Trajectory};
pub use error::{Error, NumericError, ParseError, Result};
pub use traits::{FnGradient, Gradient, TryFnGradient};
pub use viewport::{frame, FramingSettings, Viewport};
