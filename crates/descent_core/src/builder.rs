use crate::equation_engine::{is_reserved, normalize_exponent, parse, Bytecode, Compiler, Expr, VM};
use crate::error::{invalid, shape, Result};
use crate::traits::Gradient;
use log::debug;
use std::collections::HashSet;

/// Numeric evaluator for f: ℝⁿ → ℝ.
#[derive(Debug, Clone)]
pub struct FunctionEvaluator {
    code: Bytecode,
    arity: usize,
}

impl FunctionEvaluator {
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Evaluates f at a single point. Non-finite results are returned as-is.
    pub fn evaluate(&self, point: &[f64]) -> Result<f64> {
        check_point(point, self.arity)?;
        let mut stack = Vec::with_capacity(self.code.max_depth());
        VM::execute(&self.code, point, &mut stack)
    }

    /// Elementwise evaluation over coordinate arrays.
    ///
    /// `columns[i][k]` is coordinate `i` of sample `k`; all columns must have the
    /// same length. This is what curve and surface sampling uses.
    pub fn evaluate_many<C: AsRef<[f64]>>(&self, columns: &[C]) -> Result<Vec<f64>> {
        if columns.len() != self.arity {
            return Err(shape(format!(
                "expected {} coordinate arrays, got {}",
                self.arity,
                columns.len()
            )));
        }
        let len = columns.first().map_or(0, |c| c.as_ref().len());
        if columns.iter().any(|c| c.as_ref().len() != len) {
            return Err(shape("coordinate arrays must have equal length"));
        }

        let mut stack = Vec::with_capacity(self.code.max_depth());
        let mut point = vec![0.0; self.arity];
        let mut values = Vec::with_capacity(len);
        for k in 0..len {
            for (slot, column) in point.iter_mut().zip(columns) {
                *slot = column.as_ref()[k];
            }
            values.push(VM::execute(&self.code, &point, &mut stack)?);
        }
        Ok(values)
    }
}

/// Numeric evaluator for ∇f, one compiled partial per declared variable.
#[derive(Debug, Clone)]
pub struct GradientEvaluator {
    partials: Vec<Bytecode>,
}

impl GradientEvaluator {
    /// Evaluates the gradient at `point`; element `i` is ∂f/∂xᵢ.
    pub fn evaluate(&self, point: &[f64]) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.partials.len()];
        self.apply(point, &mut out)?;
        Ok(out)
    }
}

impl Gradient for GradientEvaluator {
    fn dimension(&self) -> usize {
        self.partials.len()
    }

    fn apply(&self, x: &[f64], out: &mut [f64]) -> Result<()> {
        check_point(x, self.partials.len())?;
        check_point(out, self.partials.len())?;
        let depth = self.partials.iter().map(Bytecode::max_depth).max().unwrap_or(0);
        let mut stack = Vec::with_capacity(depth);
        for (slot, code) in out.iter_mut().zip(&self.partials) {
            *slot = VM::execute(code, x, &mut stack)?;
        }
        Ok(())
    }
}

fn check_point(point: &[f64], arity: usize) -> Result<()> {
    if point.len() != arity {
        return Err(shape(format!(
            "expected a point of dimension {arity}, got {}",
            point.len()
        )));
    }
    Ok(())
}

/// A formula together with its symbolic gradient and their compiled forms.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    variables: Vec<String>,
    expression: Expr,
    partials: Vec<Expr>,
    function: FunctionEvaluator,
    gradient: GradientEvaluator,
}

impl CompiledFunction {
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn arity(&self) -> usize {
        self.variables.len()
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    /// Symbolic partial derivatives in declared variable order.
    pub fn partials(&self) -> &[Expr] {
        &self.partials
    }

    pub fn function(&self) -> &FunctionEvaluator {
        &self.function
    }

    pub fn gradient(&self) -> &GradientEvaluator {
        &self.gradient
    }

    pub fn into_parts(self) -> (FunctionEvaluator, GradientEvaluator) {
        (self.function, self.gradient)
    }
}

/// Parses `text` over `variable_names`, differentiates it and compiles both
/// the function and its gradient.
///
/// `^` is accepted as an alias of `**`. Unparseable text and references to
/// undeclared symbols fail with [`Error::Parse`](crate::Error::Parse); a bad
/// variable declaration fails with `InvalidArgument`.
pub fn build<S: AsRef<str>>(text: &str, variable_names: &[S]) -> Result<CompiledFunction> {
    let variables = declare_variables(variable_names)?;
    let normalized = normalize_exponent(text);
    let expression = parse(&normalized, &variables)?;
    let partials = expression.gradient(&variables);

    let compiler = Compiler::new(&variables);
    let function = FunctionEvaluator {
        code: compiler.compile(&expression)?,
        arity: variables.len(),
    };
    let gradient = GradientEvaluator {
        partials: partials
            .iter()
            .map(|p| compiler.compile(p))
            .collect::<Result<_>>()?,
    };

    debug!(
        "built f({}) = {expression}; gradient = [{}]",
        variables.join(", "),
        partials
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(CompiledFunction {
        variables,
        expression,
        partials,
        function,
        gradient,
    })
}

fn declare_variables<S: AsRef<str>>(names: &[S]) -> Result<Vec<String>> {
    if names.is_empty() {
        return Err(invalid("at least one variable must be declared"));
    }
    let mut seen = HashSet::new();
    let mut variables = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(invalid(format!("`{name}` is not a valid variable name")));
        }
        if is_reserved(name) {
            return Err(invalid(format!(
                "`{name}` is reserved for a function or constant"
            )));
        }
        if !seen.insert(name) {
            return Err(invalid(format!("variable `{name}` is declared twice")));
        }
        variables.push(name.to_string());
    }
    Ok(variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn one_variable_function_and_derivative() {
        let compiled = build("x**2 + 3*x + 1", &["x"]).expect("formula should build");
        assert_eq!(compiled.arity(), 1);
        assert_eq!(compiled.partials()[0].to_string(), "2*x + 3");

        let (f, grad) = compiled.into_parts();
        assert_eq!(f.evaluate(&[2.0]).expect("f"), 11.0);
        assert_eq!(grad.evaluate(&[2.0]).expect("grad"), vec![7.0]);
    }

    #[test]
    fn two_variable_gradient_is_positional() {
        let compiled = build("x^2 + y^2", &["x", "y"]).expect("formula should build");
        assert_eq!(compiled.gradient().evaluate(&[1.0, 1.0]).expect("grad"), vec![2.0, 2.0]);

        let skewed = build("x**2 + 5*y", &["x", "y"]).expect("formula should build");
        assert_eq!(skewed.gradient().evaluate(&[3.0, 0.0]).expect("grad"), vec![6.0, 5.0]);

        let swapped = build("x**2 + 5*y", &["y", "x"]).expect("formula should build");
        assert_eq!(swapped.gradient().evaluate(&[0.0, 3.0]).expect("grad"), vec![5.0, 6.0]);
    }

    #[test]
    fn unused_declared_variables_get_zero_partials() {
        let compiled = build("x**2", &["x", "y"]).expect("formula should build");
        assert_eq!(compiled.gradient().evaluate(&[2.0, 9.0]).expect("grad"), vec![4.0, 0.0]);
    }

    #[test]
    fn function_evaluates_elementwise_over_arrays() {
        let compiled = build("x*y", &["x", "y"]).expect("formula should build");
        let xs = [1.0, 2.0, 3.0];
        let ys = [4.0, 5.0, 6.0];
        let values = compiled.function().evaluate_many(&[xs, ys]).expect("values");
        assert_eq!(values, vec![4.0, 10.0, 18.0]);
    }

    #[test]
    fn elementwise_evaluation_rejects_ragged_columns() {
        let compiled = build("x*y", &["x", "y"]).expect("formula should build");
        let err = compiled
            .function()
            .evaluate_many(&[vec![1.0, 2.0], vec![1.0]])
            .expect_err("ragged columns");
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn singular_points_evaluate_to_non_finite_values() {
        let compiled = build("1/x", &["x"]).expect("formula should build");
        assert!(compiled.function().evaluate(&[0.0]).expect("f").is_infinite());
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let err = build("x**", &["x"]).expect_err("dangling operator");
        assert!(matches!(err, Error::Parse(_)), "unexpected error: {err}");
    }

    #[test]
    fn undeclared_symbol_is_a_parse_error() {
        let err = build("x + y", &["x"]).expect_err("y is undeclared");
        match err {
            Error::Parse(parse) => assert!(parse.message.contains("`y`")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn bad_declarations_are_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(build("1", &empty), Err(Error::InvalidArgument(_))));
        assert!(matches!(build("x", &["x", "x"]), Err(Error::InvalidArgument(_))));
        assert!(matches!(build("x", &["x", "sin"]), Err(Error::InvalidArgument(_))));
        assert!(matches!(build("x", &["x", "2y"]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn wrong_dimension_points_are_shape_errors() {
        let compiled = build("x + y", &["x", "y"]).expect("formula should build");
        assert!(matches!(compiled.function().evaluate(&[1.0]), Err(Error::Shape(_))));
        assert!(matches!(compiled.gradient().evaluate(&[1.0]), Err(Error::Shape(_))));
    }

    #[test]
    fn arity_is_not_limited_to_two() {
        let compiled = build("x*y*z", &["x", "y", "z"]).expect("formula should build");
        assert_eq!(
            compiled.gradient().evaluate(&[1.0, 2.0, 3.0]).expect("grad"),
            vec![6.0, 3.0, 2.0]
        );
    }
}
