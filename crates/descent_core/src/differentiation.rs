//! Symbolic first derivatives of [`Expr`] trees.
//!
//! The rules are the textbook ones (sum, product, quotient, power, chain).
//! Results are built through small folding constructors so that `d/dx x**2`
//! comes out as `2*x` rather than `2*x**(2 - 1)*1`; no other simplification
//! is attempted.

use crate::equation_engine::{BinaryOp, Expr, Function};

impl Expr {
    /// Partial derivative with respect to `var`.
    pub fn derivative(&self, var: &str) -> Expr {
        match self {
            Expr::Number(_) | Expr::Constant(_) => num(0.0),
            Expr::Variable(name) => num(if name == var { 1.0 } else { 0.0 }),
            Expr::Neg(operand) => neg(operand.derivative(var)),
            Expr::Binary(left, op, right) => {
                let (l, r) = (left.as_ref(), right.as_ref());
                match op {
                    BinaryOp::Add => add(l.derivative(var), r.derivative(var)),
                    BinaryOp::Sub => sub(l.derivative(var), r.derivative(var)),
                    BinaryOp::Mul => add(
                        mul(l.derivative(var), r.clone()),
                        mul(l.clone(), r.derivative(var)),
                    ),
                    BinaryOp::Div => div(
                        sub(
                            mul(l.derivative(var), r.clone()),
                            mul(l.clone(), r.derivative(var)),
                        ),
                        pow(r.clone(), num(2.0)),
                    ),
                    BinaryOp::Pow => power_rule(l, r, var),
                }
            }
            Expr::Call(func, arg) => chain_rule(*func, arg, var),
        }
    }

    /// Gradient as one partial derivative per variable, in the given order.
    pub fn gradient<S: AsRef<str>>(&self, vars: &[S]) -> Vec<Expr> {
        vars.iter().map(|v| self.derivative(v.as_ref())).collect()
    }
}

fn power_rule(base: &Expr, exponent: &Expr, var: &str) -> Expr {
    let base_varies = base.depends_on(var);
    let exponent_varies = exponent.depends_on(var);

    match (base_varies, exponent_varies) {
        (false, false) => num(0.0),
        // d(u**n) = n*u**(n - 1)*du
        (true, false) => mul(
            mul(
                exponent.clone(),
                pow(base.clone(), sub(exponent.clone(), num(1.0))),
            ),
            base.derivative(var),
        ),
        // d(a**v) = a**v*log(a)*dv
        (false, true) => mul(
            mul(pow(base.clone(), exponent.clone()), call(Function::Ln, base.clone())),
            exponent.derivative(var),
        ),
        // d(u**v) = u**v*(dv*log(u) + v*du/u)
        (true, true) => mul(
            pow(base.clone(), exponent.clone()),
            add(
                mul(exponent.derivative(var), call(Function::Ln, base.clone())),
                div(mul(exponent.clone(), base.derivative(var)), base.clone()),
            ),
        ),
    }
}

fn chain_rule(func: Function, arg: &Expr, var: &str) -> Expr {
    let inner = arg.derivative(var);
    let u = arg.clone();
    match func {
        Function::Sin => mul(call(Function::Cos, u), inner),
        Function::Cos => mul(neg(call(Function::Sin, u)), inner),
        Function::Tan => mul(add(pow(call(Function::Tan, u), num(2.0)), num(1.0)), inner),
        Function::Exp => mul(call(Function::Exp, u), inner),
        Function::Ln => div(inner, u),
        Function::Sqrt => div(inner, mul(num(2.0), call(Function::Sqrt, u))),
        Function::Sinh => mul(call(Function::Cosh, u), inner),
        Function::Cosh => mul(call(Function::Sinh, u), inner),
        Function::Tanh => mul(sub(num(1.0), pow(call(Function::Tanh, u), num(2.0))), inner),
    }
}

// --- folding constructors ---
//
// Constant subtrees are only folded when the result is finite, so every
// folded `Expr` still renders as parseable text.

fn num(n: f64) -> Expr {
    Expr::Number(n)
}

fn as_number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Number(n) => Some(*n),
        _ => None,
    }
}

fn is_number(expr: &Expr, value: f64) -> bool {
    as_number(expr) == Some(value)
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary(Box::new(left), op, Box::new(right))
}

fn call(func: Function, arg: Expr) -> Expr {
    Expr::Call(func, Box::new(arg))
}

fn neg(a: Expr) -> Expr {
    match a {
        Expr::Number(n) => num(-n),
        Expr::Neg(inner) => *inner,
        Expr::Binary(left, BinaryOp::Mul, right) if as_number(&left).is_some() => {
            mul(neg(*left), *right)
        }
        other => Expr::Neg(Box::new(other)),
    }
}

fn add(a: Expr, b: Expr) -> Expr {
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) if (x + y).is_finite() => num(x + y),
        (Some(x), _) if x == 0.0 => b,
        (_, Some(y)) if y == 0.0 => a,
        _ => binary(a, BinaryOp::Add, b),
    }
}

fn sub(a: Expr, b: Expr) -> Expr {
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) if (x - y).is_finite() => num(x - y),
        (_, Some(y)) if y == 0.0 => a,
        (Some(x), _) if x == 0.0 => neg(b),
        _ => binary(a, BinaryOp::Sub, b),
    }
}

fn mul(a: Expr, b: Expr) -> Expr {
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) if (x * y).is_finite() => num(x * y),
        (Some(x), _) | (_, Some(x)) if x == 0.0 => num(0.0),
        (Some(x), _) if x == 1.0 => b,
        (_, Some(y)) if y == 1.0 => a,
        (Some(x), _) if x == -1.0 => neg(b),
        (_, Some(y)) if y == -1.0 => neg(a),
        // Coefficients go in front.
        (None, Some(_)) => binary(b, BinaryOp::Mul, a),
        _ => binary(a, BinaryOp::Mul, b),
    }
}

fn div(a: Expr, b: Expr) -> Expr {
    match (as_number(&a), as_number(&b)) {
        (Some(x), _) if x == 0.0 => num(0.0),
        (_, Some(y)) if y == 1.0 => a,
        (Some(x), Some(y)) if (x / y).is_finite() => num(x / y),
        _ => binary(a, BinaryOp::Div, b),
    }
}

fn pow(a: Expr, b: Expr) -> Expr {
    if is_number(&b, 1.0) {
        return a;
    }
    if is_number(&b, 0.0) {
        return num(1.0);
    }
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) if x.powf(y).is_finite() => num(x.powf(y)),
        _ => binary(a, BinaryOp::Pow, b),
    }
}

#[cfg(test)]
mod tests {
    use super::{div, mul, num, pow};
    use crate::equation_engine::{parse, Compiler, Expr, VM};

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn derive(text: &str, names: &[&str], var: &str) -> Expr {
        parse(text, &vars(names))
            .expect("expression should parse")
            .derivative(var)
    }

    fn eval(expr: &Expr, names: &[&str], point: &[f64]) -> f64 {
        let code = Compiler::new(&vars(names))
            .compile(expr)
            .expect("derivative should compile");
        VM::execute(&code, point, &mut Vec::new()).expect("bytecode should run")
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-10,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn polynomial_derivatives_fold_to_closed_form() {
        assert_eq!(derive("x**2", &["x"], "x").to_string(), "2*x");
        assert_eq!(derive("x**2 + 3*x + 1", &["x"], "x").to_string(), "2*x + 3");
        assert_eq!(derive("5", &["x"], "x").to_string(), "0");
        assert_eq!(derive("x", &["x"], "x").to_string(), "1");
    }

    #[test]
    fn partials_treat_other_variables_as_constants() {
        assert_eq!(derive("x**2 + y**2", &["x", "y"], "x").to_string(), "2*x");
        assert_eq!(derive("x**2 + y**2", &["x", "y"], "y").to_string(), "2*y");
        let dx = derive("x*y", &["x", "y"], "x");
        assert_close(eval(&dx, &["x", "y"], &[4.0, 7.0]), 7.0);
    }

    #[test]
    fn gradient_follows_declared_order() {
        let names = vars(&["x", "y"]);
        let expr = parse("x**2 + 3*y", &names).expect("expression should parse");
        let grad = expr.gradient(&names);
        assert_eq!(grad.len(), 2);
        assert_eq!(grad[0].to_string(), "2*x");
        assert_eq!(grad[1].to_string(), "3");

        let reversed = expr.gradient(&["y", "x"]);
        assert_eq!(reversed[0].to_string(), "3");
    }

    #[test]
    fn quotient_rule_matches_hand_computation() {
        // d/dx 1/x = -1/x**2
        let d = derive("1/x", &["x"], "x");
        assert_close(eval(&d, &["x"], &[2.0]), -0.25);
        // d/dx x/(1 + x) = 1/(1 + x)**2
        let d = derive("x/(1 + x)", &["x"], "x");
        assert_close(eval(&d, &["x"], &[1.0]), 0.25);
    }

    #[test]
    fn chain_rule_covers_elementary_functions() {
        let x = 0.7_f64;
        let cases: [(&str, f64); 9] = [
            ("sin(2*x)", 2.0 * (2.0 * x).cos()),
            ("cos(x**2)", -(x * x).sin() * 2.0 * x),
            ("tan(x)", 1.0 + x.tan().powi(2)),
            ("exp(3*x)", 3.0 * (3.0 * x).exp()),
            ("log(x**2 + 1)", 2.0 * x / (x * x + 1.0)),
            ("sqrt(x)", 0.5 / x.sqrt()),
            ("sinh(x)", x.cosh()),
            ("cosh(x)", x.sinh()),
            ("tanh(x)", 1.0 - x.tanh().powi(2)),
        ];
        for (text, expected) in cases {
            let d = derive(text, &["x"], "x");
            assert_close(eval(&d, &["x"], &[x]), expected);
        }
    }

    #[test]
    fn power_rule_handles_variable_exponents() {
        // d/dx 2**x = 2**x*log(2)
        let d = derive("2**x", &["x"], "x");
        assert_close(eval(&d, &["x"], &[3.0]), 8.0 * 2f64.ln());
        // d/dx x**x = x**x*(log(x) + 1)
        let d = derive("x**x", &["x"], "x");
        assert_close(eval(&d, &["x"], &[2.0]), 4.0 * (2f64.ln() + 1.0));
    }

    #[test]
    fn negation_and_constants_differentiate() {
        assert_eq!(derive("-x", &["x"], "x").to_string(), "-1");
        assert_eq!(derive("pi*x", &["x"], "x").to_string(), "pi");
        assert_eq!(derive("-(x**3)", &["x"], "x").to_string(), "-3*x**2");
    }

    #[test]
    fn non_finite_constants_are_left_unfolded() {
        let names = vars(&["x"]);
        for expr in [
            pow(num(0.0), num(-1.0)),
            mul(num(1e200), num(1e200)),
            div(num(1.0), num(0.0)),
        ] {
            let text = expr.to_string();
            assert!(!text.contains("inf") && !text.contains("NaN"), "rendered `{text}`");
            let reparsed = parse(&text, &names).expect("rendered text should parse");
            assert_eq!(reparsed.to_string(), text);
        }
        assert_eq!(pow(num(0.0), num(-1.0)).to_string(), "0**(-1)");
        assert_eq!(mul(num(2.0), num(3.0)), num(6.0));
    }
}
