//! Browser bindings for `descent_core`.

mod session;

use descent_core::{build, CompiledFunction, DescentSettings, FramingSettings};
use serde::de::DeserializeOwned;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub use session::PlotData;

/// A formula compiled once and reused for every redraw.
#[wasm_bindgen]
pub struct WasmObjective {
    compiled: CompiledFunction,
}

fn settings_or_default<T>(value: JsValue, what: &str) -> Result<T, JsValue>
where
    T: DeserializeOwned + Default,
{
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid {} settings: {}", what, e)))
}

#[wasm_bindgen]
impl WasmObjective {
    #[wasm_bindgen(constructor)]
    pub fn new(expression: String, var_names: Vec<String>) -> Result<WasmObjective, JsValue> {
        console_error_panic_hook::set_once();

        let compiled =
            build(&expression, &var_names).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmObjective { compiled })
    }

    pub fn arity(&self) -> usize {
        self.compiled.arity()
    }

    pub fn variables(&self) -> Vec<String> {
        self.compiled.variables().to_vec()
    }

    /// The parsed formula, printed back in canonical form.
    pub fn expression(&self) -> String {
        self.compiled.expression().to_string()
    }

    /// One rendered partial derivative per variable.
    pub fn partials(&self) -> Vec<String> {
        self.compiled
            .partials()
            .iter()
            .map(|partial| partial.to_string())
            .collect()
    }

    pub fn evaluate(&self, point: &[f64]) -> Result<f64, JsValue> {
        self.compiled
            .function()
            .evaluate(point)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn gradient(&self, point: &[f64]) -> Result<Vec<f64>, JsValue> {
        self.compiled
            .gradient()
            .evaluate(point)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Runs the descent from `initial_point`, frames it and samples the
    /// formula over the frame. Omitted settings fall back to their defaults.
    pub fn simulate(
        &self,
        initial_point: Vec<f64>,
        descent_settings: JsValue,
        framing_settings: JsValue,
        samples: usize,
    ) -> Result<JsValue, JsValue> {
        let descent: DescentSettings = settings_or_default(descent_settings, "descent")?;
        let framing: FramingSettings = settings_or_default(framing_settings, "framing")?;

        let data = session::simulate(&self.compiled, &initial_point, &descent, &framing, samples)
            .map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;

        to_value(&data).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

/// Settings the controls start from: α = 0.3 and 8 steps.
#[wasm_bindgen]
pub fn default_descent_settings() -> Result<JsValue, JsValue> {
    to_value(&session::interactive_defaults())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
pub fn default_framing_settings() -> Result<JsValue, JsValue> {
    to_value(&FramingSettings::default())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Starting coordinate used for every axis of a fresh session.
#[wasm_bindgen]
pub fn default_initial_point(arity: usize) -> Vec<f64> {
    vec![session::DEFAULT_INITIAL_COORDINATE; arity]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn objective_reports_formula_and_partials() {
        let objective = WasmObjective::new("x^2 + x*y".to_string(), names(&["x", "y"]))
            .unwrap_or_else(|_| panic!("formula should build"));

        assert_eq!(objective.arity(), 2);
        assert_eq!(objective.variables(), names(&["x", "y"]));
        assert_eq!(objective.expression(), "x**2 + x*y");
        assert_eq!(objective.partials(), names(&["2*x + y", "x"]));
    }

    #[test]
    fn objective_evaluates_function_and_gradient() {
        let objective = WasmObjective::new("x**2 + 3*x + 1".to_string(), names(&["x"]))
            .unwrap_or_else(|_| panic!("formula should build"));

        assert_eq!(objective.evaluate(&[2.0]).ok(), Some(11.0));
        assert_eq!(objective.gradient(&[2.0]).ok(), Some(vec![7.0]));
    }

    #[test]
    fn fresh_sessions_start_at_three() {
        assert_eq!(default_initial_point(2), vec![3.0, 3.0]);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn unknown_symbols_are_reported_to_javascript() {
        let result = WasmObjective::new("x + q".to_string(), vec!["x".to_string()]);
        let message = result
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains('q'));
    }

    #[wasm_bindgen_test]
    fn simulate_accepts_default_settings() {
        let objective = WasmObjective::new("x**2".to_string(), vec!["x".to_string()])
            .expect("formula should build");
        let data = objective
            .simulate(
                vec![3.0],
                JsValue::UNDEFINED,
                JsValue::UNDEFINED,
                descent_core::sampling::DEFAULT_SAMPLES,
            )
            .expect("simulation should succeed");
        assert!(data.is_object());
    }

    #[wasm_bindgen_test]
    fn simulate_rejects_bad_settings() {
        let objective = WasmObjective::new("x**2".to_string(), vec!["x".to_string()])
            .expect("formula should build");
        let settings = to_value(&DescentSettings::new(-1.0, 5)).expect("settings");
        let message = objective
            .simulate(vec![3.0], settings, JsValue::UNDEFINED, 10)
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.starts_with("Gradient descent failed"));
    }
}
