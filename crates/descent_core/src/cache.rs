use crate::builder::{build, CompiledFunction};
use crate::equation_engine::normalize_exponent;
use crate::error::Result;
use log::trace;
use std::collections::HashMap;
use std::sync::Arc;

/// Memoizes [`build`] by formula text and variable list.
///
/// `x^2` and `x**2` share an entry. Entries are never modified after insertion;
/// failed builds are not cached.
#[derive(Debug, Default)]
pub struct EvaluatorCache {
    entries: HashMap<(String, Vec<String>), Arc<CompiledFunction>>,
}

impl EvaluatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build<S: AsRef<str>>(
        &mut self,
        text: &str,
        variable_names: &[S],
    ) -> Result<Arc<CompiledFunction>> {
        let key = (
            normalize_exponent(text.trim()),
            variable_names
                .iter()
                .map(|v| v.as_ref().to_string())
                .collect::<Vec<_>>(),
        );
        if let Some(hit) = self.entries.get(&key) {
            trace!("evaluator cache hit for `{}`", key.0);
            return Ok(Arc::clone(hit));
        }

        let compiled = Arc::new(build(&key.0, &key.1)?);
        self.entries.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
