// ABOUTME: Known-values store shared across one graph run or control session
// ABOUTME: Resolves task inputs and folds task outputs with zip-and-truncate

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::error::{ExecutionError, Result};

/// The mapping of argument name to current value used to resolve task inputs
/// and receive task outputs.
///
/// Seeded with initial conditions (beamline configuration, device handles,
/// prior results) and mutated only by folding a finished task's outputs in.
/// Last writer wins on a name collision; callers order dependencies to avoid
/// unwanted overwrites. The store is scoped to one plan run or one control
/// loop session and always passed by reference, never held as global state.
#[derive(Debug, Clone, Default)]
pub struct KnownValues {
    values: IndexMap<String, Value>,
}

impl KnownValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
        self.values.extend(entries);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Resolve a task's declared input names positionally. An absent name
    /// aborts the run before the task is started.
    pub fn resolve(&self, task: &str, names: &[String]) -> Result<Vec<Value>> {
        names
            .iter()
            .map(|name| {
                self.values
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ExecutionError::MissingInput {
                        task: task.to_string(),
                        name: name.clone(),
                    })
            })
            .collect()
    }

    /// Fold a finished task's result values into the store.
    ///
    /// Values are paired positionally with the declared output names using
    /// the length of the shorter sequence; surplus names or values are
    /// silently dropped. This supports optional or partial outputs from
    /// conditional branches, at the cost of masking arity mistakes - pass
    /// `strict` to turn a length mismatch into an error instead.
    pub fn bind_outputs(
        &mut self,
        task: &str,
        names: &[String],
        values: Vec<Value>,
        strict: bool,
    ) -> Result<()> {
        if strict && names.len() != values.len() {
            return Err(ExecutionError::OutputMismatch {
                task: task.to_string(),
                names: names.len(),
                values: values.len(),
            });
        }
        for (name, value) in names.iter().zip(values) {
            debug!(task, name = %name, "output bound");
            self.values.insert(name.clone(), value);
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for KnownValues {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
