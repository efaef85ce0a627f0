use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field assignments for a scoped bulk update (`UPDATE ... SET ... WHERE ...`)
#[derive(Debug, Clone, Default)]
pub struct UpdateSet {
    operations: BTreeMap<String, Value>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self {
            operations: BTreeMap::new(),
        }
    }

    /// Set a field to a specific value
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.operations.insert(field.into(), value);
        self
    }

    /// Assignments in a stable (field name) order
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.operations
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }

    /// Apply the assignments to a JSON row
    pub fn apply(&self, row: &mut Map<String, Value>) {
        for (field, value) in &self.operations {
            row.insert(field.clone(), value.clone());
        }
    }

    /// Check if there are any operations
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
