//! Side table attaching ordered rule references to protected operations.
//!
//! Built once during service setup; the hosting layer looks up the rule
//! names for an operation and hands them to the evaluator per request. Order
//! is preserved because it determines which rule's message surfaces on
//! denial.

use std::collections::HashMap;

/// Mapping from operation identifier to an ordered list of rule names.
#[derive(Debug, Clone, Default)]
pub struct ResourceRules {
    operations: HashMap<String, Vec<String>>,
}

impl ResourceRules {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an ordered list of rule names to an operation.
    ///
    /// Attaching again replaces the previous list.
    pub fn attach<I, S>(&mut self, operation: impl Into<String>, rules: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operations
            .insert(operation.into(), rules.into_iter().map(Into::into).collect());
    }

    /// The ordered rule names for an operation, if any were attached.
    pub fn rules_for(&self, operation: &str) -> Option<&[String]> {
        self.operations.get(operation).map(Vec::as_slice)
    }

    /// Number of operations with attached rules.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
