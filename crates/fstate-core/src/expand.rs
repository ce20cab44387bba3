#![forbid(unsafe_code)]

//! Persisted expand/collapse choices for hierarchical facets.
//!
//! Only explicit user choices are stored; automatic expansion is recomputed
//! on every tree build and never written back.

use serde::{Deserialize, Serialize};

/// One user choice for one node of one facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandChoice {
    pub field: String,
    pub path: Vec<String>,
    pub expanded: bool,
}

/// Ordered list of expand/collapse choices, at most one per `(field, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandedPaths {
    choices: Vec<ExpandChoice>,
}

impl ExpandedPaths {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored choice for a node, if any.
    #[must_use]
    pub fn get(&self, field: &str, path: &[String]) -> Option<bool> {
        self.choices
            .iter()
            .find(|c| c.field == field && c.path == path)
            .map(|c| c.expanded)
    }

    /// Record a choice, replacing an earlier one for the same node.
    pub fn set(&mut self, field: &str, path: &[String], expanded: bool) {
        match self
            .choices
            .iter_mut()
            .find(|c| c.field == field && c.path == path)
        {
            Some(choice) => choice.expanded = expanded,
            None => self.choices.push(ExpandChoice {
                field: field.to_owned(),
                path: path.to_vec(),
                expanded,
            }),
        }
    }

    /// Forget every choice for `field`.
    pub fn clear_field(&mut self, field: &str) {
        self.choices.retain(|c| c.field != field);
    }

    /// Number of stored choices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    /// Whether no choice is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Iterate choices in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ExpandChoice> {
        self.choices.iter()
    }
}
