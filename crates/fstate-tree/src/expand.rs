#![forbid(unsafe_code)]

//! Expand/collapse state of tree nodes.
//!
//! Precedence, highest first: a choice made in this tree (`User`), a choice
//! restored from history (`Persisted`), the auto-expand rule (`Auto`), and
//! the collapsed default.

/// Where a node's expand state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ExpandSource {
    #[default]
    Default,
    Auto,
    Persisted,
    User,
}

/// Expand state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpandedState {
    pub expanded: bool,
    pub source: ExpandSource,
}

impl ExpandedState {
    /// Collapsed, nothing chosen.
    #[must_use]
    pub const fn collapsed() -> Self {
        Self {
            expanded: false,
            source: ExpandSource::Default,
        }
    }

    /// Expanded by the single-child chain rule.
    #[must_use]
    pub const fn auto() -> Self {
        Self {
            expanded: true,
            source: ExpandSource::Auto,
        }
    }

    /// Restored from a stored choice.
    #[must_use]
    pub const fn persisted(expanded: bool) -> Self {
        Self {
            expanded,
            source: ExpandSource::Persisted,
        }
    }

    /// Chosen by the user in this tree.
    #[must_use]
    pub const fn user(expanded: bool) -> Self {
        Self {
            expanded,
            source: ExpandSource::User,
        }
    }

    /// Whether this state reflects an explicit choice worth persisting.
    #[must_use]
    pub const fn is_explicit(&self) -> bool {
        matches!(self.source, ExpandSource::Persisted | ExpandSource::User)
    }

    /// Apply a lower-precedence candidate if it outranks the current source.
    #[must_use]
    pub fn or(self, candidate: Self) -> Self {
        if candidate.source > self.source {
            candidate
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_orders_sources() {
        let auto = ExpandedState::collapsed().or(ExpandedState::auto());
        assert!(auto.expanded);

        let persisted = auto.or(ExpandedState::persisted(false));
        assert!(!persisted.expanded);

        // Auto never overrides a stored choice.
        assert_eq!(persisted.or(ExpandedState::auto()), persisted);
        assert!(persisted.is_explicit());
        assert!(!auto.is_explicit());
    }
}
