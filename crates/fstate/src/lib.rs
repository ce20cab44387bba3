#![forbid(unsafe_code)]

//! fstate public facade crate.
//!
//! Filter state reconciliation for faceted search: keeps a user's selected
//! filters consistent with a facet response that changes on every query,
//! with the cache of facets last shown, and with navigation history.
//!
//! This crate re-exports the common types of the internal crates and offers
//! a prelude for day-to-day usage.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use fstate_core::{
    DiagnosticSink, ExpandChoice, ExpandedPaths, Facet, FacetKey, FacetKind, FacetMeta,
    FacetSnapshot, FacetValue, FilterData, FilterOp, GuardDecision, LocalFilterCache,
    LoopDiagnostic, LoopGuard, LoopGuardConfig, ReconcileOutcome, SelectedFilter, SelectionKey,
    SnapshotError, ValueEntry, ValueList, reconcile, reconcile_snapshot,
};

// --- Runtime re-exports ----------------------------------------------------

pub use fstate_runtime::{
    BatchScope, HistoryBackend, HistoryError, HistoryState, ManualClock, MemoryHistory,
    MicrotaskQueue, Observable, ReconcilerSession, RecordingSink, SessionBuilder, SessionClock,
    SessionConfig, SessionStats, Subscription, SystemClock, TracingSink,
};

// --- Tree re-exports -------------------------------------------------------

#[cfg(feature = "tree")]
pub use fstate_tree::{
    CheckedSync, ExpandSource, ExpandedState, FacetTree, HierarchicalNode, NodeId, TreeBinding,
    TreeBuilder, TreeError,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for fstate hosts.
#[derive(Debug)]
pub enum Error {
    /// History state could not be read or written.
    History(HistoryError),
    /// A facet response could not be parsed.
    Snapshot(SnapshotError),
    /// A hierarchical tree could not be built.
    #[cfg(feature = "tree")]
    Tree(TreeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::History(err) => write!(f, "{err}"),
            Self::Snapshot(err) => write!(f, "{err}"),
            #[cfg(feature = "tree")]
            Self::Tree(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::History(err) => Some(err),
            Self::Snapshot(err) => Some(err),
            #[cfg(feature = "tree")]
            Self::Tree(err) => Some(err),
        }
    }
}

impl From<HistoryError> for Error {
    fn from(err: HistoryError) -> Self {
        Self::History(err)
    }
}

impl From<SnapshotError> for Error {
    fn from(err: SnapshotError) -> Self {
        Self::Snapshot(err)
    }
}

#[cfg(feature = "tree")]
impl From<TreeError> for Error {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

/// Standard result type for fstate APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, Facet, FacetMeta, FacetValue, FilterData, FilterOp, MemoryHistory,
        ReconcilerSession, Result, SelectedFilter, SelectionKey, SessionConfig, ValueList,
    };

    #[cfg(feature = "tree")]
    pub use crate::{FacetTree, TreeBinding};

    pub use crate::{core, runtime};
    #[cfg(feature = "tree")]
    pub use crate::tree;
}

pub use fstate_core as core;
pub use fstate_runtime as runtime;
#[cfg(feature = "tree")]
pub use fstate_tree as tree;
