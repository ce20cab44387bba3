#![forbid(unsafe_code)]

//! Core: facet data model, snapshot ingestion, reconciliation and the loop guard.
//!
//! Everything in this crate is plain data and pure functions. Reactive
//! wiring, history persistence and session lifecycle live in
//! `fstate-runtime`; hierarchical trees live in `fstate-tree`.

pub mod expand;
pub mod logging;
pub mod loop_guard;
pub mod model;
pub mod reconcile;
pub mod snapshot;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, error, trace, warn};

pub use expand::{ExpandChoice, ExpandedPaths};
pub use loop_guard::{DiagnosticSink, GuardDecision, LoopDiagnostic, LoopGuard, LoopGuardConfig};
pub use model::{
    Facet, FacetKey, FacetKind, FacetMeta, FacetValue, FilterData, FilterOp, SelectedFilter,
    SelectionKey, ValueEntry, ValueList,
};
pub use reconcile::{LocalFilterCache, ReconcileOutcome, reconcile, reconcile_snapshot};
pub use snapshot::{FacetSnapshot, SnapshotError};
