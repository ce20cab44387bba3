#![forbid(unsafe_code)]

//! Runtime for fstate: reactive cells, the reconciler session, history
//! persistence and loop-guard diagnostics.
//!
//! Everything here is single-threaded (`Rc`-based, `!Send`). A host owns one
//! [`ReconcilerSession`] per filter panel, feeds it facet responses with
//! [`ReconcilerSession::ingest`], and drains its
//! [`MicrotaskQueue`](reactive::MicrotaskQueue) once per tick.

pub mod clock;
pub mod diagnostics;
pub mod history;
pub mod reactive;
pub mod session;

pub use clock::{ManualClock, SessionClock, SystemClock};
pub use diagnostics::{RecordingSink, TeeSink, TracingSink};
pub use history::{
    HistoryBackend, HistoryError, HistoryKeys, HistoryResult, HistoryState, HistoryStore,
    MemoryHistory, RestoredState,
};
pub use reactive::{BatchScope, MicrotaskQueue, Observable, Subscription};
pub use session::{ReconcilerSession, SessionBuilder, SessionConfig, SessionStats};
