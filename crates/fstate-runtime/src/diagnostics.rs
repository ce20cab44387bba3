#![forbid(unsafe_code)]

//! Destinations for loop-guard diagnostics.

use fstate_core::{DiagnosticSink, LoopDiagnostic};
use std::cell::RefCell;
use std::rc::Rc;

/// Default sink: one `tracing` error event carrying the JSON input snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &LoopDiagnostic) {
        tracing::error!(
            target: "fstate::loop_guard",
            executions = diagnostic.executions,
            threshold = diagnostic.threshold,
            window_ms = diagnostic.window_ms,
            remote_revision = diagnostic.remote_revision,
            snapshot = %diagnostic.to_json(),
            "runaway reconciliation suppressed"
        );
    }
}

/// Keeps every report in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    reports: Rc<RefCell<Vec<LoopDiagnostic>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far.
    #[must_use]
    pub fn reports(&self) -> Vec<LoopDiagnostic> {
        self.reports.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: &LoopDiagnostic) {
        self.reports.borrow_mut().push(diagnostic.clone());
    }
}

/// Forwards each report to two sinks.
pub struct TeeSink<A, B> {
    first: A,
    second: B,
}

impl<A: DiagnosticSink, B: DiagnosticSink> TeeSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for TeeSink<A, B> {
    fn report(&self, diagnostic: &LoopDiagnostic) {
        self.first.report(diagnostic);
        self.second.report(diagnostic);
    }
}
