#![forbid(unsafe_code)]

//! Runaway-reconciliation containment.
//!
//! The reconciler runs inside a push-based graph: a cache write can wake a
//! listener that restores selections, which wakes the reconciler again. When
//! such a cycle fails to settle, the [`LoopGuard`] caps the number of writes
//! per time window and keeps the last good cache on screen.
//!
//! # Algorithm
//!
//! - Every admitted execution increments a counter.
//! - The counter belongs to a window that opens at the first execution and
//!   lasts `window` (default 1000 ms). The first execution at or after the
//!   window end opens a new window with a zero counter.
//! - When the counter exceeds `threshold` (default 50) the guard is
//!   *tripped*: every further execution in the window is suppressed. Only the
//!   execution that trips the guard asks for a diagnostic report.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Guard tripped | Write suppressed, previous cache kept (stale but stable) |
//! | First suppression in window | One [`LoopDiagnostic`] reported |
//! | Window elapsed | Counter and trip state reset on the next execution |
//!
//! Time is always passed in by the caller, which keeps the guard
//! deterministic under test.

use crate::model::{Facet, SelectedFilter};
use serde::Serialize;
use std::time::Duration;
use web_time::Instant;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Loop guard configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopGuardConfig {
    /// Executions allowed per window before writes are suppressed.
    /// Default: 50
    pub threshold: u32,
    /// Counter reset period.
    /// Default: 1000ms
    pub window: Duration,
}

impl Default for LoopGuardConfig {
    fn default() -> Self {
        Self {
            threshold: 50,
            window: Duration::from_millis(1000),
        }
    }
}

impl LoopGuardConfig {
    /// Set the per-window threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the window length.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Guard
// ─────────────────────────────────────────────────────────────────────────────

/// Verdict for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Write normally.
    Proceed,
    /// Keep the previous cache. `report` is true exactly once per trip.
    Suppress { report: bool },
}

/// Execution counter with a fixed reset window.
#[derive(Debug, Clone)]
pub struct LoopGuard {
    config: LoopGuardConfig,
    window_start: Option<Instant>,
    executions: u32,
    tripped: bool,
    trips: u64,
    suppressed: u64,
}

impl LoopGuard {
    /// Create a guard.
    #[must_use]
    pub fn new(config: LoopGuardConfig) -> Self {
        Self {
            config,
            window_start: None,
            executions: 0,
            tripped: false,
            trips: 0,
            suppressed: 0,
        }
    }

    /// Record one execution at `now` and decide whether it may write.
    pub fn admit(&mut self, now: Instant) -> GuardDecision {
        self.roll_window(now);
        self.executions = self.executions.saturating_add(1);

        if self.executions <= self.config.threshold {
            return GuardDecision::Proceed;
        }

        self.suppressed += 1;
        let report = !self.tripped;
        if report {
            self.tripped = true;
            self.trips += 1;
            crate::warn!(
                executions = self.executions,
                threshold = self.config.threshold,
                "loop guard tripped, suppressing cache writes"
            );
        }
        GuardDecision::Suppress { report }
    }

    fn roll_window(&mut self, now: Instant) {
        let expired = match self.window_start {
            Some(start) => now.saturating_duration_since(start) >= self.config.window,
            None => true,
        };
        if expired {
            if self.tripped {
                crate::debug!("loop guard window elapsed, re-arming");
            }
            self.window_start = Some(now);
            self.executions = 0;
            self.tripped = false;
        }
    }

    /// Forget the current window.
    pub fn reset(&mut self) {
        self.window_start = None;
        self.executions = 0;
        self.tripped = false;
    }

    /// Whether writes are currently suppressed.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Executions counted in the current window.
    #[must_use]
    pub fn executions(&self) -> u32 {
        self.executions
    }

    /// Total number of trips since creation.
    #[must_use]
    pub fn trips(&self) -> u64 {
        self.trips
    }

    /// Total number of suppressed executions since creation.
    #[must_use]
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &LoopGuardConfig {
        &self.config
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(LoopGuardConfig::default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics
// ─────────────────────────────────────────────────────────────────────────────

/// Report emitted once when the guard trips, carrying the full inputs of the
/// suppressed reconciliation for offline diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopDiagnostic {
    pub executions: u32,
    pub threshold: u32,
    pub window_ms: u64,
    pub remote_revision: u64,
    pub remote: Vec<Facet>,
    pub previous_cache: Vec<Facet>,
    pub selected: Vec<SelectedFilter>,
}

impl LoopDiagnostic {
    /// Serialize the report for telemetry.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}

/// Fire-and-forget destination for loop diagnostics.
pub trait DiagnosticSink {
    /// Deliver one report. Must not panic or re-enter the session.
    fn report(&self, diagnostic: &LoopDiagnostic);
}
