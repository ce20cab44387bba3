#![forbid(unsafe_code)]

//! Reconciler session: the reactive wiring around [`fstate_core::reconcile`].
//!
//! A [`ReconcilerSession`] owns the four state cells of one filter panel
//! (remote snapshot, selected filters, local cache, expand choices), the loop
//! guard, the diagnostic sink, the history store and the microtask queue.
//! Nothing is global; two sessions never share state.
//!
//! # Data flow
//!
//! ```text
//! ingest ──► remote ─┐
//!                    ├─► recompute ──► loop guard ──► cache ──► history
//! setters ─► selected┘                     │
//!                                          └──► DiagnosticSink (once per trip)
//! ```
//!
//! # Invariants
//!
//! 1. Only the session writes the cache, and only after the loop guard admits
//!    the write.
//! 2. Every cache write carries a fresh revision.
//! 3. On [`ReconcilerSession::restore_from_history`] the restored selections
//!    are visible to the reconciler before the restored cache is reconciled.
//! 4. History failures never abort a reconciliation.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Runaway write cycle | Writes suppressed, one diagnostic per trip |
//! | Re-entrant recompute | Counted in [`SessionStats::reentrant`], logged, still guarded |
//! | History write fails | Logged at `warn`, counted, state kept in memory |

use crate::clock::{SessionClock, SystemClock};
use crate::diagnostics::TracingSink;
use crate::history::{HistoryBackend, HistoryError, HistoryResult, HistoryStore};
use crate::reactive::{BatchScope, MicrotaskQueue, Observable, Subscription};
use fstate_core::{
    DiagnosticSink, ExpandedPaths, Facet, FacetSnapshot, FacetValue, FilterData, GuardDecision,
    LocalFilterCache, LoopDiagnostic, LoopGuard, LoopGuardConfig, ReconcileOutcome,
    SelectedFilter, SelectionKey, SnapshotError, reconcile_snapshot,
};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Environment variable overriding the history key prefix.
pub const ENV_HISTORY_PREFIX: &str = "FSTATE_HISTORY_PREFIX";
/// Environment variable overriding the loop guard threshold.
pub const ENV_LOOP_THRESHOLD: &str = "FSTATE_LOOP_THRESHOLD";
/// Environment variable overriding the loop guard window, in milliseconds.
pub const ENV_LOOP_WINDOW_MS: &str = "FSTATE_LOOP_WINDOW_MS";

/// Default prefix of the history keys.
pub const DEFAULT_HISTORY_PREFIX: &str = "fstate:";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Prefix of the history keys.
    /// Default: `fstate:`
    pub history_prefix: String,
    /// Loop guard limits.
    pub loop_guard: LoopGuardConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_prefix: DEFAULT_HISTORY_PREFIX.to_owned(),
            loop_guard: LoopGuardConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Set the history key prefix.
    #[must_use]
    pub fn with_history_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.history_prefix = prefix.into();
        self
    }

    /// Set the loop guard limits.
    #[must_use]
    pub fn with_loop_guard(mut self, loop_guard: LoopGuardConfig) -> Self {
        self.loop_guard = loop_guard;
        self
    }

    /// Defaults overridden by `FSTATE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom lookup (for tests).
    ///
    /// Unparsable values are ignored with a warning.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(prefix) = get_env(ENV_HISTORY_PREFIX).filter(|p| !p.is_empty()) {
            config.history_prefix = prefix;
        }
        if let Some(threshold) = parse_env::<u32>(&get_env, ENV_LOOP_THRESHOLD) {
            config.loop_guard.threshold = threshold;
        }
        if let Some(ms) = parse_env::<u64>(&get_env, ENV_LOOP_WINDOW_MS) {
            config.loop_guard.window = Duration::from_millis(ms);
        }
        config
    }
}

fn parse_env<T: std::str::FromStr>(get_env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get_env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats
// ─────────────────────────────────────────────────────────────────────────────

/// Counters describing what the session has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Reconciliation passes run.
    pub reconciles: u64,
    /// Cache values published.
    pub writes: u64,
    /// Passes that found nothing to publish.
    pub unchanged: u64,
    /// Writes withheld by the loop guard.
    pub suppressed: u64,
    /// Passes started while another pass was still running.
    pub reentrant: u64,
    /// Failed history reads or writes.
    pub history_errors: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`ReconcilerSession`].
pub struct SessionBuilder {
    config: SessionConfig,
    clock: Box<dyn SessionClock>,
    sink: Box<dyn DiagnosticSink>,
    history: Option<Box<dyn HistoryBackend>>,
    microtasks: MicrotaskQueue,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            clock: Box::new(SystemClock),
            sink: Box::new(TracingSink),
            history: None,
            microtasks: MicrotaskQueue::new(),
        }
    }
}

impl SessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl SessionClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Persist state into `backend`.
    #[must_use]
    pub fn with_history(mut self, backend: impl HistoryBackend + 'static) -> Self {
        self.history = Some(Box::new(backend));
        self
    }

    /// Share an existing microtask queue (for example the host's).
    #[must_use]
    pub fn with_microtasks(mut self, microtasks: MicrotaskQueue) -> Self {
        self.microtasks = microtasks;
        self
    }

    /// Wire the cells and return the session.
    #[must_use]
    pub fn build(self) -> ReconcilerSession {
        let history = self
            .history
            .map(|backend| HistoryStore::from_boxed(backend, &self.config.history_prefix));
        let remote = Observable::new(Rc::new(FacetSnapshot::empty()));
        let selected = Observable::new(Rc::new(Vec::new()));
        let cache = Observable::new(Rc::new(LocalFilterCache::empty()));
        let expanded = Observable::new(Rc::new(ExpandedPaths::new()));
        let inner = Rc::new_cyclic(|weak| SessionInner {
            _subscriptions: SessionInner::wire(weak, &remote, &selected, &cache, &expanded),
            remote,
            selected,
            cache,
            expanded,
            guard: RefCell::new(LoopGuard::new(self.config.loop_guard)),
            config: self.config,
            clock: self.clock,
            sink: self.sink,
            history,
            microtasks: self.microtasks,
            snapshot_revision: Cell::new(0),
            cache_revision: Cell::new(0),
            depth: Cell::new(0),
            stats: Cell::new(SessionStats::default()),
        });
        tracing::debug!(
            history = inner.history.as_ref().map(HistoryStore::backend_name),
            threshold = inner.config.loop_guard.threshold,
            "reconciler session created"
        );
        ReconcilerSession { inner }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

struct SessionInner {
    config: SessionConfig,
    remote: Observable<Rc<FacetSnapshot>>,
    selected: Observable<Rc<Vec<SelectedFilter>>>,
    cache: Observable<Rc<LocalFilterCache>>,
    expanded: Observable<Rc<ExpandedPaths>>,
    guard: RefCell<LoopGuard>,
    clock: Box<dyn SessionClock>,
    sink: Box<dyn DiagnosticSink>,
    history: Option<HistoryStore>,
    microtasks: MicrotaskQueue,
    snapshot_revision: Cell<u64>,
    cache_revision: Cell<u64>,
    depth: Cell<u32>,
    stats: Cell<SessionStats>,
    _subscriptions: Vec<Subscription>,
}

/// Marks a running reconciliation pass.
struct PassGuard<'a> {
    depth: &'a Cell<u32>,
}

impl<'a> PassGuard<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl SessionInner {
    fn wire(
        weak: &Weak<Self>,
        remote: &Observable<Rc<FacetSnapshot>>,
        selected: &Observable<Rc<Vec<SelectedFilter>>>,
        cache: &Observable<Rc<LocalFilterCache>>,
        expanded: &Observable<Rc<ExpandedPaths>>,
    ) -> Vec<Subscription> {
        let mut subs = Vec::with_capacity(4);

        let w = weak.clone();
        subs.push(remote.subscribe(move |_| with_inner(&w, SessionInner::recompute)));

        let w = weak.clone();
        subs.push(selected.subscribe(move |selected| {
            with_inner(&w, |inner| {
                inner.recompute();
                inner.persist("selected", |store| store.write_selected(selected));
            });
        }));

        let w = weak.clone();
        subs.push(cache.subscribe(move |cache| {
            with_inner(&w, |inner| {
                inner.persist("cache", |store| store.write_cache(cache.facets()));
            });
        }));

        let w = weak.clone();
        subs.push(expanded.subscribe(move |expanded| {
            with_inner(&w, |inner| {
                inner.persist("expanded", |store| store.write_expanded(expanded));
            });
        }));

        subs
    }

    fn bump(&self, f: impl FnOnce(&mut SessionStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn recompute(&self) {
        let remote = self.remote.get();
        let previous = self.cache.get();
        let selected = self.selected.get();
        self.reconcile_against(&remote, &previous, &selected);
    }

    fn reconcile_against(
        &self,
        remote: &FacetSnapshot,
        previous: &LocalFilterCache,
        selected: &[SelectedFilter],
    ) {
        if self.depth.get() > 0 {
            self.bump(|s| s.reentrant += 1);
            tracing::warn!(
                depth = self.depth.get(),
                remote_revision = remote.revision(),
                "re-entrant reconciliation"
            );
        }
        let _pass = PassGuard::enter(&self.depth);
        self.bump(|s| s.reconciles += 1);

        match reconcile_snapshot(remote, previous, selected) {
            ReconcileOutcome::Unchanged => {
                self.bump(|s| s.unchanged += 1);
                tracing::trace!(
                    remote_revision = remote.revision(),
                    cache_revision = previous.revision(),
                    "cache unchanged"
                );
            }
            ReconcileOutcome::Write {
                facets,
                source_revision,
            } => self.commit(facets, source_revision, remote, previous, selected),
        }
    }

    fn commit(
        &self,
        facets: Vec<Facet>,
        source_revision: u64,
        remote: &FacetSnapshot,
        previous: &LocalFilterCache,
        selected: &[SelectedFilter],
    ) {
        let decision = self.guard.borrow_mut().admit(self.clock.now());
        match decision {
            GuardDecision::Proceed => {
                let revision = self.cache_revision.get() + 1;
                self.cache_revision.set(revision);
                self.bump(|s| s.writes += 1);
                tracing::debug!(
                    revision,
                    source_revision,
                    facets = facets.len(),
                    "cache written"
                );
                self.cache.set_force(Rc::new(LocalFilterCache::new(
                    revision,
                    Some(source_revision),
                    facets,
                )));
            }
            GuardDecision::Suppress { report } => {
                self.bump(|s| s.suppressed += 1);
                if report {
                    let diagnostic = {
                        let guard = self.guard.borrow();
                        LoopDiagnostic {
                            executions: guard.executions(),
                            threshold: guard.config().threshold,
                            window_ms: u64::try_from(guard.config().window.as_millis())
                                .unwrap_or(u64::MAX),
                            remote_revision: remote.revision(),
                            remote: remote.facets().to_vec(),
                            previous_cache: previous.facets().to_vec(),
                            selected: selected.to_vec(),
                        }
                    };
                    self.sink.report(&diagnostic);
                }
            }
        }
    }

    fn persist(&self, what: &'static str, write: impl FnOnce(&HistoryStore) -> HistoryResult<()>) {
        let Some(store) = &self.history else { return };
        if let Err(e) = write(store) {
            self.note_history_error(what, &e);
        }
    }

    fn note_history_error(&self, what: &str, error: &HistoryError) {
        self.bump(|s| s.history_errors += 1);
        tracing::warn!(key = what, error = %error, "history persistence failed");
    }

    fn update_selected(&self, f: impl FnOnce(&mut Vec<SelectedFilter>)) -> bool {
        let mut next = self.selected.with(|current| Vec::clone(current));
        f(&mut next);
        self.selected.set(Rc::new(next))
    }
}

fn with_inner(weak: &Weak<SessionInner>, f: impl FnOnce(&SessionInner)) {
    if let Some(inner) = weak.upgrade() {
        f(&inner);
    }
}

/// One filter panel's reconciliation engine.
///
/// Cloning returns another handle to the same session.
#[derive(Clone)]
pub struct ReconcilerSession {
    inner: Rc<SessionInner>,
}

impl fmt::Debug for ReconcilerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcilerSession")
            .field("snapshot_revision", &self.inner.snapshot_revision.get())
            .field("cache_revision", &self.inner.cache_revision.get())
            .field("selected", &self.inner.selected.with(|s| s.len()))
            .field("stats", &self.inner.stats.get())
            .finish()
    }
}

impl Default for ReconcilerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcilerSession {
    /// Session with default configuration and no history.
    #[must_use]
    pub fn new() -> Self {
        SessionBuilder::new().build()
    }

    /// Start configuring a session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    // ── Input ────────────────────────────────────────────────────────────

    /// Publish a facet response. Returns its snapshot revision.
    pub fn ingest(&self, facets: Vec<Facet>) -> u64 {
        let revision = self.inner.snapshot_revision.get() + 1;
        self.inner.snapshot_revision.set(revision);
        tracing::trace!(revision, facets = facets.len(), "facet response ingested");
        self.inner
            .remote
            .set_force(Rc::new(FacetSnapshot::new(revision, facets)));
        revision
    }

    /// Parse and publish a JSON facet response.
    pub fn ingest_json(&self, json: &str) -> Result<u64, SnapshotError> {
        let revision = self.inner.snapshot_revision.get() + 1;
        let snapshot = FacetSnapshot::from_json(revision, json)?;
        self.inner.snapshot_revision.set(revision);
        self.inner.remote.set_force(Rc::new(snapshot));
        Ok(revision)
    }

    // ── Selection ────────────────────────────────────────────────────────

    /// Replace every selection. Returns whether anything changed.
    pub fn set_selected(&self, filters: Vec<SelectedFilter>) -> bool {
        self.inner.selected.set(Rc::new(filters))
    }

    /// Insert `filter`, replacing the selection with the same key in place.
    pub fn upsert_selected(&self, filter: SelectedFilter) -> bool {
        self.inner.update_selected(|filters| {
            let key = filter.key();
            match filters.iter_mut().find(|f| f.key() == key) {
                Some(slot) => *slot = filter,
                None => filters.push(filter),
            }
        })
    }

    /// Remove the selection for `key`. Returns whether it existed.
    pub fn remove_selected(&self, key: &SelectionKey) -> bool {
        let exists = self.inner.selected.with(|s| s.iter().any(|f| &f.key() == key));
        if exists {
            self.inner
                .update_selected(|filters| filters.retain(|f| &f.key() != key));
        }
        exists
    }

    /// Drop every selection.
    pub fn clear_filters(&self) -> bool {
        self.set_selected(Vec::new())
    }

    /// Add `value` to the list selection for `key`, or remove it when
    /// already chosen. A list that becomes empty removes the selection.
    pub fn toggle_value(&self, key: &SelectionKey, value: FacetValue) -> bool {
        self.inner.update_selected(|filters| {
            let Some(index) = filters.iter().position(|f| &f.key() == key) else {
                filters.push(SelectedFilter::new(
                    key.field.clone(),
                    key.op,
                    FilterData::List(vec![value]),
                ));
                return;
            };
            let mut values = filters[index]
                .data
                .as_list()
                .map(<[FacetValue]>::to_vec)
                .unwrap_or_default();
            match values.iter().position(|v| *v == value) {
                Some(at) => {
                    values.remove(at);
                }
                None => values.push(value),
            }
            if values.is_empty() {
                filters.remove(index);
            } else {
                filters[index].data = FilterData::List(values);
            }
        })
    }

    /// Record an expand/collapse choice for a hierarchical node.
    pub fn set_expanded(&self, field: &str, path: &[String], expanded: bool) -> bool {
        if self.inner.expanded.with(|e| e.get(field, path)) == Some(expanded) {
            return false;
        }
        let mut next = self.inner.expanded.with(|e| ExpandedPaths::clone(e));
        next.set(field, path, expanded);
        self.inner.expanded.set(Rc::new(next))
    }

    // ── History ──────────────────────────────────────────────────────────

    /// Restore state from the current history entry (popstate).
    ///
    /// Selections and expand choices are published first, inside one batch,
    /// and the reconciler observes them synchronously. The restored cache is
    /// reconciled on the next microtask drain, against the restored
    /// selections, so options that were selected but are missing from the
    /// current response survive. Returns `false` when there was nothing to
    /// restore.
    pub fn restore_from_history(&self) -> HistoryResult<bool> {
        let Some(store) = &self.inner.history else {
            return Ok(false);
        };
        let restored = match store.read() {
            Ok(restored) => restored,
            Err(e) => {
                self.inner.note_history_error("restore", &e);
                return Err(e);
            }
        };
        if restored.is_empty() {
            tracing::debug!("history entry carries no filter state");
            return Ok(false);
        }
        tracing::debug!(
            selected = restored.selected.as_ref().map(Vec::len),
            cache = restored.cache.as_ref().map(Vec::len),
            "restoring filter state from history"
        );

        {
            let _batch = BatchScope::new();
            if let Some(selected) = restored.selected {
                self.inner.selected.set(Rc::new(selected));
            }
            if let Some(expanded) = restored.expanded {
                self.inner.expanded.set(Rc::new(expanded));
            }
        }

        if let Some(facets) = restored.cache {
            let weak = Rc::downgrade(&self.inner);
            self.inner.microtasks.schedule(move || {
                with_inner(&weak, |inner| {
                    let previous = LocalFilterCache::new(0, None, facets);
                    let remote = inner.remote.get();
                    let selected = inner.selected.get();
                    inner.reconcile_against(&remote, &previous, &selected);
                });
            });
        }
        Ok(true)
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// The reconciled cache.
    #[must_use]
    pub fn cache(&self) -> Rc<LocalFilterCache> {
        self.inner.cache.get()
    }

    /// The selected filters.
    #[must_use]
    pub fn selected(&self) -> Rc<Vec<SelectedFilter>> {
        self.inner.selected.get()
    }

    /// The latest facet response.
    #[must_use]
    pub fn snapshot(&self) -> Rc<FacetSnapshot> {
        self.inner.remote.get()
    }

    /// Persisted expand/collapse choices.
    #[must_use]
    pub fn expanded(&self) -> Rc<ExpandedPaths> {
        self.inner.expanded.get()
    }

    /// The cache cell, for consumers that react to every write.
    #[must_use]
    pub fn cache_signal(&self) -> Observable<Rc<LocalFilterCache>> {
        self.inner.cache.clone()
    }

    /// The selection cell. Writing it is equivalent to the setters.
    #[must_use]
    pub fn selected_signal(&self) -> Observable<Rc<Vec<SelectedFilter>>> {
        self.inner.selected.clone()
    }

    /// The expand-choice cell.
    #[must_use]
    pub fn expanded_signal(&self) -> Observable<Rc<ExpandedPaths>> {
        self.inner.expanded.clone()
    }

    /// The session's microtask queue; the host drains it once per tick.
    #[must_use]
    pub fn microtasks(&self) -> MicrotaskQueue {
        self.inner.microtasks.clone()
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.inner.stats.get()
    }

    /// Whether the loop guard is currently suppressing writes.
    #[must_use]
    pub fn is_guard_tripped(&self) -> bool {
        self.inner.guard.borrow().is_tripped()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fstate_core::{FacetMeta, FilterOp, ValueList};
    use pretty_assertions::assert_eq;

    fn color(values: &[&str], counts: &[u64]) -> Facet {
        Facet::new(
            "color",
            FilterOp::Any,
            FacetMeta::Checkbox(ValueList::new(values.iter().copied()).with_counts(counts.to_vec())),
        )
    }

    fn key() -> SelectionKey {
        SelectionKey::new("color", FilterOp::Any)
    }

    #[test]
    fn env_overrides_apply() {
        let config = SessionConfig::from_env_with(|key| match key {
            ENV_HISTORY_PREFIX => Some("shop:".into()),
            ENV_LOOP_THRESHOLD => Some("7".into()),
            ENV_LOOP_WINDOW_MS => Some("250".into()),
            _ => None,
        });
        assert_eq!(config.history_prefix, "shop:");
        assert_eq!(config.loop_guard.threshold, 7);
        assert_eq!(config.loop_guard.window, Duration::from_millis(250));
    }

    #[test]
    fn bad_env_values_fall_back_to_defaults() {
        let config = SessionConfig::from_env_with(|key| match key {
            ENV_LOOP_THRESHOLD => Some("lots".into()),
            ENV_HISTORY_PREFIX => Some(String::new()),
            _ => None,
        });
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn ingest_writes_cache() {
        let session = ReconcilerSession::new();
        let revision = session.ingest(vec![color(&["red"], &[1])]);
        let cache = session.cache();
        assert_eq!(cache.source_revision(), Some(revision));
        assert_eq!(cache.facets(), &[color(&["red"], &[1])]);
        assert_eq!(session.stats().writes, 1);
    }

    #[test]
    fn equal_responses_still_produce_new_revisions() {
        let session = ReconcilerSession::new();
        session.ingest(vec![color(&["red"], &[1])]);
        let first = session.cache().revision();
        session.ingest(vec![color(&["red"], &[1])]);
        assert!(session.cache().revision() > first);
    }

    #[test]
    fn unrelated_selection_change_skips_write() {
        let session = ReconcilerSession::new();
        session.ingest(vec![color(&["red"], &[1])]);
        let writes = session.stats().writes;
        session.upsert_selected(SelectedFilter::list("size", FilterOp::Any, ["m"]));
        assert_eq!(session.stats().writes, writes);
        assert_eq!(session.stats().unchanged, 1);
    }

    #[test]
    fn toggle_value_adds_and_removes() {
        let session = ReconcilerSession::new();
        session.toggle_value(&key(), "red".into());
        session.toggle_value(&key(), "blue".into());
        assert!(session.selected()[0].contains(&"blue".into()));
        session.toggle_value(&key(), "red".into());
        session.toggle_value(&key(), "blue".into());
        assert!(session.selected().is_empty());
    }

    #[test]
    fn remove_selected_reports_existence() {
        let session = ReconcilerSession::new();
        assert!(!session.remove_selected(&key()));
        session.upsert_selected(SelectedFilter::list("color", FilterOp::Any, ["red"]));
        assert!(session.remove_selected(&key()));
        assert!(session.selected().is_empty());
    }

    #[test]
    fn upsert_replaces_in_place() {
        let session = ReconcilerSession::new();
        session.upsert_selected(SelectedFilter::list("color", FilterOp::Any, ["red"]));
        session.upsert_selected(SelectedFilter::list("size", FilterOp::Any, ["m"]));
        session.upsert_selected(SelectedFilter::list("color", FilterOp::Any, ["blue"]));
        let selected = session.selected();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0], SelectedFilter::list("color", FilterOp::Any, ["blue"]));
    }

    #[test]
    fn ingest_json_rejects_garbage_without_bumping_revision() {
        let session = ReconcilerSession::new();
        assert!(session.ingest_json("not json").is_err());
        assert_eq!(session.snapshot().revision(), 0);
        let revision = session.ingest_json("[]").unwrap();
        assert_eq!(revision, 1);
    }
}
