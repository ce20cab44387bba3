#![forbid(unsafe_code)]

//! Navigation-history persistence for filter state.
//!
//! The session mirrors its selections, its reconciled cache and the
//! expand/collapse choices into the current history entry, so back/forward
//! navigation restores exactly what the user saw.
//!
//! # Architecture
//!
//! - [`HistoryBackend`]: pluggable history API (`replace_state` /
//!   `current_state`). A browser host wraps `window.history`; tests and
//!   non-browser hosts use [`MemoryHistory`].
//! - [`HistoryStore`]: read-modify-write of the prefixed keys. Keys owned by
//!   other parts of the application are carried over untouched.
//!
//! # Failure Modes
//!
//! | Error | Cause | Behavior |
//! |-------|-------|----------|
//! | `HistoryError::Serialization` | JSON encode failure | Write skipped |
//! | `HistoryError::Corruption` | Entry is not a JSON object | Read returns error |
//! | `HistoryError::Unavailable` | Backend refused the call | Write skipped |
//! | Undecodable key | Foreign or outdated shape | Key ignored, logged |
//!
//! The session treats every failure as non-fatal: in-memory state stays
//! authoritative.

use fstate_core::{ExpandedPaths, Facet, SelectedFilter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Contents of one history entry.
pub type HistoryState = serde_json::Map<String, Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while reading or writing history state.
#[derive(Debug)]
pub enum HistoryError {
    /// Serialization or deserialization error.
    Serialization(String),
    /// The stored entry has an unexpected shape.
    Corruption(String),
    /// The backend cannot be used right now.
    Unavailable(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            HistoryError::Corruption(msg) => write!(f, "history corruption: {msg}"),
            HistoryError::Unavailable(msg) => write!(f, "history unavailable: {msg}"),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        HistoryError::Serialization(e.to_string())
    }
}

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A navigation history that can replace and read the current entry.
pub trait HistoryBackend {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Replace the state of the current entry without navigating.
    fn replace_state(&self, state: HistoryState) -> HistoryResult<()>;

    /// State of the current entry; `None` when the entry carries no state.
    fn current_state(&self) -> HistoryResult<Option<HistoryState>>;

    /// Check if the backend is usable.
    fn is_available(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory History
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Entries {
    states: Vec<Option<HistoryState>>,
    index: usize,
}

/// In-memory history stack with push/back/forward navigation.
///
/// Clones share the same stack, so a test can keep a handle while the
/// session owns another.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    entries: Rc<RefCell<Entries>>,
    available: Rc<Cell<bool>>,
}

impl MemoryHistory {
    /// Create a history with one empty entry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Entries {
                states: vec![None],
                index: 0,
            })),
            available: Rc::new(Cell::new(true)),
        }
    }

    /// Push a new entry after the current one, discarding forward entries.
    pub fn push_state(&self, state: Option<HistoryState>) {
        let mut entries = self.entries.borrow_mut();
        let next = entries.index + 1;
        entries.states.truncate(next);
        entries.states.push(state);
        entries.index = next;
    }

    /// Move to the previous entry. Returns `false` at the start.
    pub fn back(&self) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.index == 0 {
            return false;
        }
        entries.index -= 1;
        true
    }

    /// Move to the next entry. Returns `false` at the end.
    pub fn forward(&self) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.index + 1 >= entries.states.len() {
            return false;
        }
        entries.index += 1;
        true
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().states.len()
    }

    /// Always false; a history has at least one entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Position of the current entry.
    #[must_use]
    pub fn index(&self) -> usize {
        self.entries.borrow().index
    }

    /// Simulate an unavailable history API.
    pub fn set_available(&self, available: bool) {
        self.available.set(available);
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBackend for MemoryHistory {
    fn name(&self) -> &str {
        "MemoryHistory"
    }

    fn replace_state(&self, state: HistoryState) -> HistoryResult<()> {
        if !self.available.get() {
            return Err(HistoryError::Unavailable("replace_state refused".into()));
        }
        let mut entries = self.entries.borrow_mut();
        let index = entries.index;
        entries.states[index] = Some(state);
        Ok(())
    }

    fn current_state(&self) -> HistoryResult<Option<HistoryState>> {
        if !self.available.get() {
            return Err(HistoryError::Unavailable("current_state refused".into()));
        }
        let entries = self.entries.borrow();
        Ok(entries.states[entries.index].clone())
    }

    fn is_available(&self) -> bool {
        self.available.get()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyed Store
// ─────────────────────────────────────────────────────────────────────────────

/// Names of the keys the session owns inside a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryKeys {
    pub selected: String,
    pub cache: String,
    pub expanded: String,
}

impl HistoryKeys {
    /// Derive the three keys from a prefix.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            selected: format!("{prefix}selected"),
            cache: format!("{prefix}cache"),
            expanded: format!("{prefix}expanded"),
        }
    }
}

/// Values read back from a history entry. A key that is missing or fails to
/// decode is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoredState {
    pub selected: Option<Vec<SelectedFilter>>,
    pub cache: Option<Vec<Facet>>,
    pub expanded: Option<ExpandedPaths>,
}

impl RestoredState {
    /// Whether the entry carried none of the session's keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_none() && self.cache.is_none() && self.expanded.is_none()
    }
}

/// Reads and writes the session's keys in a [`HistoryBackend`].
pub struct HistoryStore {
    backend: Box<dyn HistoryBackend>,
    keys: HistoryKeys,
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("backend", &self.backend.name())
            .field("keys", &self.keys)
            .finish()
    }
}

impl HistoryStore {
    /// Create a store over `backend` using `prefix` for every key.
    pub fn new(backend: impl HistoryBackend + 'static, prefix: &str) -> Self {
        Self::from_boxed(Box::new(backend), prefix)
    }

    /// Create a store over an already boxed backend.
    #[must_use]
    pub fn from_boxed(backend: Box<dyn HistoryBackend>, prefix: &str) -> Self {
        Self {
            backend,
            keys: HistoryKeys::with_prefix(prefix),
        }
    }

    /// The key names in use.
    #[must_use]
    pub fn keys(&self) -> &HistoryKeys {
        &self.keys
    }

    /// Name of the underlying backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Persist the selected filters.
    pub fn write_selected(&self, selected: &[SelectedFilter]) -> HistoryResult<()> {
        self.write_key(&self.keys.selected, selected)
    }

    /// Persist the reconciled cache.
    pub fn write_cache(&self, facets: &[Facet]) -> HistoryResult<()> {
        self.write_key(&self.keys.cache, facets)
    }

    /// Persist expand/collapse choices.
    pub fn write_expanded(&self, expanded: &ExpandedPaths) -> HistoryResult<()> {
        self.write_key(&self.keys.expanded, expanded)
    }

    fn write_key<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> HistoryResult<()> {
        if !self.backend.is_available() {
            return Err(HistoryError::Unavailable(format!(
                "{} is not available",
                self.backend.name()
            )));
        }
        let encoded = serde_json::to_value(value)?;
        let mut state = self.backend.current_state()?.unwrap_or_default();
        state.insert(key.to_owned(), encoded);
        self.backend.replace_state(state)?;
        tracing::trace!(backend = %self.backend.name(), key, "history key written");
        Ok(())
    }

    /// Read the session's keys from the current entry.
    pub fn read(&self) -> HistoryResult<RestoredState> {
        let Some(state) = self.backend.current_state()? else {
            return Ok(RestoredState::default());
        };
        Ok(RestoredState {
            selected: decode_key(&state, &self.keys.selected),
            cache: decode_key(&state, &self.keys.cache),
            expanded: decode_key(&state, &self.keys.expanded),
        })
    }

    /// Parse a raw JSON history entry (as delivered by a popstate event).
    pub fn parse_state(json: &str) -> HistoryResult<HistoryState> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(HistoryState::new()),
            other => Err(HistoryError::Corruption(format!(
                "expected object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn decode_key<T: DeserializeOwned>(state: &HistoryState, key: &str) -> Option<T> {
    let value = state.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring undecodable history key");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
