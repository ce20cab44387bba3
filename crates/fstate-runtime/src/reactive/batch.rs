#![forbid(unsafe_code)]

//! Deferred notification scope.
//!
//! Inside a [`BatchScope`] every [`Observable`](super::Observable) write
//! updates its value immediately but queues its notification. When the
//! outermost scope ends, each written cell is notified once, in the order of
//! its first write. This lets several cells restored from one history entry
//! become visible to listeners as one consistent snapshot.

use std::cell::RefCell;

type Notifier = Box<dyn FnOnce()>;

#[derive(Default)]
struct BatchState {
    depth: u32,
    pending: Vec<(usize, Notifier)>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

pub(crate) fn is_batching() -> bool {
    BATCH.with(|b| b.borrow().depth > 0)
}

/// Queue a notification; `key` identifies the cell so it is notified once.
pub(crate) fn defer(key: usize, notify: Notifier) {
    BATCH.with(|b| {
        let mut state = b.borrow_mut();
        if !state.pending.iter().any(|(k, _)| *k == key) {
            state.pending.push((key, notify));
        }
    });
}

/// RAII guard deferring notifications until the outermost scope is dropped.
#[must_use = "the batch ends as soon as the scope is dropped"]
pub struct BatchScope {
    _private: (),
}

impl BatchScope {
    /// Open a (possibly nested) batch.
    pub fn new() -> Self {
        BATCH.with(|b| b.borrow_mut().depth += 1);
        Self { _private: () }
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let pending = BATCH.with(|b| {
            let mut state = b.borrow_mut();
            state.depth = state.depth.saturating_sub(1);
            if state.depth == 0 {
                std::mem::take(&mut state.pending)
            } else {
                Vec::new()
            }
        });
        for (_, notify) in pending {
            notify();
        }
    }
}
