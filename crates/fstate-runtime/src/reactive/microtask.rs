#![forbid(unsafe_code)]

//! Explicit end-of-tick task queue.
//!
//! Work scheduled here runs after the current synchronous propagation has
//! finished, when the host calls [`MicrotaskQueue::drain`]. A browser host
//! drains from a `queueMicrotask` callback; tests drain by hand.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
struct QueueState {
    tasks: RefCell<VecDeque<Task>>,
    draining: Cell<bool>,
}

/// Shared FIFO of deferred closures. Clones share the same queue.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    state: Rc<QueueState>,
}

impl MicrotaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run on the next drain.
    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.state.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run queued tasks until the queue is empty, including tasks scheduled
    /// while draining. Returns the number of tasks run.
    ///
    /// A drain requested from inside a running task returns `0`; the outer
    /// drain picks up the remaining work.
    pub fn drain(&self) -> usize {
        if self.state.draining.replace(true) {
            return 0;
        }
        let mut ran = 0;
        loop {
            let next = self.state.tasks.borrow_mut().pop_front();
            let Some(task) = next else { break };
            task();
            ran += 1;
        }
        self.state.draining.set(false);
        ran
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.tasks.borrow().len()
    }

    /// Whether no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.tasks.borrow().is_empty()
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.len())
            .field("draining", &self.state.draining.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_fifo_order() {
        let queue = MicrotaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let l = Rc::clone(&log);
            queue.schedule(move || l.borrow_mut().push(i));
        }
        assert!(log.borrow().is_empty());
        assert_eq!(queue.drain(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn tasks_scheduled_while_draining_run_in_same_drain() {
        let queue = MicrotaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let q = queue.clone();
        let l = Rc::clone(&log);
        queue.schedule(move || {
            l.borrow_mut().push("outer");
            let l2 = Rc::clone(&l);
            q.schedule(move || l2.borrow_mut().push("inner"));
            assert_eq!(q.drain(), 0);
        });
        assert_eq!(queue.drain(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }
}
