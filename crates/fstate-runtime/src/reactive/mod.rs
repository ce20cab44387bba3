#![forbid(unsafe_code)]

//! Push-based reactive primitives.
//!
//! - [`Observable`]: shared, version-tracked cell with synchronous,
//!   registration-ordered change notification.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`BatchScope`]: defers notifications until the outermost scope exits.
//! - [`MicrotaskQueue`]: explicit end-of-tick queue for debounced and
//!   ordered follow-up work.
//!
//! # Architecture
//!
//! Cells use `Rc<RefCell<..>>`, so the whole graph is `!Send` and lives on
//! one thread. Subscribers are stored as `Weak` callbacks and pruned lazily
//! during notification.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Propagation is synchronous and depth-first.
//! 3. Setting an equal value through [`Observable::set`] is a no-op.
//! 4. Within a `BatchScope`, values update immediately and notifications are
//!    deferred to the outermost scope exit.
//! 5. Microtasks never run during synchronous propagation.

pub mod batch;
pub mod microtask;
pub mod observable;

pub use batch::BatchScope;
pub use microtask::MicrotaskQueue;
pub use observable::{Observable, Subscription};
