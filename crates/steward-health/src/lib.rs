//! steward-health — debounced up/down health state.
//!
//! A [`HealthChecker`] wraps a check [`Task`] and turns its stream of
//! outcomes into a boolean state that only flips after a run of like
//! outcomes, with separate thresholds for each direction.
//!
//! # Architecture
//!
//! ```text
//! HealthChecker (is itself a Task)
//!   ├── check: Task           run outside any lock
//!   ├── RwLock<HealthState>   state, counters, last error, first-run flag
//!   └── on_up / on_down       fired after the lock is released
//! ```
//!
//! Because the checker is a [`Task`], it can be handed straight to a
//! scheduler, which then sees exactly the outcomes of the wrapped check.
//! A typical usage is an initial state of up, an up threshold of 1
//! (instant up) and a down threshold of 3.
//!
//! [`Task`]: steward_core::Task

pub mod checker;

pub use checker::{DownCallback, HealthChecker, HealthSnapshot, UpCallback};
