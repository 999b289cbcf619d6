//! The unit-of-work contract.

use crate::error::RunResult;

/// A unit of work that can be run repeatedly.
///
/// Implementations must be callable from any thread; the scheduler runs
/// them on the blocking pool, one invocation at a time.
pub trait Task: Send + Sync + 'static {
    /// Run the work once and report success or the reason it failed.
    fn run(&self) -> RunResult;
}

impl<F> Task for F
where
    F: Fn() -> RunResult + Send + Sync + 'static,
{
    fn run(&self) -> RunResult {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn closure_is_a_task() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let task = move || -> RunResult {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };

        assert!(task.run().is_ok());
        assert!(task.run().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn boxed_task_reports_failure() {
        let task: Box<dyn Task> =
            Box::new(|| -> RunResult { Err(RunError::msg("backend unreachable")) });
        let err = task.run().unwrap_err();
        assert_eq!(err.to_string(), "backend unreachable");
    }
}
