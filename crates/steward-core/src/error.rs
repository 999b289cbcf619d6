//! Run outcome types.

use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use thiserror::Error;

/// Why a single run of a [`Task`](crate::Task) failed.
///
/// Cheap to clone, so the same failure can be recorded (for example as a
/// health checker's last error) and still be returned to the caller.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// The task reported a failure.
    #[error("{0:#}")]
    Failed(Arc<anyhow::Error>),

    /// The task panicked and the panic was recovered.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl RunError {
    /// Build a failure from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: Display + std::fmt::Debug + Send + Sync + 'static,
    {
        Self::Failed(Arc::new(anyhow::Error::msg(message)))
    }

    /// Whether this failure came from a recovered panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

impl From<anyhow::Error> for RunError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(Arc::new(err))
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(Arc::new(err.into()))
    }
}

/// Outcome of a single run.
pub type RunResult = Result<(), RunError>;

/// Best-effort human-readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn failed_displays_context_chain() {
        let err: RunError = anyhow::anyhow!("connection refused")
            .context("probing cache")
            .into();
        assert_eq!(err.to_string(), "probing cache: connection refused");
        assert!(!err.is_panic());
    }

    #[test]
    fn clones_share_the_same_error() {
        let err = RunError::msg("boom");
        let copy = err.clone();
        match (&err, &copy) {
            (RunError::Failed(a), RunError::Failed(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected Failed"),
        }
    }

    #[test]
    fn io_errors_convert() {
        fn stat_missing() -> RunResult {
            std::fs::metadata("/definitely/not/here")?;
            Ok(())
        }
        assert!(matches!(stat_missing(), Err(RunError::Failed(_))));
    }

    #[test]
    fn panic_message_from_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(static_str.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[test]
    fn panicked_display() {
        let err = RunError::Panicked("index out of bounds".to_string());
        assert!(err.is_panic());
        assert_eq!(err.to_string(), "task panicked: index out of bounds");
    }
}
