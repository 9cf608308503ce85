use thiserror::Error;

/// Failures of the scheduler itself. A failed pass is not one of them: it
/// is reported as [`crate::PassOutcome::Failed`] and the loop carries on.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to build tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("ctrl-c handler failed: {0}")]
    Signal(#[source] std::io::Error),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}
