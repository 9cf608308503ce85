//! Error types for idsync-reconcile.

use thiserror::Error;

use idsync_core::{DirectoryError, PlatformError};

/// A failure that aborts the whole pass.
///
/// Per-user profile gaps and missing membership teams never surface here;
/// they are logged and skipped where they occur.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl ReconcileError {
    /// Short, stable name of the causing error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Directory(err) => err.kind(),
            Self::Platform(err) => err.kind(),
        }
    }
}
