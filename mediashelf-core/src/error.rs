use std::path::PathBuf;

use thiserror::Error;

/// Run-level failures of a synchronization run.
///
/// Per-asset problems (a probe that failed, a file that could not be
/// stat'ed) and an unreadable prior index never show up here; they degrade
/// to missing metadata and are counted in the run report instead.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The identifier names no known collection.
    #[error("unknown collection type '{0}'")]
    UnknownCollection(String),

    /// A required directory is absent.
    #[error("{what} not found: {path}")]
    NotFound {
        /// Which directory, e.g. `"asset directory"`.
        what: &'static str,
        /// Where it was expected.
        path: PathBuf,
    },

    /// The asset directory exists but could not be enumerated.
    #[error("failed to list assets in {path}: {source}")]
    Io {
        /// Directory being listed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The new index could not be persisted; the previous file is intact.
    #[error("failed to write index {path}: {source}")]
    WriteFailure {
        /// Index that was being replaced.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: IndexError,
    },
}

impl SyncError {
    /// Expected absences are reported to the caller but are not faults.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// Human-readable reason suitable for the trigger caller.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Failures reading or writing a persisted collection index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of a synchronization run.
pub type Result<T> = std::result::Result<T, SyncError>;
