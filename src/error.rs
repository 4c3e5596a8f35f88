// Error handling module
// Fatal harness errors; per-request failures are data, not errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a benchmark run.
///
/// Failures of individual requests or replica samples never surface here:
/// they are captured in the record streams and analyzed post-hoc.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Prompt corpus file does not exist
    #[error("corpus file not found: {}", .0.display())]
    CorpusNotFound(PathBuf),

    /// Prompt corpus contains no usable entries after filtering blank lines
    #[error("corpus is empty: {}", .0.display())]
    EmptyCorpus(PathBuf),

    /// Configuration validation failed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Output artifact could not be written
    #[error("failed to write artifact {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
