//! Error handling module for pkgtidy
//!
//! Provides centralized error types using thiserror. Library code returns
//! these; the binary and config loading use `anyhow` at the edge.

use thiserror::Error;

/// Main error type for pkgtidy
#[derive(Error, Debug)]
pub enum PkgTidyError {
    /// An external query tool failed (non-zero exit, unparsable output)
    #[error("Query `{command}` failed: {reason}")]
    Query { command: String, reason: String },

    /// An external tool did not finish within its time budget
    #[error("Command `{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    /// A package name that could be mistaken for an option or shell syntax
    #[error("Invalid package name: {0:?}")]
    InvalidPackageName(String),
}

/// Result type alias for pkgtidy operations
pub type Result<T> = std::result::Result<T, PkgTidyError>;

impl PkgTidyError {
    /// Create a query failure for `command`
    pub fn query(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Query {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// True when the error came from a timed-out child process.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
