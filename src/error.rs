//! Error type for the guard pipeline.
//!
//! Error codes follow the format `SPG-XXXX`:
//!
//! - SPG-3xxx: Runtime errors (input, deadline, worker)
//!
//! None of these ever reach the host as a fault: the hook runner converts
//! every variant into a deny payload before the process exits.

use std::fmt;
use std::io;

/// Errors raised while reading a request or running the evaluation.
#[derive(Debug)]
pub enum GuardError {
    /// Failed to read from stdin.
    Io(io::Error),
    /// Input exceeded the configured size limit.
    InputTooLarge(usize),
    /// Failed to parse JSON input.
    Json(serde_json::Error),
    /// Input was not valid UTF-8.
    InvalidUtf8(std::string::FromUtf8Error),
    /// The evaluation did not finish before the deadline.
    Timeout,
    /// The evaluation worker panicked.
    WorkerPanicked,
    /// The evaluation worker thread could not be started.
    WorkerSpawn(io::Error),
}

impl GuardError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Json(_) => "SPG-3001",
            Self::Io(_) => "SPG-3002",
            Self::Timeout => "SPG-3003",
            Self::InputTooLarge(_) => "SPG-3004",
            Self::WorkerPanicked => "SPG-3005",
            Self::WorkerSpawn(_) => "SPG-3006",
            Self::InvalidUtf8(_) => "SPG-3007",
        }
    }

    /// Whether the host sent something we could not interpret.
    #[must_use]
    pub const fn is_malformed_request(&self) -> bool {
        matches!(
            self,
            Self::Json(_) | Self::InvalidUtf8(_) | Self::InputTooLarge(_)
        )
    }
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read hook input: {e}"),
            Self::InputTooLarge(len) => write!(f, "hook input too large ({len} bytes)"),
            Self::Json(e) => write!(f, "{e}"),
            Self::InvalidUtf8(e) => write!(f, "hook input is not valid UTF-8: {e}"),
            Self::Timeout => write!(f, "evaluation deadline exceeded"),
            Self::WorkerPanicked => write!(f, "evaluation worker panicked"),
            Self::WorkerSpawn(e) => write!(f, "failed to start evaluation worker: {e}"),
        }
    }
}

impl std::error::Error for GuardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::WorkerSpawn(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::InvalidUtf8(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<io::Error> for GuardError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
