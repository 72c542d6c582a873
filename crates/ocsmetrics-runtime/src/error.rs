use ocsmetrics_engine::{AggregationError, UnknownVersionError};
use ocsmetrics_types::{Cursor, FetchError, SessionId};
use serde::Serialize;
use std::fmt;

/// Result type for ocsmetrics-runtime operations
pub type Result<T> = std::result::Result<T, RunError>;

/// Error types that can end a run or a workspace operation
#[derive(Debug)]
pub enum RunError {
    /// Configuration or workspace path problem
    Config(String),

    /// A page request failed fatally or exhausted its retries
    Fetch(FetchError),

    /// The selected versions are not in the catalog
    UnknownVersion(UnknownVersionError),

    /// Upstream data violated a structural invariant
    Aggregation(AggregationError),

    /// A fetched record could not be decoded
    Record {
        resource: String,
        source: ocsmetrics_types::Error,
    },

    /// Persistent cache could not be opened or administered
    Cache(ocsmetrics_cache::Error),

    /// The run was cancelled before it completed
    Cancelled,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RunError::Fetch(err) => write!(f, "{}", err),
            RunError::UnknownVersion(err) => write!(f, "{}", err),
            RunError::Aggregation(err) => write!(f, "{}", err),
            RunError::Record { resource, source } => {
                write!(f, "Bad {} record: {}", resource, source)
            }
            RunError::Cache(err) => write!(f, "Cache error: {}", err),
            RunError::Cancelled => write!(f, "Run cancelled"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Fetch(err) => Some(err),
            RunError::UnknownVersion(err) => Some(err),
            RunError::Aggregation(err) => Some(err),
            RunError::Record { source, .. } => Some(source),
            RunError::Cache(err) => Some(err),
            RunError::Config(_) | RunError::Cancelled => None,
        }
    }
}

impl From<FetchError> for RunError {
    fn from(err: FetchError) -> Self {
        RunError::Fetch(err)
    }
}

impl From<UnknownVersionError> for RunError {
    fn from(err: UnknownVersionError) -> Self {
        RunError::UnknownVersion(err)
    }
}

impl From<AggregationError> for RunError {
    fn from(err: AggregationError) -> Self {
        RunError::Aggregation(err)
    }
}

impl From<ocsmetrics_cache::Error> for RunError {
    fn from(err: ocsmetrics_cache::Error) -> Self {
        RunError::Cache(err)
    }
}

impl From<ocsmetrics_core::Error> for RunError {
    fn from(err: ocsmetrics_core::Error) -> Self {
        RunError::Config(err.to_string())
    }
}

/// How far a run got before it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    pub sessions_fetched: usize,
    pub session_pages: usize,
    /// Cursor of the next session page; `None` once the listing completed
    pub resume_cursor: Option<Cursor>,
    pub sessions_with_messages: Vec<SessionId>,
    pub failed_sessions: Vec<SessionId>,
}

/// A run that did not produce metrics, with the progress it made
#[derive(Debug)]
pub struct RunFailure {
    pub error: RunError,
    pub progress: RunProgress,
}

impl RunFailure {
    pub fn new(error: impl Into<RunError>, progress: RunProgress) -> Self {
        Self {
            error: error.into(),
            progress,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, RunError::Cancelled)
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} sessions from {} pages fetched",
            self.error, self.progress.sessions_fetched, self.progress.session_pages
        )?;
        if let Some(cursor) = &self.progress.resume_cursor {
            write!(f, ", resume at cursor {}", cursor)?;
        }
        write!(f, ")")
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
