use ocsmetrics_types::{SessionId, VersionKey};
use std::fmt;

/// Result type for ocsmetrics-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// An explicitly selected version label is not in the experiment's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVersionError {
    /// `None` when the label was matched against every experiment
    pub experiment: Option<String>,
    pub label: String,
    /// Labels the catalog does know, for the error message
    pub known: Vec<String>,
}

impl fmt::Display for UnknownVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.experiment, self.known.is_empty()) {
            (Some(experiment), true) => {
                write!(f, "Experiment '{}' has no known versions", experiment)
            }
            (Some(experiment), false) => write!(
                f,
                "Unknown version '{}' for experiment '{}' (known: {})",
                self.label,
                experiment,
                self.known.join(", ")
            ),
            (None, _) => write!(
                f,
                "Unknown version '{}': no experiment publishes it (known: {})",
                self.label,
                self.known.join(", ")
            ),
        }
    }
}

impl std::error::Error for UnknownVersionError {}

/// Inputs handed to the aggregator are structurally inconsistent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationError {
    pub reason: String,
}

impl AggregationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub(crate) fn orphan_messages(session_id: &SessionId) -> Self {
        Self::new(format!(
            "messages reference session '{}' which is not in the session set",
            session_id
        ))
    }

    pub(crate) fn outside_scope<'a>(keys: impl Iterator<Item = &'a VersionKey>) -> Self {
        let keys: Vec<String> = keys.map(ToString::to_string).collect();
        if keys.is_empty() {
            return Self::new("an unrestricted filter reaches versions that were never fetched");
        }
        Self::new(format!(
            "filter reaches versions that were never fetched: {}",
            keys.join(", ")
        ))
    }
}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aggregation failed: {}", self.reason)
    }
}

impl std::error::Error for AggregationError {}

/// Error types that can occur in the engine layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    UnknownVersion(UnknownVersionError),
    Aggregation(AggregationError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownVersion(err) => write!(f, "{}", err),
            Error::Aggregation(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UnknownVersion(err) => Some(err),
            Error::Aggregation(err) => Some(err),
        }
    }
}

impl From<UnknownVersionError> for Error {
    fn from(err: UnknownVersionError) -> Self {
        Error::UnknownVersion(err)
    }
}

impl From<AggregationError> for Error {
    fn from(err: AggregationError) -> Self {
        Error::Aggregation(err)
    }
}
