use std::fmt;

/// Result type for ocsmetrics-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug)]
pub enum Error {
    /// An upstream record could not be decoded into a domain type
    Decode {
        what: &'static str,
        source: serde_json::Error,
    },

    /// A value was syntactically valid but semantically unusable
    Invalid(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode { what, source } => write!(f, "Failed to decode {}: {}", what, source),
            Error::Invalid(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode { source, .. } => Some(source),
            Error::Invalid(_) => None,
        }
    }
}
