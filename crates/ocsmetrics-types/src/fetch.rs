use std::fmt;

use crate::page::{Cursor, ResourceKind};

/// Why a single page request failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    RateLimited { retry_after_secs: Option<u64> },
    Server(u16),
    Client(u16),
    Connect(String),
    Decode(String),
}

impl FetchErrorKind {
    /// Map a non-success HTTP status to a kind
    pub fn from_status(status: u16, retry_after_secs: Option<u64>) -> Self {
        match status {
            429 => FetchErrorKind::RateLimited { retry_after_secs },
            500..=599 => FetchErrorKind::Server(status),
            _ => FetchErrorKind::Client(status),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Timeout
                | FetchErrorKind::RateLimited { .. }
                | FetchErrorKind::Server(_)
                | FetchErrorKind::Connect(_)
        )
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Timeout => write!(f, "request timed out"),
            FetchErrorKind::RateLimited {
                retry_after_secs: Some(secs),
            } => write!(f, "rate limited (retry after {}s)", secs),
            FetchErrorKind::RateLimited { .. } => write!(f, "rate limited"),
            FetchErrorKind::Server(status) => write!(f, "server error (HTTP {})", status),
            FetchErrorKind::Client(status) => write!(f, "client error (HTTP {})", status),
            FetchErrorKind::Connect(msg) => write!(f, "connection failed: {}", msg),
            FetchErrorKind::Decode(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

/// A page request that failed for good, either fatally or after exhausting
/// its retries.
///
/// `cursor` is the cursor the failed request started from: the last cursor
/// that was successfully reached, so the caller can resume from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub resource: String,
    pub cursor: Option<Cursor>,
    pub attempts: u32,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, resource: impl Into<String>, cursor: Option<Cursor>) -> Self {
        Self {
            kind,
            resource: resource.into(),
            cursor,
            attempts: 1,
        }
    }

    pub fn for_resource(kind: FetchErrorKind, resource: ResourceKind, cursor: Option<Cursor>) -> Self {
        Self::new(kind, resource.as_str(), cursor)
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to fetch {}", self.resource)?;
        if let Some(cursor) = &self.cursor {
            write!(f, " at cursor {}", cursor)?;
        }
        write!(f, ": {} after {} attempt(s)", self.kind, self.attempts)
    }
}

impl std::error::Error for FetchError {}
