//! The injected "fetch one page" capability and its HTTP implementation.

mod http;
mod response;

pub use http::HttpTransport;
pub use response::{cursor_from_next, parse_page};

use async_trait::async_trait;
use ocsmetrics_types::{Cursor, FetchErrorKind, Page, ResourceKind, SessionId};
use serde_json::Value;
use std::sync::Arc;

/// One page request as seen by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub resource: ResourceKind,
    /// Parent session, required for message pages
    pub session: Option<SessionId>,
    pub cursor: Option<Cursor>,
    pub page_size: u32,
}

/// Issues a single page request. Implementations do not retry; the fetcher
/// owns retry and backoff.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Value>, FetchErrorKind>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Value>, FetchErrorKind> {
        (**self).fetch_page(request).await
    }
}
