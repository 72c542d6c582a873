//! In-memory upstream for pipeline and fetcher tests.

use async_trait::async_trait;
use ocsmetrics_runtime::{PageRequest, Transport};
use ocsmetrics_types::{FetchErrorKind, Page, ResourceKind, SessionId};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use crate::fixtures::paginate;

type ScriptKey = (ResourceKind, Option<SessionId>);

/// Serves prepared pages keyed by resource and parent session.
///
/// A request without a cursor gets the first page; a request with a cursor
/// gets the page following the one that issued it. Every request is
/// recorded, including the ones that fail.
#[derive(Default)]
pub struct ScriptedTransport {
    pages: HashMap<ScriptKey, Vec<Page<Value>>>,
    broken: HashMap<ScriptKey, FetchErrorKind>,
    failures: Mutex<HashMap<ScriptKey, VecDeque<FetchErrorKind>>>,
    cancel_after: Option<(ResourceKind, usize, CancellationToken)>,
    requests: Mutex<Vec<PageRequest>>,
    served: AtomicUsize,
}

fn key(resource: ResourceKind, session: Option<&str>) -> ScriptKey {
    (resource, session.map(SessionId::new))
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(
        mut self,
        resource: ResourceKind,
        session: Option<&str>,
        pages: Vec<Page<Value>>,
    ) -> Self {
        self.pages.insert(key(resource, session), pages);
        self
    }

    /// Single-page experiment listing
    pub fn with_experiments(self, experiments: Vec<Value>) -> Self {
        self.with_pages(ResourceKind::Versions, None, vec![Page::last(experiments)])
    }

    /// Session listing split into pages of `per_page`
    pub fn with_sessions(self, sessions: Vec<Value>, per_page: usize) -> Self {
        self.with_pages(ResourceKind::Sessions, None, paginate(sessions, per_page, "sessions"))
    }

    pub fn with_messages(self, session_id: &str, messages: Vec<Value>) -> Self {
        self.with_pages(ResourceKind::Messages, Some(session_id), vec![Page::last(messages)])
    }

    /// Fail the next requests for this resource with `kinds`, in order,
    /// before serving pages again
    pub fn failing(
        self,
        resource: ResourceKind,
        session: Option<&str>,
        kinds: impl IntoIterator<Item = FetchErrorKind>,
    ) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(key(resource, session))
            .or_default()
            .extend(kinds);
        self
    }

    /// Fail every request for this resource with `kind`
    pub fn broken(mut self, resource: ResourceKind, session: Option<&str>, kind: FetchErrorKind) -> Self {
        self.broken.insert(key(resource, session), kind);
        self
    }

    /// Cancel `token` once `pages` pages of `resource` have been served
    pub fn cancel_after(mut self, resource: ResourceKind, pages: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((resource, pages, token));
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, resource: ResourceKind) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.resource == resource)
            .count()
    }

    fn served(&self, resource: ResourceKind) {
        if let Some((target, pages, token)) = &self.cancel_after
            && *target == resource
            && self.served.fetch_add(1, Ordering::SeqCst) + 1 >= *pages
        {
            token.cancel();
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Value>, FetchErrorKind> {
        self.requests.lock().unwrap().push(request.clone());
        let script_key = (request.resource, request.session.clone());

        let queued = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&script_key)
            .and_then(VecDeque::pop_front);
        if let Some(kind) = queued {
            return Err(kind);
        }
        if let Some(kind) = self.broken.get(&script_key) {
            return Err(kind.clone());
        }

        let pages = self
            .pages
            .get(&script_key)
            .ok_or(FetchErrorKind::Client(404))?;
        let index = match &request.cursor {
            None => 0,
            Some(cursor) => pages
                .iter()
                .position(|page| page.next_cursor.as_ref() == Some(cursor))
                .map(|issuer| issuer + 1)
                .ok_or(FetchErrorKind::Client(400))?,
        };
        let page = pages.get(index).cloned().ok_or(FetchErrorKind::Client(400))?;

        self.served(request.resource);
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::session;
    use ocsmetrics_types::Cursor;

    fn request(cursor: Option<&str>) -> PageRequest {
        PageRequest {
            resource: ResourceKind::Sessions,
            session: None,
            cursor: cursor.map(Cursor::new),
            page_size: 2,
        }
    }

    #[tokio::test]
    async fn test_serves_pages_by_cursor() {
        let sessions = (1..=3)
            .map(|i| session(&format!("s-{}", i), "P1", "ECD Coach", 1))
            .collect();
        let transport = ScriptedTransport::new().with_sessions(sessions, 2);

        let first = transport.fetch_page(&request(None)).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let second = transport.fetch_page(&request(Some("sessions-2"))).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.is_last());
        assert_eq!(transport.request_count(ResourceKind::Sessions), 2);
    }

    #[tokio::test]
    async fn test_queued_failures_come_first() {
        let transport = ScriptedTransport::new()
            .with_sessions(Vec::new(), 10)
            .failing(ResourceKind::Sessions, None, [FetchErrorKind::Timeout]);

        assert_eq!(
            transport.fetch_page(&request(None)).await,
            Err(FetchErrorKind::Timeout)
        );
        assert!(transport.fetch_page(&request(None)).await.is_ok());
    }
}
