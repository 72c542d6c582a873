use futures::Stream;
use ocsmetrics_cache::{PageCache, PutOutcome};
use ocsmetrics_core::{FetchScope, Upstream, fingerprint};
use ocsmetrics_types::wire::session_version_key;
use ocsmetrics_types::{Cursor, FetchError, Page, ResourceKind};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::retry::{RetryError, RetryPolicy, with_retry};
use crate::transport::{PageRequest, Transport};

/// Cache resource key: `versions`, `sessions` or `messages/<session id>`
pub fn resource_key(resource: ResourceKind, scope: &FetchScope) -> String {
    match (resource, &scope.session) {
        (ResourceKind::Messages, Some(session)) => format!("messages/{}", session),
        _ => resource.as_str().to_string(),
    }
}

enum PageStop {
    Failed(FetchError),
    Cancelled,
}

/// Whether a request always goes to the network. The first page of a
/// listing is where new records appear, so it is never served from cache;
/// later pages sit behind cursors and message pages are keyed by the
/// session's revision.
fn is_live(resource: ResourceKind, cursor: Option<&Cursor>) -> bool {
    cursor.is_none() && resource != ResourceKind::Messages
}

/// Read-through, retrying page source shared by every fetch in a run
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    cache: Arc<PageCache>,
    upstream: Upstream,
    retry: RetryPolicy,
    page_size: u32,
    cancel: CancellationToken,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<PageCache>) -> Self {
        Self {
            transport,
            cache,
            upstream: Upstream::default(),
            retry: RetryPolicy::default(),
            page_size: 500,
            cancel: CancellationToken::new(),
        }
    }

    /// Partition cache entries by the API they came from
    pub fn with_upstream(mut self, upstream: Upstream) -> Self {
        self.upstream = upstream;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Lazy page sequence over `resource`, starting at `start` (or the
    /// beginning). Nothing is requested until the first `next`.
    pub fn pages(&self, resource: ResourceKind, scope: FetchScope, start: Option<Cursor>) -> Pages<'_> {
        Pages {
            fetcher: self,
            resource,
            scope,
            cancel: self.cancel.clone(),
            cursor: start,
            state: State::Pending,
            limit: None,
            yielded: 0,
        }
    }

    fn retain(&self, resource: ResourceKind, scope: &FetchScope, mut page: Page<Value>) -> Page<Value> {
        if resource == ResourceKind::Sessions && scope.versions.is_some() {
            let before = page.items.len();
            page.items.retain(|item| {
                session_version_key(item).is_some_and(|key| scope.retains(&key))
            });
            tracing::debug!(
                kept = page.items.len(),
                dropped = before - page.items.len(),
                "applied version filter to session page"
            );
        }
        page
    }

    async fn fetch_one(
        &self,
        resource: ResourceKind,
        scope: &FetchScope,
        cursor: Option<&Cursor>,
        cancel: &CancellationToken,
    ) -> Result<Page<Value>, PageStop> {
        let key = resource_key(resource, scope);
        let print = fingerprint(&self.upstream, scope, cursor, self.page_size);
        let live = is_live(resource, cursor);

        if !live && let Some(entry) = self.cache.get(&key, print.as_str()) {
            match serde_json::from_str::<Page<Value>>(&entry.payload) {
                Ok(page) => return Ok(page),
                Err(err) => {
                    tracing::warn!(resource = %key, error = %err, "ignoring unreadable cache entry")
                }
            }
        }

        let request = PageRequest {
            resource,
            session: scope.session.clone(),
            cursor: cursor.cloned(),
            page_size: self.page_size,
        };
        let transport = &self.transport;

        let page = with_retry(&self.retry, cancel, |attempt| {
            tracing::debug!(resource = %key, cursor = ?request.cursor, attempt, "requesting page");
            transport.fetch_page(&request)
        })
        .await
        .map_err(|err| match err {
            RetryError::Failed { kind, attempts } => PageStop::Failed(
                FetchError::new(kind, key.as_str(), cursor.cloned()).with_attempts(attempts),
            ),
            RetryError::Cancelled => PageStop::Cancelled,
        })?;

        let page = self.retain(resource, scope, page);
        if live {
            return Ok(page);
        }

        match serde_json::to_string(&page) {
            Ok(payload) => {
                if let PutOutcome::Skipped(skipped) = self.cache.put(&key, print.as_str(), payload) {
                    tracing::debug!("{}", skipped);
                }
            }
            Err(err) => tracing::warn!(resource = %key, error = %err, "page not cacheable"),
        }

        Ok(page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Done,
    Limited,
    Cancelled,
    Failed,
}

/// Pages of one resource, fetched one at a time.
///
/// The sequence ends when a page has no next cursor, when cancellation is
/// observed between pages, after a page limit, or after a terminal error.
/// A partially received page is never yielded.
pub struct Pages<'a> {
    fetcher: &'a PageFetcher,
    resource: ResourceKind,
    scope: FetchScope,
    cancel: CancellationToken,
    cursor: Option<Cursor>,
    state: State,
    limit: Option<usize>,
    yielded: usize,
}

/// Everything a page sequence produced
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub pages: Vec<Page<Value>>,
    pub cancelled: bool,
    /// Cursor to resume from; `None` once the sequence completed
    pub resume_cursor: Option<Cursor>,
}

impl<'a> Pages<'a> {
    /// Observe `cancel` instead of the fetcher's own token
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stop after `max_pages` pages, leaving the sequence resumable
    pub fn limit(mut self, max_pages: usize) -> Self {
        self.limit = Some(max_pages);
        self
    }

    pub async fn next(&mut self) -> Result<Option<Page<Value>>, FetchError> {
        if self.state != State::Pending {
            return Ok(None);
        }
        if self.limit.is_some_and(|max| self.yielded >= max) {
            self.state = State::Limited;
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            tracing::info!(resource = %self.resource, pages = self.yielded, "fetch cancelled");
            self.state = State::Cancelled;
            return Ok(None);
        }

        let result = self
            .fetcher
            .fetch_one(self.resource, &self.scope, self.cursor.as_ref(), &self.cancel)
            .await;

        match result {
            Ok(page) => {
                self.yielded += 1;
                match &page.next_cursor {
                    Some(next) if Some(next) == self.cursor.as_ref() => {
                        tracing::warn!(resource = %self.resource, cursor = %next, "upstream repeated a cursor, stopping");
                        self.cursor = None;
                        self.state = State::Done;
                    }
                    Some(next) => self.cursor = Some(next.clone()),
                    None => {
                        self.cursor = None;
                        self.state = State::Done;
                    }
                }
                Ok(Some(page))
            }
            Err(PageStop::Cancelled) => {
                self.state = State::Cancelled;
                Ok(None)
            }
            Err(PageStop::Failed(err)) => {
                tracing::warn!(error = %err, "page fetch failed");
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    /// Cursor of the next page to request; `None` when the sequence is
    /// complete (or has not moved past its start)
    pub fn resume_cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == State::Cancelled
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Done
    }

    pub fn is_limited(&self) -> bool {
        self.state == State::Limited
    }

    pub fn pages_yielded(&self) -> usize {
        self.yielded
    }

    /// Drain the sequence. A terminal error discards the collected pages;
    /// its cursor says where to resume.
    pub async fn collect(mut self) -> Result<FetchOutcome, FetchError> {
        let mut pages = Vec::new();
        while let Some(page) = self.next().await? {
            pages.push(page);
        }
        Ok(FetchOutcome {
            pages,
            cancelled: self.is_cancelled(),
            resume_cursor: self.cursor,
        })
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Page<Value>, FetchError>> + 'a {
        futures::stream::unfold(self, |mut pages| async move {
            match pages.next().await {
                Ok(Some(page)) => Some((Ok(page), pages)),
                Ok(None) => None,
                Err(err) => Some((Err(err), pages)),
            }
        })
    }
}
