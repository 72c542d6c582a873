use futures::StreamExt;
use ocsmetrics_cache::{CacheStats, PageCache};
use ocsmetrics_core::{FetchScope, RunConfig};
use ocsmetrics_engine::{Classifier, Dataset, VersionCatalog, VersionFilter, build_filter};
use ocsmetrics_types::wire::{decode_experiment_versions, decode_message, decode_session};
use ocsmetrics_types::{Cursor, Message, MetricReport, ResourceKind, SessionId};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{RunFailure, RunProgress};
use crate::fetcher::PageFetcher;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::{Result, RunError};

/// Counters describing how a successful run got its data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub session_pages: usize,
    pub sessions: usize,
    pub message_sessions: usize,
    /// False when a page limit stopped the session listing early
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_cursor: Option<Cursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

/// Result of a completed run. The dataset is kept so the same fetched data
/// can be re-evaluated under another filter without fetching again.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub report: MetricReport,
    pub dataset: Dataset,
    pub filter: VersionFilter,
    pub stats: RunStats,
}

/// One metrics run: catalog, filter, sessions, messages, aggregation
pub struct Pipeline {
    config: RunConfig,
    fetcher: PageFetcher,
    classifier: Classifier,
    page_limit: Option<usize>,
}

impl Pipeline {
    pub fn new(config: RunConfig, transport: Arc<dyn Transport>, cache: Arc<PageCache>) -> Self {
        let fetcher = PageFetcher::new(transport, cache)
            .with_upstream(config.upstream())
            .with_retry(RetryPolicy::from_config(&config))
            .with_page_size(config.fetch.page_size);
        let classifier = Classifier::new(
            &config.classifier.lexicon,
            config.classifier.coaching_tags.clone(),
            config.classifier.sentiment_scope,
        );

        Self {
            config,
            fetcher,
            classifier,
            page_limit: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.fetcher = self.fetcher.with_cancel(cancel);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.fetcher = self.fetcher.with_retry(retry);
        self
    }

    /// Stop the session listing after `limit` pages
    pub fn with_page_limit(mut self, limit: Option<usize>) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.fetcher.cancel_token().clone()
    }

    pub fn cache(&self) -> &PageCache {
        self.fetcher.cache()
    }

    /// Every experiment version the upstream knows about
    pub async fn fetch_catalog(&self) -> Result<VersionCatalog> {
        let mut pages = self
            .fetcher
            .pages(ResourceKind::Versions, FetchScope::unrestricted(), None);
        let mut versions = Vec::new();

        while let Some(page) = pages.next().await? {
            for item in &page.items {
                let decoded = decode_experiment_versions(item).map_err(|source| RunError::Record {
                    resource: ResourceKind::Versions.to_string(),
                    source,
                })?;
                versions.extend(decoded);
            }
        }
        if pages.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let catalog = VersionCatalog::new(versions);
        tracing::debug!(
            experiments = catalog.experiments().len(),
            versions = catalog.versions().len(),
            "loaded version catalog"
        );
        Ok(catalog)
    }

    pub async fn run(&self) -> std::result::Result<RunReport, RunFailure> {
        let mut progress = RunProgress::default();

        let catalog = match self.fetch_catalog().await {
            Ok(catalog) => catalog,
            Err(err) => return Err(RunFailure::new(err, progress)),
        };
        let filter = match build_filter(&self.config.experiments, &self.config.versions, &catalog) {
            Ok(filter) => filter,
            Err(err) => return Err(RunFailure::new(err, progress)),
        };
        tracing::info!(
            experiments = ?self.config.experiments,
            versions = %self.config.versions,
            "version filter resolved"
        );

        let mut dataset = Dataset::new(catalog).with_scope(filter.clone());
        let complete = match self.fetch_sessions(&filter, &mut dataset, &mut progress).await {
            Ok(complete) => complete,
            Err(err) => return Err(RunFailure::new(err, progress)),
        };
        if let Err(err) = self.fetch_all_messages(&mut dataset, &mut progress).await {
            return Err(RunFailure::new(err, progress));
        }

        let report = match dataset.evaluate(&filter, &self.classifier) {
            Ok(report) => report,
            Err(err) => return Err(RunFailure::new(err, progress)),
        };
        tracing::info!(
            sessions = report.metrics.total_sessions,
            users = report.metrics.active_users,
            "metrics computed"
        );

        let stats = RunStats {
            session_pages: progress.session_pages,
            sessions: dataset.session_count(),
            message_sessions: progress.sessions_with_messages.len(),
            complete,
            resume_cursor: progress.resume_cursor.clone(),
            cache: self
                .cache()
                .is_enabled()
                .then(|| self.cache().stats().ok())
                .flatten(),
        };

        Ok(RunReport {
            report,
            dataset,
            filter,
            stats,
        })
    }

    /// Returns whether the listing ran to its last page
    async fn fetch_sessions(
        &self,
        filter: &VersionFilter,
        dataset: &mut Dataset,
        progress: &mut RunProgress,
    ) -> Result<bool> {
        let scope = match filter.keys() {
            Some(keys) => FetchScope::versions(keys.clone()),
            None => FetchScope::unrestricted(),
        };
        let mut pages = self.fetcher.pages(ResourceKind::Sessions, scope, None);
        if let Some(limit) = self.page_limit {
            pages = pages.limit(limit);
        }

        while let Some(page) = pages.next().await? {
            for item in &page.items {
                let session = decode_session(item).map_err(|source| RunError::Record {
                    resource: ResourceKind::Sessions.to_string(),
                    source,
                })?;
                if filter.retains(&session) {
                    dataset.insert_session(session);
                }
            }
            progress.session_pages += 1;
            progress.sessions_fetched = dataset.session_count();
            progress.resume_cursor = pages.resume_cursor().cloned();
            tracing::debug!(
                page = progress.session_pages,
                sessions = progress.sessions_fetched,
                "session page processed"
            );
        }

        if pages.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        if pages.is_limited() {
            tracing::info!(
                pages = progress.session_pages,
                "page limit reached, session listing is partial"
            );
        }
        Ok(pages.is_complete())
    }

    /// Messages for every session, at most `concurrency_limit` in flight.
    ///
    /// The first failure stops new fetches; fetches already running finish
    /// and are recorded in the progress.
    async fn fetch_all_messages(&self, dataset: &mut Dataset, progress: &mut RunProgress) -> Result<()> {
        let abort = self.fetcher.cancel_token().child_token();
        let scopes: Vec<(SessionId, FetchScope)> = dataset
            .sessions()
            .map(|s| {
                let revision = s.updated_at.to_rfc3339();
                (s.id.clone(), FetchScope::session(s.id.clone()).at_revision(revision))
            })
            .collect();

        let mut results: Vec<(SessionId, Result<Option<Vec<Message>>>)> = futures::stream::iter(scopes)
            .map(|(id, scope)| {
                let abort = abort.clone();
                async move {
                    let result = self.fetch_messages(&id, scope, &abort).await;
                    if result.is_err() {
                        abort.cancel();
                    }
                    (id, result)
                }
            })
            .buffer_unordered(self.config.concurrency_limit.max(1))
            .collect()
            .await;
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let mut first_error = None;
        for (id, result) in results {
            match result {
                Ok(Some(messages)) => {
                    dataset.set_messages(id.clone(), messages);
                    progress.sessions_with_messages.push(id);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(session = %id, error = %err, "message fetch failed");
                    progress.failed_sessions.push(id);
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        if self.fetcher.cancel_token().is_cancelled() {
            return Err(RunError::Cancelled);
        }
        Ok(())
    }

    /// `None` when the fetch was stopped before the last page
    async fn fetch_messages(
        &self,
        session_id: &SessionId,
        scope: FetchScope,
        abort: &CancellationToken,
    ) -> Result<Option<Vec<Message>>> {
        let mut pages = self
            .fetcher
            .pages(ResourceKind::Messages, scope, None)
            .with_cancel(abort.clone());
        let mut messages = Vec::new();

        while let Some(page) = pages.next().await? {
            for item in &page.items {
                let message = decode_message(session_id, messages.len(), item).map_err(|source| {
                    RunError::Record {
                        resource: format!("messages/{}", session_id),
                        source,
                    }
                })?;
                messages.push(message);
            }
        }

        if pages.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(messages))
    }
}
