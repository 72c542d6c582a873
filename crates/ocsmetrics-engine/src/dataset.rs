use ocsmetrics_types::{Message, MetricReport, Session, SessionId};
use std::collections::BTreeMap;

use crate::aggregator::aggregate;
use crate::classifier::Classifier;
use crate::error::AggregationError;
use crate::filter::{VersionCatalog, VersionFilter};

/// A materialized session/message set plus the version catalog it was
/// fetched against.
///
/// `evaluate` recomputes a report for any filter within the fetch scope from
/// scratch, so switching filters never carries state over from a previous
/// evaluation. Sessions outside the scope were never fetched, so a filter
/// reaching beyond it is rejected rather than reported short.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    sessions: BTreeMap<SessionId, Session>,
    messages: BTreeMap<SessionId, Vec<Message>>,
    catalog: VersionCatalog,
    scope: VersionFilter,
}

impl Dataset {
    pub fn new(catalog: VersionCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    /// Record the filter the sessions were fetched under
    pub fn with_scope(mut self, scope: VersionFilter) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> &VersionFilter {
        &self.scope
    }

    /// Insert or supersede a session. A superseded session keeps no messages
    /// from its earlier occurrence.
    pub fn insert_session(&mut self, session: Session) {
        if self.sessions.insert(session.id.clone(), session.clone()).is_some() {
            self.messages.remove(&session.id);
        }
    }

    pub fn set_messages(&mut self, session_id: SessionId, messages: Vec<Message>) {
        self.messages.insert(session_id, messages);
    }

    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn messages(&self) -> &BTreeMap<SessionId, Vec<Message>> {
        &self.messages
    }

    pub fn evaluate(
        &self,
        filter: &VersionFilter,
        classifier: &Classifier,
    ) -> Result<MetricReport, AggregationError> {
        if !filter.is_within(&self.scope) {
            let fetched = self.scope.keys().cloned().unwrap_or_default();
            let outside = filter
                .keys()
                .into_iter()
                .flatten()
                .filter(|key| !fetched.contains(*key));
            return Err(AggregationError::outside_scope(outside));
        }

        let retained: Vec<Session> = self
            .sessions
            .values()
            .filter(|session| filter.retains(session))
            .cloned()
            .collect();

        let messages: BTreeMap<SessionId, Vec<Message>> = retained
            .iter()
            .filter_map(|session| {
                self.messages
                    .get(&session.id)
                    .map(|messages| (session.id.clone(), messages.clone()))
            })
            .collect();

        let labels = self.catalog.labels();
        let classifications = classifier.classify_all(&retained, &messages, &labels);
        aggregate(&retained, &messages, &classifications)
    }
}
