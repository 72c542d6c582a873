use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The aggregation output handed to presentation.
///
/// Every value is a pure function of the sessions, messages and
/// classifications in scope for the active version filter. Percentages are
/// in the range 0..=100 and carry their denominator alongside.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSet {
    pub total_sessions: usize,
    pub active_users: usize,
    pub avg_sessions_per_user: f64,
    pub avg_rating: f64,
    /// Denominator of `avg_rating`
    pub rated_sessions: usize,
    pub dissatisfaction_count: usize,
    pub appreciation_count: usize,
    pub median_words_by_user: f64,
    /// Size of the multiset `median_words_by_user` is taken over
    pub participant_messages: usize,
    pub annotated_transcripts: usize,
    pub annotated_percentage: f64,
    pub good_coaching_percentage: f64,
    /// Denominator of `good_coaching_percentage` (sessions with a coaching tag)
    pub coaching_assessed_sessions: usize,
}

impl MetricSet {
    /// Metric name/value pairs in display order
    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("total_sessions", self.total_sessions as f64),
            ("active_users", self.active_users as f64),
            ("avg_sessions_per_user", self.avg_sessions_per_user),
            ("avg_rating", self.avg_rating),
            ("rated_sessions", self.rated_sessions as f64),
            ("dissatisfaction_count", self.dissatisfaction_count as f64),
            ("appreciation_count", self.appreciation_count as f64),
            ("median_words_by_user", self.median_words_by_user),
            ("participant_messages", self.participant_messages as f64),
            ("annotated_transcripts", self.annotated_transcripts as f64),
            ("annotated_percentage", self.annotated_percentage),
            ("good_coaching_percentage", self.good_coaching_percentage),
            (
                "coaching_assessed_sessions",
                self.coaching_assessed_sessions as f64,
            ),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoachingCounts {
    pub good: usize,
    pub bad: usize,
    pub undetermined: usize,
    pub none: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Supplementary breakdowns shown next to the headline metrics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricBreakdown {
    pub sessions_by_experiment: BTreeMap<String, usize>,
    pub experiments_count: usize,
    pub sessions_by_version: BTreeMap<String, usize>,
    /// Sessions whose team has a name; unnamed teams are left out
    pub sessions_by_team: BTreeMap<String, usize>,
    pub teams_count: usize,
    /// Rated sessions per star, ratings rounded and clamped to 1..=5
    pub rating_distribution: BTreeMap<u8, usize>,
    pub sessions_by_date: BTreeMap<NaiveDate, usize>,
    pub date_range: Option<DateRange>,
    pub total_messages: usize,
    pub bot_messages: usize,
    pub appreciation_messages: usize,
    pub dissatisfaction_messages: usize,
    pub mean_words_by_user: f64,
    pub mean_words_by_bot: f64,
    pub median_words_by_bot: f64,
    pub sessions_with_messages: usize,
    pub annotation_counts: BTreeMap<String, usize>,
    pub coaching: CoachingCounts,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricReport {
    pub metrics: MetricSet,
    pub breakdown: MetricBreakdown,
}
