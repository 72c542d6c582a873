use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-message lexical classification. Derived, never persisted across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageClassification {
    pub is_appreciation: bool,
    pub is_dissatisfaction: bool,
    pub word_count: u32,
}

/// Reviewer judgement of coaching quality, derived from annotation tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachingQuality {
    Good,
    Bad,
    Undetermined,
    /// No coaching tag present; excluded from coaching percentages
    None,
}

impl CoachingQuality {
    pub fn is_assessed(self) -> bool {
        self != CoachingQuality::None
    }
}

/// Per-session classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClassification {
    /// Tags that are not version tags
    pub annotation_tags: BTreeSet<String>,
    pub is_annotated: bool,
    pub coaching_quality: CoachingQuality,
    /// At least one in-scope message expressed appreciation
    pub has_appreciation: bool,
    /// At least one in-scope message expressed dissatisfaction
    pub has_dissatisfaction: bool,
}

/// Word lists driving sentiment detection.
///
/// Matching is a case-insensitive substring test, so `thank` also matches
/// `thanks` and `thankful`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexicon {
    pub appreciation: Vec<String>,
    pub dissatisfaction: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            appreciation: ["thank", "great", "helpful", "appreciate"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            dissatisfaction: ["bad", "wrong", "frustrated", "unhappy"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Annotation tags that carry a coaching-quality judgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachingTags {
    pub good: String,
    pub bad: String,
    pub undetermined: String,
}

impl Default for CoachingTags {
    fn default() -> Self {
        Self {
            good: "coaching_good".to_string(),
            bad: "coaching_bad".to_string(),
            undetermined: "coaching_undetermined".to_string(),
        }
    }
}

/// Which messages contribute to a session's sentiment flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentScope {
    #[default]
    AllMessages,
    ParticipantOnly,
}
