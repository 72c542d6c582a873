use ocsmetrics_types::{
    CoachingQuality, CoachingTags, Lexicon, Message, MessageClassification, SentimentScope,
    Session, SessionClassification, SessionId,
};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static VERSION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:version|v)?[\s_\-.:]*").unwrap());

/// Canonical form used to compare version tags with version labels.
///
/// Lowercases, trims and strips a leading `version`/`v` plus separators, so
/// `V2`, `version 2`, `v-2` and `2` all normalise to `2`. Returns `None` when
/// nothing is left.
pub fn normalize_version_tag(tag: &str) -> Option<String> {
    let lowered = tag.trim().to_lowercase();
    let stripped = VERSION_PREFIX.replace(&lowered, "");
    let stripped = stripped.trim();
    (!stripped.is_empty()).then(|| stripped.to_string())
}

/// Whether `tag` equals, or is derivable from, one of `version_labels`
pub fn is_version_tag(tag: &str, version_labels: &BTreeSet<String>) -> bool {
    if version_labels.contains(tag) {
        return true;
    }
    let Some(normalized) = normalize_version_tag(tag) else {
        return false;
    };
    version_labels
        .iter()
        .any(|label| normalize_version_tag(label).as_deref() == Some(normalized.as_str()))
}

/// Classifications of one session and its messages, index-aligned with the
/// session's message list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSession {
    pub session: SessionClassification,
    pub messages: Vec<MessageClassification>,
}

pub type Classifications = BTreeMap<SessionId, ClassifiedSession>;

/// Table-driven lexical classifier.
///
/// Every input that influences a result (lexicon, coaching tags, scope and
/// the version-label set passed per call) is explicit, so classification is
/// reproducible across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    appreciation: Vec<String>,
    dissatisfaction: Vec<String>,
    coaching_tags: CoachingTags,
    scope: SentimentScope,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&Lexicon::default(), CoachingTags::default(), SentimentScope::default())
    }
}

impl Classifier {
    pub fn new(lexicon: &Lexicon, coaching_tags: CoachingTags, scope: SentimentScope) -> Self {
        let lowered = |terms: &[String]| -> Vec<String> {
            terms
                .iter()
                .map(|term| term.trim().to_lowercase())
                .filter(|term| !term.is_empty())
                .collect()
        };

        Self {
            appreciation: lowered(&lexicon.appreciation),
            dissatisfaction: lowered(&lexicon.dissatisfaction),
            coaching_tags,
            scope,
        }
    }

    pub fn scope(&self) -> SentimentScope {
        self.scope
    }

    pub fn classify_message(&self, message: &Message) -> MessageClassification {
        let content = message.content.to_lowercase();
        let contains_any = |terms: &[String]| terms.iter().any(|term| content.contains(term));

        MessageClassification {
            is_appreciation: contains_any(&self.appreciation),
            is_dissatisfaction: contains_any(&self.dissatisfaction),
            word_count: content.split_whitespace().count() as u32,
        }
    }

    fn coaching_quality(&self, tags: &BTreeSet<String>) -> CoachingQuality {
        let has = |tag: &str| tags.iter().any(|t| t.eq_ignore_ascii_case(tag));

        if has(&self.coaching_tags.good) {
            CoachingQuality::Good
        } else if has(&self.coaching_tags.bad) {
            CoachingQuality::Bad
        } else if has(&self.coaching_tags.undetermined) {
            CoachingQuality::Undetermined
        } else {
            CoachingQuality::None
        }
    }

    /// Session-level classification from tags and already classified messages
    pub fn classify_session(
        &self,
        session: &Session,
        messages: &[Message],
        message_classes: &[MessageClassification],
        version_labels: &BTreeSet<String>,
    ) -> SessionClassification {
        let annotation_tags: BTreeSet<String> = session
            .tags
            .iter()
            .filter(|tag| !is_version_tag(tag, version_labels))
            .cloned()
            .collect();

        let in_scope = messages
            .iter()
            .zip(message_classes)
            .filter(|(message, _)| match self.scope {
                SentimentScope::AllMessages => true,
                SentimentScope::ParticipantOnly => message.is_participant(),
            })
            .map(|(_, class)| class);

        let (mut has_appreciation, mut has_dissatisfaction) = (false, false);
        for class in in_scope {
            has_appreciation |= class.is_appreciation;
            has_dissatisfaction |= class.is_dissatisfaction;
        }

        SessionClassification {
            is_annotated: !annotation_tags.is_empty(),
            coaching_quality: self.coaching_quality(&annotation_tags),
            annotation_tags,
            has_appreciation,
            has_dissatisfaction,
        }
    }

    pub fn classify(
        &self,
        session: &Session,
        messages: &[Message],
        version_labels: &BTreeSet<String>,
    ) -> ClassifiedSession {
        let message_classes: Vec<MessageClassification> =
            messages.iter().map(|m| self.classify_message(m)).collect();
        let session_class =
            self.classify_session(session, messages, &message_classes, version_labels);

        ClassifiedSession {
            session: session_class,
            messages: message_classes,
        }
    }

    /// Classify every session that has an entry in `messages_by_session`;
    /// sessions without one are classified as having no messages.
    pub fn classify_all(
        &self,
        sessions: &[Session],
        messages_by_session: &BTreeMap<SessionId, Vec<Message>>,
        version_labels: &BTreeSet<String>,
    ) -> Classifications {
        sessions
            .iter()
            .map(|session| {
                let messages = messages_by_session
                    .get(&session.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                (
                    session.id.clone(),
                    self.classify(session, messages, version_labels),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ocsmetrics_types::{AuthorRole, ExperimentRef, ParticipantId};

    fn message(role: AuthorRole, content: &str) -> Message {
        Message {
            id: "m".to_string(),
            session_id: SessionId::new("s-1"),
            role,
            content: content.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    fn session(tags: &[&str]) -> Session {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Session {
            id: SessionId::new("s-1"),
            participant: ParticipantId::new("p-1"),
            created_at: at,
            updated_at: at,
            experiment: ExperimentRef {
                id: "e-1".to_string(),
                name: "ECD Coach".to_string(),
                version: "v2".to_string(),
            },
            team: "ECD".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            rating: None,
        }
    }

    fn labels(labels: &[&str]) -> BTreeSet<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_appreciation_message() {
        let classifier = Classifier::default();
        let class =
            classifier.classify_message(&message(AuthorRole::Participant, "Thank you, this was great"));

        assert_eq!(
            class,
            MessageClassification {
                is_appreciation: true,
                is_dissatisfaction: false,
                word_count: 5,
            }
        );
    }

    #[test]
    fn test_flags_are_independent() {
        let classifier = Classifier::default();
        let both = classifier.classify_message(&message(
            AuthorRole::Participant,
            "thanks, but the answer was wrong",
        ));
        assert!(both.is_appreciation && both.is_dissatisfaction);

        let neither = classifier.classify_message(&message(AuthorRole::Participant, "   "));
        assert!(!neither.is_appreciation && !neither.is_dissatisfaction);
        assert_eq!(neither.word_count, 0);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = Classifier::default();
        let m = message(AuthorRole::Participant, "I am frustrated\tand UNHAPPY\n today");
        assert_eq!(classifier.classify_message(&m), classifier.classify_message(&m));
        assert_eq!(classifier.classify_message(&m).word_count, 6);
    }

    #[test]
    fn test_session_annotations_and_coaching() {
        let classifier = Classifier::default();
        let class = classifier.classify_session(
            &session(&["v2", "coaching_good", "safe"]),
            &[],
            &[],
            &labels(&["v1", "v2"]),
        );

        assert_eq!(class.annotation_tags, labels(&["coaching_good", "safe"]));
        assert!(class.is_annotated);
        assert_eq!(class.coaching_quality, CoachingQuality::Good);
    }

    #[test]
    fn test_derived_version_tags_are_not_annotations() {
        let classifier = Classifier::default();
        let class = classifier.classify_session(
            &session(&["V2", "version 1", "2"]),
            &[],
            &[],
            &labels(&["v1", "v2"]),
        );

        assert!(class.annotation_tags.is_empty());
        assert!(!class.is_annotated);
        assert_eq!(class.coaching_quality, CoachingQuality::None);
    }

    #[test]
    fn test_coaching_precedence() {
        let classifier = Classifier::default();
        let quality = |tags: &[&str]| {
            classifier
                .classify_session(&session(tags), &[], &[], &labels(&[]))
                .coaching_quality
        };

        assert_eq!(quality(&["coaching_bad", "coaching_good"]), CoachingQuality::Good);
        assert_eq!(quality(&["coaching_undetermined", "coaching_bad"]), CoachingQuality::Bad);
        assert_eq!(quality(&["coaching_undetermined"]), CoachingQuality::Undetermined);
        assert_eq!(quality(&["reviewed"]), CoachingQuality::None);
    }

    #[test]
    fn test_sentiment_scope() {
        let messages = vec![
            message(AuthorRole::Bot, "Great question!"),
            message(AuthorRole::Participant, "ok"),
        ];

        let all = Classifier::default().classify(&session(&[]), &messages, &labels(&[]));
        assert!(all.session.has_appreciation);

        let participant_only = Classifier::new(
            &Lexicon::default(),
            CoachingTags::default(),
            SentimentScope::ParticipantOnly,
        )
        .classify(&session(&[]), &messages, &labels(&[]));
        assert!(!participant_only.session.has_appreciation);
        assert_eq!(participant_only.messages.len(), 2);
    }

    #[test]
    fn test_normalize_version_tag() {
        assert_eq!(normalize_version_tag("V2").as_deref(), Some("2"));
        assert_eq!(normalize_version_tag(" version 12 ").as_deref(), Some("12"));
        assert_eq!(normalize_version_tag("v-3").as_deref(), Some("3"));
        assert_eq!(normalize_version_tag("coaching_good").as_deref(), Some("coaching_good"));
        assert_eq!(normalize_version_tag("v"), None);
        assert!(!is_version_tag("vaccines", &labels(&["v1"])));
    }
}
