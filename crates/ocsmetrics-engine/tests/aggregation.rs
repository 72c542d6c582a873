use chrono::{TimeZone, Utc};
use ocsmetrics_engine::{
    AggregationError, Classifications, Classifier, Dataset, VersionCatalog, VersionFilter,
    aggregate, build_filter,
};
use ocsmetrics_types::*;
use std::collections::{BTreeMap, BTreeSet};

fn session(id: &str, participant: &str, version: &str, tags: &[&str], rating: Option<f64>) -> Session {
    let day = id.bytes().last().map(|b| u32::from(b % 9) + 1).unwrap_or(1);
    let at = Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap();
    Session {
        id: SessionId::new(id),
        participant: ParticipantId::new(participant),
        created_at: at,
        updated_at: at,
        experiment: ExperimentRef {
            id: "e-1".to_string(),
            name: "ECD Coach".to_string(),
            version: version.to_string(),
        },
        team: "ECD Nigeria".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        rating,
    }
}

fn message(session_id: &str, index: usize, role: AuthorRole, content: &str) -> Message {
    Message {
        id: format!("{}:{}", session_id, index),
        session_id: SessionId::new(session_id),
        role,
        content: content.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, index as u32).unwrap(),
    }
}

fn catalog() -> VersionCatalog {
    VersionCatalog::new(
        ["v1", "v2"]
            .iter()
            .map(|label| ExperimentVersion {
                experiment: "ECD Coach".to_string(),
                label: label.to_string(),
                is_default: *label == "v2",
                description: String::new(),
            })
            .collect(),
    )
}

fn run(
    sessions: &[Session],
    messages: &BTreeMap<SessionId, Vec<Message>>,
) -> std::result::Result<MetricReport, AggregationError> {
    let labels = catalog().labels();
    let classifications = Classifier::default().classify_all(sessions, messages, &labels);
    aggregate(sessions, messages, &classifications)
}

#[test]
fn test_sessions_per_user() {
    let sessions = vec![
        session("s-1", "P1", "v1", &[], None),
        session("s-2", "P1", "v2", &[], None),
        session("s-3", "P2", "v2", &[], None),
    ];
    let metrics = run(&sessions, &BTreeMap::new()).unwrap().metrics;

    assert_eq!(metrics.total_sessions, 3);
    assert_eq!(metrics.active_users, 2);
    assert_eq!(metrics.avg_sessions_per_user, 1.5);
}

#[test]
fn test_ratings_exclude_unrated_sessions() {
    let sessions = vec![
        session("s-1", "P1", "v1", &[], Some(4.0)),
        session("s-2", "P1", "v1", &[], None),
        session("s-3", "P2", "v1", &[], Some(5.0)),
    ];
    let metrics = run(&sessions, &BTreeMap::new()).unwrap().metrics;
    assert_eq!(metrics.avg_rating, 4.5);
    assert_eq!(metrics.rated_sessions, 2);

    let unrated = run(&sessions[1..2], &BTreeMap::new()).unwrap().metrics;
    assert_eq!(unrated.avg_rating, 0.0);
    assert_eq!(unrated.rated_sessions, 0);
}

#[test]
fn test_sentiment_counts_sessions_not_messages() {
    let sessions = vec![
        session("s-1", "P1", "v1", &[], None),
        session("s-2", "P2", "v1", &[], None),
    ];
    let messages: BTreeMap<SessionId, Vec<Message>> = [
        (
            SessionId::new("s-1"),
            vec![
                message("s-1", 0, AuthorRole::Participant, "thank you"),
                message("s-1", 1, AuthorRole::Participant, "that was so helpful"),
                message("s-1", 2, AuthorRole::Participant, "but one part was wrong"),
            ],
        ),
        (
            SessionId::new("s-2"),
            vec![message("s-2", 0, AuthorRole::Bot, "Hello")],
        ),
    ]
    .into_iter()
    .collect();

    let report = run(&sessions, &messages).unwrap();
    assert_eq!(report.metrics.appreciation_count, 1);
    assert_eq!(report.metrics.dissatisfaction_count, 1);
    assert_eq!(report.breakdown.appreciation_messages, 2);
    assert_eq!(report.breakdown.total_messages, 4);
    assert_eq!(report.breakdown.bot_messages, 1);
    assert_eq!(report.breakdown.sessions_with_messages, 2);
}

#[test]
fn test_median_over_participant_messages_only() {
    let sessions = vec![
        session("s-1", "P1", "v1", &[], None),
        session("s-2", "P2", "v1", &[], None),
    ];
    let messages: BTreeMap<SessionId, Vec<Message>> = [
        (
            SessionId::new("s-1"),
            vec![
                message("s-1", 0, AuthorRole::Participant, "one"),
                message("s-1", 1, AuthorRole::Bot, "a very long bot answer that is ignored"),
                message("s-1", 2, AuthorRole::Participant, "one two three four"),
            ],
        ),
        (
            SessionId::new("s-2"),
            vec![
                message("s-2", 0, AuthorRole::Participant, "one two"),
                message("s-2", 1, AuthorRole::System, "session started"),
                message("s-2", 2, AuthorRole::Participant, "one two three"),
            ],
        ),
    ]
    .into_iter()
    .collect();

    let report = run(&sessions, &messages).unwrap();
    assert_eq!(report.metrics.participant_messages, 4);
    assert_eq!(report.metrics.median_words_by_user, 2.5);
    assert_eq!(report.breakdown.mean_words_by_user, 2.5);
}

#[test]
fn test_coaching_denominator_excludes_unassessed() {
    let sessions = vec![
        session("s-1", "P1", "v2", &["v2", "coaching_good", "safe"], None),
        session("s-2", "P1", "v2", &["coaching_bad"], None),
        session("s-3", "P2", "v2", &["coaching_undetermined"], None),
        session("s-4", "P2", "v2", &["v2"], None),
        session("s-5", "P3", "v1", &[], None),
    ];
    let report = run(&sessions, &BTreeMap::new()).unwrap();
    let metrics = &report.metrics;
    let coaching = report.breakdown.coaching;

    assert_eq!(metrics.coaching_assessed_sessions, 3);
    assert_eq!(
        metrics.coaching_assessed_sessions + coaching.none,
        metrics.total_sessions
    );
    assert!((metrics.good_coaching_percentage - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(metrics.annotated_transcripts, 3);
    assert_eq!(metrics.annotated_percentage, 60.0);
    assert_eq!(report.breakdown.annotation_counts.get("safe"), Some(&1));
    assert_eq!(report.breakdown.annotation_counts.get("v2"), None);
}

#[test]
fn test_no_assessed_sessions_yields_zero_percentage() {
    let sessions = vec![session("s-1", "P1", "v1", &["safe"], None)];
    let metrics = run(&sessions, &BTreeMap::new()).unwrap().metrics;
    assert_eq!(metrics.coaching_assessed_sessions, 0);
    assert_eq!(metrics.good_coaching_percentage, 0.0);
}

#[test]
fn test_orphan_messages_are_rejected() {
    let sessions = vec![session("s-1", "P1", "v1", &[], None)];
    let messages: BTreeMap<SessionId, Vec<Message>> = [(
        SessionId::new("s-9"),
        vec![message("s-9", 0, AuthorRole::Participant, "hi")],
    )]
    .into_iter()
    .collect();

    let classifications = Classifications::new();
    let err = aggregate(&sessions, &messages, &classifications).unwrap_err();
    assert!(err.reason.contains("s-9"), "{}", err);
}

#[test]
fn test_foreign_parent_is_rejected() {
    let sessions = vec![
        session("s-1", "P1", "v1", &[], None),
        session("s-2", "P1", "v1", &[], None),
    ];
    let messages: BTreeMap<SessionId, Vec<Message>> = [(
        SessionId::new("s-1"),
        vec![message("s-2", 0, AuthorRole::Participant, "hi")],
    )]
    .into_iter()
    .collect();

    let err = run(&sessions, &messages).unwrap_err();
    assert!(err.reason.contains("listed under 's-1'"), "{}", err);
}

#[test]
fn test_superseded_sessions_count_once() {
    let sessions = vec![
        session("s-1", "P1", "v1", &[], None),
        session("s-1", "P2", "v1", &["coaching_good"], None),
    ];
    let report = run(&sessions, &BTreeMap::new()).unwrap();
    assert_eq!(report.metrics.total_sessions, 1);
    assert_eq!(report.metrics.coaching_assessed_sessions, 1);
}

#[test]
fn test_breakdown_counts_teams_and_experiments() {
    let mut sessions = vec![
        session("s-1", "P1", "v1", &[], None),
        session("s-2", "P2", "v1", &[], None),
        session("s-3", "P3", "v2", &[], None),
        session("s-4", "P4", "v2", &[], None),
    ];
    sessions[1].team = "ECD Kenya".to_string();
    sessions[2].team = String::new();
    sessions[3].experiment.name = "Nutrition Coach".to_string();

    let breakdown = run(&sessions, &BTreeMap::new()).unwrap().breakdown;
    assert_eq!(breakdown.teams_count, 2);
    assert_eq!(breakdown.sessions_by_team.get("ECD Nigeria"), Some(&2));
    assert_eq!(breakdown.sessions_by_team.get("ECD Kenya"), Some(&1));
    assert_eq!(breakdown.experiments_count, 2);
    assert_eq!(breakdown.sessions_by_experiment.get("Nutrition Coach"), Some(&1));
}

#[test]
fn test_rating_distribution_buckets_by_star() {
    let sessions = vec![
        session("s-1", "P1", "v1", &[], Some(5.0)),
        session("s-2", "P1", "v1", &[], Some(4.6)),
        session("s-3", "P2", "v1", &[], Some(2.0)),
        session("s-4", "P2", "v1", &[], None),
    ];
    let breakdown = run(&sessions, &BTreeMap::new()).unwrap().breakdown;

    let expected: BTreeMap<u8, usize> = [(2, 1), (5, 2)].into_iter().collect();
    assert_eq!(breakdown.rating_distribution, expected);
}

#[test]
fn test_bot_word_statistics() {
    let sessions = vec![session("s-1", "P1", "v1", &[], None)];
    let messages: BTreeMap<SessionId, Vec<Message>> = [(
        SessionId::new("s-1"),
        vec![
            message("s-1", 0, AuthorRole::Bot, "hello there"),
            message("s-1", 1, AuthorRole::Participant, "hi"),
            message("s-1", 2, AuthorRole::Bot, "how are the children doing today"),
            message("s-1", 3, AuthorRole::Bot, "great"),
            message("s-1", 4, AuthorRole::System, "a system note is never counted"),
        ],
    )]
    .into_iter()
    .collect();

    let breakdown = run(&sessions, &messages).unwrap().breakdown;
    assert_eq!(breakdown.bot_messages, 3);
    assert_eq!(breakdown.median_words_by_bot, 2.0);
    assert_eq!(breakdown.mean_words_by_bot, 3.0);
    assert_eq!(breakdown.mean_words_by_user, 1.0);
}

fn dataset() -> Dataset {
    let mut dataset = Dataset::new(catalog());
    for (id, participant, version) in [
        ("s-1", "P1", "v1"),
        ("s-2", "P1", "v2"),
        ("s-3", "P2", "v2"),
        ("s-4", "P3", "v2"),
    ] {
        dataset.insert_session(session(id, participant, version, &["coaching_good"], Some(3.0)));
        dataset.set_messages(
            SessionId::new(id),
            vec![message(id, 0, AuthorRole::Participant, "thank you coach")],
        );
    }
    dataset
}

#[test]
fn test_narrower_filter_never_has_more_sessions() {
    let dataset = dataset();
    let classifier = Classifier::default();
    let filters = [
        VersionFilter::only([]),
        VersionFilter::only([VersionKey::new("ECD Coach", "v1")]),
        VersionFilter::only([VersionKey::new("ECD Coach", "v2")]),
        VersionFilter::only([
            VersionKey::new("ECD Coach", "v1"),
            VersionKey::new("ECD Coach", "v2"),
        ]),
        VersionFilter::unrestricted(),
    ];

    for narrow in &filters {
        for wide in &filters {
            let narrow_keys: Option<BTreeSet<_>> = narrow.keys().cloned();
            let is_subset = match (narrow_keys, wide.keys()) {
                (_, None) => true,
                (None, Some(_)) => false,
                (Some(n), Some(w)) => n.is_subset(w),
            };
            if !is_subset {
                continue;
            }
            let narrow_total = dataset.evaluate(narrow, &classifier).unwrap().metrics.total_sessions;
            let wide_total = dataset.evaluate(wide, &classifier).unwrap().metrics.total_sessions;
            assert!(narrow_total <= wide_total);
        }
    }
}

#[test]
fn test_reevaluation_is_stateless() {
    let dataset = dataset();
    let classifier = Classifier::default();
    let v1 = build_filter(&[], &VersionSelection::labels(["v1"]), dataset.catalog()).unwrap();
    let all = VersionFilter::unrestricted();

    let first = dataset.evaluate(&v1, &classifier).unwrap();
    let _ = dataset.evaluate(&all, &classifier).unwrap();
    let again = dataset.evaluate(&v1, &classifier).unwrap();

    assert_eq!(first, again);
    assert_eq!(first.metrics.total_sessions, 1);
    assert_eq!(dataset.evaluate(&all, &classifier).unwrap().metrics.total_sessions, 4);
}

#[test]
fn test_report_snapshot() {
    let report = dataset()
        .evaluate(&VersionFilter::unrestricted(), &Classifier::default())
        .unwrap();

    insta::assert_json_snapshot!(report.metrics, @r#"
    {
      "total_sessions": 4,
      "active_users": 3,
      "avg_sessions_per_user": 1.3333333333333333,
      "avg_rating": 3.0,
      "rated_sessions": 4,
      "dissatisfaction_count": 0,
      "appreciation_count": 4,
      "median_words_by_user": 3.0,
      "participant_messages": 4,
      "annotated_transcripts": 4,
      "annotated_percentage": 100.0,
      "good_coaching_percentage": 100.0,
      "coaching_assessed_sessions": 4
    }
    "#);
}

#[test]
fn test_filter_wider_than_fetch_scope_is_rejected() {
    let v2 = VersionFilter::only([VersionKey::new("ECD Coach", "v2")]);
    let mut dataset = Dataset::new(catalog()).with_scope(v2.clone());
    dataset.insert_session(session("s-2", "P1", "v2", &[], None));

    let classifier = Classifier::default();
    assert_eq!(dataset.evaluate(&v2, &classifier).unwrap().metrics.total_sessions, 1);
    assert!(dataset.evaluate(&VersionFilter::only([]), &classifier).is_ok());

    let err = dataset
        .evaluate(&VersionFilter::only([VersionKey::new("ECD Coach", "v1")]), &classifier)
        .unwrap_err();
    assert!(err.reason.contains("ECD Coach@v1"), "{}", err);
    assert!(dataset.evaluate(&VersionFilter::unrestricted(), &classifier).is_err());
}
