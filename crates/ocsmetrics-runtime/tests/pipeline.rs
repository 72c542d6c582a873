use ocsmetrics_cache::PageCache;
use ocsmetrics_core::RunConfig;
use ocsmetrics_engine::{Classifier, VersionFilter};
use ocsmetrics_runtime::{Pipeline, RetryPolicy, RunError};
use ocsmetrics_testing::ScriptedTransport;
use ocsmetrics_testing::fixtures::{
    bot_message, experiment, paginate_after, participant_message, session, session_with, touched,
};
use ocsmetrics_types::{
    Cursor, FetchErrorKind, ResourceKind, SessionId, VersionKey, VersionSelection,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn upstream() -> ScriptedTransport {
    ScriptedTransport::new()
        .with_experiments(vec![experiment("ECD Coach", &[1, 2], 2)])
        .with_sessions(
            vec![
                session_with("s-1", "P1", "ECD Coach", 1, &[], None),
                session_with("s-2", "P1", "ECD Coach", 2, &["coaching_good"], Some(4.0)),
                session_with("s-3", "P2", "ECD Coach", 2, &["coaching_bad"], None),
                session_with("s-4", "P3", "ECD Coach", 2, &[], Some(5.0)),
            ],
            2,
        )
        .with_messages("s-1", vec![participant_message("thanks a lot")])
        .with_messages(
            "s-2",
            vec![participant_message("thank you"), bot_message("hi")],
        )
        .with_messages("s-3", vec![participant_message("this is wrong")])
        .with_messages("s-4", Vec::new())
}

fn config(versions: VersionSelection) -> RunConfig {
    RunConfig {
        api_key: "test".to_string(),
        experiments: vec!["ECD Coach".to_string()],
        versions,
        concurrency_limit: 2,
        ..RunConfig::default()
    }
}

fn pipeline(config: RunConfig, transport: &Arc<ScriptedTransport>, cache: Arc<PageCache>) -> Pipeline {
    Pipeline::new(config, transport.clone(), cache).with_retry(RetryPolicy::no_backoff(1))
}

#[tokio::test]
async fn test_run_computes_metrics_for_selected_versions() {
    let transport = Arc::new(upstream());
    let cache = Arc::new(PageCache::in_memory(1 << 20));
    let run = pipeline(config(VersionSelection::labels(["v2"])), &transport, cache)
        .run()
        .await
        .unwrap();

    let metrics = &run.report.metrics;
    assert_eq!(metrics.total_sessions, 3);
    assert_eq!(metrics.active_users, 3);
    assert_eq!(metrics.avg_sessions_per_user, 1.0);
    assert_eq!(metrics.avg_rating, 4.5);
    assert_eq!(metrics.rated_sessions, 2);
    assert_eq!(metrics.appreciation_count, 1);
    assert_eq!(metrics.dissatisfaction_count, 1);
    assert_eq!(metrics.participant_messages, 2);
    assert_eq!(metrics.median_words_by_user, 2.5);
    assert_eq!(metrics.annotated_transcripts, 2);
    assert_eq!(metrics.coaching_assessed_sessions, 2);
    assert_eq!(metrics.good_coaching_percentage, 50.0);

    // s-1 is outside the filter, so its messages are never requested
    assert_eq!(transport.request_count(ResourceKind::Messages), 3);
    assert!(run.stats.complete);
    assert_eq!(run.stats.session_pages, 2);
    assert_eq!(run.stats.message_sessions, 3);
}

#[tokio::test]
async fn test_dataset_can_be_reevaluated_without_refetching() {
    let transport = Arc::new(upstream());
    let cache = Arc::new(PageCache::disabled());
    let run = pipeline(config(VersionSelection::All), &transport, cache)
        .run()
        .await
        .unwrap();
    let requests = transport.requests().len();
    let classifier = Classifier::default();

    let all = run.dataset.evaluate(&run.filter, &classifier).unwrap();
    assert_eq!(all.metrics.total_sessions, 4);
    assert_eq!(all.metrics.active_users, 3);

    let v1 = VersionFilter::only([VersionKey::new("ECD Coach", "v1")]);
    let narrowed = run.dataset.evaluate(&v1, &classifier).unwrap();
    assert_eq!(narrowed.metrics.total_sessions, 1);
    assert_eq!(transport.requests().len(), requests);
}

#[tokio::test]
async fn test_reevaluating_beyond_fetched_versions_fails() {
    let transport = Arc::new(upstream());
    let run = pipeline(
        config(VersionSelection::labels(["v2"])),
        &transport,
        Arc::new(PageCache::disabled()),
    )
    .run()
    .await
    .unwrap();
    let classifier = Classifier::default();

    let v1 = VersionFilter::only([VersionKey::new("ECD Coach", "v1")]);
    let err = run.dataset.evaluate(&v1, &classifier).unwrap_err();
    assert!(err.reason.contains("ECD Coach@v1"), "{}", err);
    assert!(
        run.dataset
            .evaluate(&VersionFilter::unrestricted(), &classifier)
            .is_err()
    );
    assert_eq!(run.dataset.scope(), &run.filter);
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let transport = Arc::new(upstream());
    let cache = Arc::new(PageCache::in_memory(1 << 20));

    let first = pipeline(config(VersionSelection::All), &transport, cache.clone())
        .run()
        .await
        .unwrap();
    let second = pipeline(config(VersionSelection::All), &transport, cache.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(first.report, second.report);
    // Listing heads are refetched, everything behind them comes from cache
    assert_eq!(transport.request_count(ResourceKind::Versions), 2);
    assert_eq!(transport.request_count(ResourceKind::Sessions), 3);
    assert_eq!(transport.request_count(ResourceKind::Messages), 4);
    assert!(second.stats.cache.is_some_and(|stats| stats.hits == 5));
}

#[tokio::test]
async fn test_projects_do_not_share_cache_entries() {
    let cache = Arc::new(PageCache::in_memory(1 << 20));
    let first = Arc::new(upstream());
    let other = Arc::new(
        ScriptedTransport::new()
            .with_experiments(vec![experiment("ECD Coach", &[1, 2], 2)])
            .with_sessions(
                vec![
                    session("s-1", "P9", "ECD Coach", 2),
                    session("s-2", "P9", "ECD Coach", 2),
                    session("s-3", "P8", "ECD Coach", 2),
                ],
                2,
            )
            .with_messages("s-1", vec![participant_message("hello")])
            .with_messages("s-2", Vec::new())
            .with_messages("s-3", Vec::new()),
    );

    let project_a = RunConfig {
        project_id: Some("proj-a".to_string()),
        ..config(VersionSelection::All)
    };
    let project_b = RunConfig {
        api_base_url: "https://ocs.example.org/api".to_string(),
        project_id: Some("proj-b".to_string()),
        ..config(VersionSelection::All)
    };

    let a = pipeline(project_a, &first, cache.clone()).run().await.unwrap();
    let b = pipeline(project_b, &other, cache.clone()).run().await.unwrap();

    assert_eq!(a.report.metrics.total_sessions, 4);
    assert_eq!(b.report.metrics.total_sessions, 3);
    assert_eq!(b.report.metrics.active_users, 2);
    assert_eq!(b.report.metrics.appreciation_count, 0);
    assert_eq!(other.request_count(ResourceKind::Sessions), 2);
    assert_eq!(other.request_count(ResourceKind::Messages), 3);
}

#[tokio::test]
async fn test_cached_run_sees_new_sessions_and_messages() {
    let cache = Arc::new(PageCache::in_memory(1 << 20));
    let listing = |sessions: Vec<Value>| {
        ScriptedTransport::new()
            .with_experiments(vec![experiment("ECD Coach", &[1, 2], 2)])
            .with_pages(ResourceKind::Sessions, None, paginate_after(sessions, 2))
            .with_messages("s-1", vec![participant_message("thanks a lot")])
            .with_messages("s-3", vec![participant_message("this is wrong")])
            .with_messages("s-4", Vec::new())
    };

    let before = Arc::new(
        listing(vec![
            session("s-1", "P1", "ECD Coach", 1),
            session("s-2", "P1", "ECD Coach", 2),
            session("s-3", "P2", "ECD Coach", 2),
            session("s-4", "P3", "ECD Coach", 2),
        ])
        .with_messages("s-2", vec![participant_message("thank you"), bot_message("hi")]),
    );
    let after = Arc::new(
        listing(vec![
            session("s-5", "P4", "ECD Coach", 2),
            session("s-1", "P1", "ECD Coach", 1),
            touched(session("s-2", "P1", "ECD Coach", 2), "2025-03-02T10:00:00Z"),
            session("s-3", "P2", "ECD Coach", 2),
            session("s-4", "P3", "ECD Coach", 2),
        ])
        .with_messages(
            "s-2",
            vec![
                participant_message("thank you"),
                bot_message("hi"),
                participant_message("one more question"),
            ],
        )
        .with_messages("s-5", vec![participant_message("hello coach")]),
    );

    let first = pipeline(config(VersionSelection::All), &before, cache.clone())
        .run()
        .await
        .unwrap();
    let second = pipeline(config(VersionSelection::All), &after, cache.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(first.report.metrics.total_sessions, 4);
    assert_eq!(first.report.metrics.participant_messages, 3);
    assert_eq!(second.report.metrics.total_sessions, 5);
    assert_eq!(second.report.metrics.active_users, 4);
    assert_eq!(second.report.metrics.participant_messages, 5);

    // Only the new session and the changed one need their messages again
    let refetched: Vec<Option<SessionId>> = after
        .requests()
        .into_iter()
        .filter(|request| request.resource == ResourceKind::Messages)
        .map(|request| request.session)
        .collect();
    assert_eq!(refetched.len(), 2);
    assert!(refetched.contains(&Some(SessionId::new("s-2"))));
    assert!(refetched.contains(&Some(SessionId::new("s-5"))));
}

#[tokio::test]
async fn test_unknown_version_fails_before_listing_sessions() {
    let transport = Arc::new(upstream());
    let failure = pipeline(
        config(VersionSelection::labels(["v9"])),
        &transport,
        Arc::new(PageCache::disabled()),
    )
    .run()
    .await
    .unwrap_err();

    match &failure.error {
        RunError::UnknownVersion(err) => assert_eq!(err.label, "v9"),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(transport.request_count(ResourceKind::Sessions), 0);
}

#[tokio::test]
async fn test_message_failure_aborts_run_with_progress() {
    let transport = Arc::new(upstream().broken(
        ResourceKind::Messages,
        Some("s-3"),
        FetchErrorKind::Server(500),
    ));
    let failure = pipeline(
        config(VersionSelection::All),
        &transport,
        Arc::new(PageCache::disabled()),
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(failure.error, RunError::Fetch(ref err) if err.attempts == 2));
    assert_eq!(failure.progress.sessions_fetched, 4);
    assert_eq!(failure.progress.failed_sessions, vec![SessionId::new("s-3")]);
    assert!(!failure.progress.sessions_with_messages.contains(&SessionId::new("s-3")));
}

#[tokio::test]
async fn test_cancelled_run_reports_cancellation() {
    let cancel = CancellationToken::new();
    let transport = Arc::new(upstream().cancel_after(ResourceKind::Sessions, 1, cancel.clone()));
    let failure = pipeline(
        config(VersionSelection::All),
        &transport,
        Arc::new(PageCache::disabled()),
    )
    .with_cancel(cancel)
    .run()
    .await
    .unwrap_err();

    assert!(failure.is_cancelled());
    assert_eq!(failure.progress.session_pages, 1);
    assert_eq!(failure.progress.resume_cursor, Some(Cursor::new("sessions-2")));
    assert_eq!(transport.request_count(ResourceKind::Messages), 0);
}

#[tokio::test]
async fn test_page_limit_produces_partial_report() {
    let transport = Arc::new(upstream());
    let run = pipeline(
        config(VersionSelection::All),
        &transport,
        Arc::new(PageCache::disabled()),
    )
    .with_page_limit(Some(1))
    .run()
    .await
    .unwrap();

    assert!(!run.stats.complete);
    assert_eq!(run.stats.resume_cursor, Some(Cursor::new("sessions-2")));
    assert_eq!(run.report.metrics.total_sessions, 2);
}

#[tokio::test]
async fn test_repeated_session_counts_once() {
    let transport = Arc::new(
        upstream().with_sessions(
            vec![
                session("s-1", "P1", "ECD Coach", 2),
                session("s-2", "P2", "ECD Coach", 2),
                session("s-1", "P1", "ECD Coach", 2),
            ],
            2,
        ),
    );
    let run = pipeline(
        config(VersionSelection::All),
        &transport,
        Arc::new(PageCache::disabled()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(run.report.metrics.total_sessions, 2);
    assert_eq!(run.stats.sessions, 2);
}
