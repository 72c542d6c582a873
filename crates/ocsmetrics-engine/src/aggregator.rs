use ocsmetrics_types::{
    AuthorRole, CoachingCounts, CoachingQuality, DateRange, Message, MetricBreakdown, MetricReport,
    MetricSet, Session, SessionId,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::classifier::{Classifications, ClassifiedSession};
use crate::error::AggregationError;

/// Median of the full multiset; mean of the two middle values for even sizes
fn median(values: &mut [u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0
    } else {
        f64::from(values[mid])
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn percentage(numerator: usize, denominator: usize) -> f64 {
    ratio(numerator, denominator) * 100.0
}

fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let total: u64 = values.iter().map(|&v| u64::from(v)).sum();
    total as f64 / values.len() as f64
}

fn star(rating: f64) -> u8 {
    rating.round().clamp(1.0, 5.0) as u8
}

/// One retained session with its messages and classifications, validated
struct Row<'a> {
    session: &'a Session,
    messages: &'a [Message],
    classified: &'a ClassifiedSession,
}

fn join<'a>(
    sessions: &'a [Session],
    messages_by_session: &'a BTreeMap<SessionId, Vec<Message>>,
    classifications: &'a Classifications,
) -> Result<Vec<Row<'a>>, AggregationError> {
    // Later occurrences of an id supersede earlier ones
    let mut by_id: BTreeMap<&SessionId, &Session> = BTreeMap::new();
    for session in sessions {
        by_id.insert(&session.id, session);
    }

    for (session_id, messages) in messages_by_session {
        if !by_id.contains_key(session_id) {
            return Err(AggregationError::orphan_messages(session_id));
        }
        for message in messages {
            if &message.session_id == session_id {
                continue;
            }
            if !by_id.contains_key(&message.session_id) {
                return Err(AggregationError::orphan_messages(&message.session_id));
            }
            return Err(AggregationError::new(format!(
                "message '{}' belongs to session '{}' but was listed under '{}'",
                message.id, message.session_id, session_id
            )));
        }
    }

    by_id
        .into_values()
        .map(|session| {
            let messages = messages_by_session
                .get(&session.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let classified = classifications.get(&session.id).ok_or_else(|| {
                AggregationError::new(format!("session '{}' was never classified", session.id))
            })?;
            if classified.messages.len() != messages.len() {
                return Err(AggregationError::new(format!(
                    "session '{}' has {} messages but {} message classifications",
                    session.id,
                    messages.len(),
                    classified.messages.len()
                )));
            }
            Ok(Row {
                session,
                messages,
                classified,
            })
        })
        .collect()
}

/// Derive the metric set and breakdown from a materialized, classified
/// session/message set.
///
/// The result depends only on the inputs: session order, message arrival
/// order and concurrency of the fetch that produced them have no effect.
pub fn aggregate(
    sessions: &[Session],
    messages_by_session: &BTreeMap<SessionId, Vec<Message>>,
    classifications: &Classifications,
) -> Result<MetricReport, AggregationError> {
    let rows = join(sessions, messages_by_session, classifications)?;

    let mut participants = BTreeSet::new();
    let mut rating_sum = 0.0;
    let mut rated_sessions = 0;
    let mut participant_words: Vec<u32> = Vec::new();
    let mut bot_words: Vec<u32> = Vec::new();
    let mut breakdown = MetricBreakdown::default();
    let mut metrics = MetricSet::default();

    for row in &rows {
        let session = row.session;
        let class = &row.classified.session;

        participants.insert(&session.participant);

        if let Some(rating) = session.rating {
            rating_sum += rating;
            rated_sessions += 1;
            *breakdown.rating_distribution.entry(star(rating)).or_default() += 1;
        }

        if class.has_dissatisfaction {
            metrics.dissatisfaction_count += 1;
        }
        if class.has_appreciation {
            metrics.appreciation_count += 1;
        }
        if class.is_annotated {
            metrics.annotated_transcripts += 1;
        }

        match class.coaching_quality {
            CoachingQuality::Good => breakdown.coaching.good += 1,
            CoachingQuality::Bad => breakdown.coaching.bad += 1,
            CoachingQuality::Undetermined => breakdown.coaching.undetermined += 1,
            CoachingQuality::None => breakdown.coaching.none += 1,
        }

        *breakdown
            .sessions_by_experiment
            .entry(session.experiment.name.clone())
            .or_default() += 1;
        *breakdown
            .sessions_by_version
            .entry(session.experiment.version.clone())
            .or_default() += 1;
        if !session.team.is_empty() {
            *breakdown
                .sessions_by_team
                .entry(session.team.clone())
                .or_default() += 1;
        }
        *breakdown
            .sessions_by_date
            .entry(session.created_at.date_naive())
            .or_default() += 1;
        breakdown.date_range = Some(match breakdown.date_range {
            None => DateRange {
                start: session.created_at,
                end: session.created_at,
            },
            Some(range) => DateRange {
                start: range.start.min(session.created_at),
                end: range.end.max(session.created_at),
            },
        });

        for tag in &class.annotation_tags {
            *breakdown.annotation_counts.entry(tag.clone()).or_default() += 1;
        }

        if !row.messages.is_empty() {
            breakdown.sessions_with_messages += 1;
        }
        breakdown.total_messages += row.messages.len();

        for (message, message_class) in row.messages.iter().zip(&row.classified.messages) {
            match message.role {
                AuthorRole::Participant => {
                    participant_words.push(message_class.word_count);
                    if message_class.is_appreciation {
                        breakdown.appreciation_messages += 1;
                    }
                    if message_class.is_dissatisfaction {
                        breakdown.dissatisfaction_messages += 1;
                    }
                }
                AuthorRole::Bot => {
                    breakdown.bot_messages += 1;
                    bot_words.push(message_class.word_count);
                }
                AuthorRole::System => {}
            }
        }
    }

    let total_sessions = rows.len();
    let coaching_assessed = total_sessions - breakdown.coaching.none;

    metrics.total_sessions = total_sessions;
    metrics.active_users = participants.len();
    metrics.avg_sessions_per_user = ratio(total_sessions, participants.len());
    metrics.avg_rating = if rated_sessions == 0 {
        0.0
    } else {
        rating_sum / rated_sessions as f64
    };
    metrics.rated_sessions = rated_sessions;
    metrics.participant_messages = participant_words.len();
    breakdown.mean_words_by_user = mean(&participant_words);
    metrics.median_words_by_user = median(&mut participant_words);
    breakdown.mean_words_by_bot = mean(&bot_words);
    breakdown.median_words_by_bot = median(&mut bot_words);
    breakdown.experiments_count = breakdown.sessions_by_experiment.len();
    breakdown.teams_count = breakdown.sessions_by_team.len();
    metrics.annotated_percentage = percentage(metrics.annotated_transcripts, total_sessions);
    metrics.good_coaching_percentage = percentage(breakdown.coaching.good, coaching_assessed);
    metrics.coaching_assessed_sessions = coaching_assessed;

    Ok(MetricReport { metrics, breakdown })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&mut []), 0.0);
        assert_eq!(median(&mut [7]), 7.0);
        assert_eq!(median(&mut [9, 1, 5]), 5.0);
        assert_eq!(median(&mut [4, 1, 3, 2]), 2.5);
    }

    #[test]
    fn test_median_ignores_order() {
        let mut a = [5, 3, 8, 1, 1, 9];
        let mut b = [9, 1, 8, 3, 5, 1];
        assert_eq!(median(&mut a), median(&mut b));
    }

    #[test]
    fn test_star_buckets() {
        assert_eq!(star(4.4), 4);
        assert_eq!(star(4.5), 5);
        assert_eq!(star(0.0), 1);
        assert_eq!(star(9.0), 5);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1, 2]), 1.5);
    }

    #[test]
    fn test_zero_denominators() {
        assert_eq!(ratio(3, 0), 0.0);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&[], &BTreeMap::new(), &Classifications::new()).unwrap();
        assert_eq!(report.metrics, MetricSet::default());
        assert_eq!(report.breakdown.date_range, None);
        assert_eq!(report.breakdown.coaching, CoachingCounts::default());
    }
}
