use anyhow::Result;
use ocsmetrics_engine::VersionFilter;
use ocsmetrics_runtime::{RunFailure, RunReport};
use ocsmetrics_types::MetricReport;
use owo_colors::OwoColorize;
use serde_json::json;
use std::fmt;

use super::{heading, row, use_color};
use crate::args::OutputFormat;

fn describe_filter(filter: &VersionFilter) -> String {
    match filter.keys() {
        None => "all versions".to_string(),
        Some(keys) if keys.is_empty() => "no versions".to_string(),
        Some(keys) => keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value)
}

pub struct MetricsView<'a> {
    pub report: &'a MetricReport,
    pub scope: String,
    pub color: bool,
}

impl fmt::Display for MetricsView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.report.metrics;
        let color = self.color;

        heading(f, &format!("Coaching metrics ({})", self.scope), color)?;
        row(f, "Total sessions", m.total_sessions, color)?;
        row(f, "Active users", m.active_users, color)?;
        row(f, "Avg sessions per user", format!("{:.2}", m.avg_sessions_per_user), color)?;
        row(
            f,
            "Avg rating",
            format!("{:.2} ({} rated)", m.avg_rating, m.rated_sessions),
            color,
        )?;
        row(f, "Appreciation", m.appreciation_count, color)?;
        row(f, "Dissatisfaction", m.dissatisfaction_count, color)?;
        row(
            f,
            "Median words by user",
            format!("{} ({} messages)", m.median_words_by_user, m.participant_messages),
            color,
        )?;
        row(
            f,
            "Annotated transcripts",
            format!("{} ({})", m.annotated_transcripts, percent(m.annotated_percentage)),
            color,
        )?;
        let good = percent(m.good_coaching_percentage);
        let good = if color && m.coaching_assessed_sessions > 0 {
            good.green().to_string()
        } else {
            good
        };
        row(
            f,
            "Good coaching",
            format!("{} ({} assessed)", good, m.coaching_assessed_sessions),
            color,
        )?;

        let b = &self.report.breakdown;
        writeln!(f)?;
        heading(f, "Breakdown", color)?;
        row(
            f,
            "Experiments / teams",
            format!("{} / {}", b.experiments_count, b.teams_count),
            color,
        )?;
        for (version, count) in &b.sessions_by_version {
            row(f, &format!("Sessions {}", version), count, color)?;
        }
        for (team, count) in &b.sessions_by_team {
            row(f, &format!("Team {}", team), count, color)?;
        }
        if let Some(range) = &b.date_range {
            row(
                f,
                "Date range",
                format!(
                    "{} .. {}",
                    range.start.format("%Y-%m-%d"),
                    range.end.format("%Y-%m-%d")
                ),
                color,
            )?;
        }
        row(
            f,
            "Messages",
            format!(
                "{} total, {} from bots",
                b.total_messages, b.bot_messages
            ),
            color,
        )?;
        row(f, "Mean words by user", format!("{:.2}", b.mean_words_by_user), color)?;
        row(
            f,
            "Bot words (median / mean)",
            format!("{} / {:.2}", b.median_words_by_bot, b.mean_words_by_bot),
            color,
        )?;
        if !b.rating_distribution.is_empty() {
            let stars: Vec<String> = b
                .rating_distribution
                .iter()
                .map(|(star, count)| format!("{}: {}", star, count))
                .collect();
            row(f, "Ratings", stars.join(", "), color)?;
        }
        row(
            f,
            "Coaching",
            format!(
                "{} good, {} bad, {} undetermined, {} none",
                b.coaching.good, b.coaching.bad, b.coaching.undetermined, b.coaching.none
            ),
            color,
        )?;
        if !b.annotation_counts.is_empty() {
            let tags: Vec<String> = b
                .annotation_counts
                .iter()
                .map(|(tag, count)| format!("{} ({})", tag, count))
                .collect();
            row(f, "Annotations", tags.join(", "), color)?;
        }
        Ok(())
    }
}

pub fn print_run(run: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let versions: Option<Vec<String>> = run
                .filter
                .keys()
                .map(|keys| keys.iter().map(ToString::to_string).collect());
            let body = json!({
                "versions": versions,
                "metrics": run.report.metrics,
                "breakdown": run.report.breakdown,
                "stats": run.stats,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(["metric", "value"])?;
            for (name, value) in run.report.metrics.named_values() {
                writer.write_record([name.to_string(), value.to_string()])?;
            }
            writer.flush()?;
        }
        OutputFormat::Plain => {
            print!(
                "{}",
                MetricsView {
                    report: &run.report,
                    scope: describe_filter(&run.filter),
                    color: use_color(),
                }
            );
            if let Some(cursor) = &run.stats.resume_cursor {
                eprintln!(
                    "Note: session listing stopped after {} pages; resume cursor {}",
                    run.stats.session_pages, cursor
                );
            }
        }
    }
    Ok(())
}

/// Partial progress of a run that produced no metrics
pub fn print_failure(failure: &RunFailure, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let body = json!({
                "error": failure.error.to_string(),
                "cancelled": failure.is_cancelled(),
                "progress": failure.progress,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Plain | OutputFormat::Csv => {
            let progress = &failure.progress;
            if !progress.sessions_with_messages.is_empty() {
                eprintln!(
                    "Messages fetched for {} sessions",
                    progress.sessions_with_messages.len()
                );
            }
            if !progress.failed_sessions.is_empty() {
                let ids: Vec<String> = progress
                    .failed_sessions
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                eprintln!("Message fetch failed for: {}", ids.join(", "));
            }
        }
    }
    Ok(())
}
