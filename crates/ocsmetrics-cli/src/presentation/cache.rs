use anyhow::Result;
use ocsmetrics_cache::CacheStats;
use std::fmt;

use super::{heading, row, use_color};
use crate::args::OutputFormat;

pub struct CacheStatsView<'a> {
    pub stats: &'a CacheStats,
    pub color: bool,
}

impl fmt::Display for CacheStatsView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        heading(f, "Page cache", self.color)?;
        row(f, "Entries", stats.entries, self.color)?;
        row(
            f,
            "Size",
            format!("{} / {}", human_bytes(stats.total_bytes), human_bytes(stats.budget_bytes)),
            self.color,
        )
    }
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn print_stats(stats: &CacheStats, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(stats)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.serialize(stats)?;
            writer.flush()?;
        }
        OutputFormat::Plain => print!(
            "{}",
            CacheStatsView {
                stats,
                color: use_color()
            }
        ),
    }
    Ok(())
}

pub fn print_cleared(removed: usize, resource: Option<&str>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "removed": removed, "resource": resource })
        ),
        OutputFormat::Plain | OutputFormat::Csv => match resource {
            Some(prefix) => println!("Removed {} cached pages under '{}'", removed, prefix),
            None => println!("Removed {} cached pages", removed),
        },
    }
    Ok(())
}
