use anyhow::Result;
use ocsmetrics_types::ExperimentVersion;
use owo_colors::OwoColorize;
use std::fmt;

use super::use_color;
use crate::args::OutputFormat;

pub struct VersionsView<'a> {
    pub versions: &'a [ExperimentVersion],
    pub color: bool,
}

impl fmt::Display for VersionsView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.versions.is_empty() {
            return writeln!(f, "No experiment versions found");
        }

        let mut current: Option<&str> = None;
        for version in self.versions {
            if current != Some(version.experiment.as_str()) {
                if self.color {
                    writeln!(f, "{}", version.experiment.bold())?;
                } else {
                    writeln!(f, "{}", version.experiment)?;
                }
                current = Some(version.experiment.as_str());
            }

            let marker = if version.is_default { " (default)" } else { "" };
            write!(f, "  {}{}", version.label, marker)?;
            if !version.description.is_empty() {
                write!(f, "  {}", version.description)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub fn print(versions: &[ExperimentVersion], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(versions)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(["experiment", "label", "is_default", "description"])?;
            for version in versions {
                writer.write_record([
                    version.experiment.as_str(),
                    version.label.as_str(),
                    if version.is_default { "true" } else { "false" },
                    version.description.as_str(),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Plain => print!(
            "{}",
            VersionsView {
                versions,
                color: use_color()
            }
        ),
    }
    Ok(())
}
