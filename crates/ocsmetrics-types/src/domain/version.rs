use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Format an upstream `version_number` as a version label
pub fn version_label(version_number: u32) -> String {
    format!("v{}", version_number)
}

/// (experiment, version label) pair; the unit of version filtering
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionKey {
    pub experiment: String,
    pub label: String,
}

impl VersionKey {
    pub fn new(experiment: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.experiment, self.label)
    }
}

/// Read-only catalog entry describing one published experiment version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentVersion {
    pub experiment: String,
    pub label: String,
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ExperimentVersion {
    pub fn key(&self) -> VersionKey {
        VersionKey::new(&self.experiment, &self.label)
    }
}

/// Which versions of an experiment a run aggregates over.
///
/// In TOML this is either the string `"all"` or an array of labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "SelectionRepr", into = "SelectionRepr")]
pub enum VersionSelection {
    #[default]
    All,
    Labels(BTreeSet<String>),
}

impl VersionSelection {
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VersionSelection::Labels(labels.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, VersionSelection::All)
    }
}

impl fmt::Display for VersionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelection::All => write!(f, "all"),
            VersionSelection::Labels(labels) => {
                let joined: Vec<&str> = labels.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

impl FromStr for VersionSelection {
    type Err = Error;

    /// Parse `all` or a comma-separated label list such as `v1,v2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(VersionSelection::All);
        }

        let labels: BTreeSet<String> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();

        if labels.is_empty() {
            return Err(Error::Invalid(format!(
                "version selection '{}' names no versions",
                s
            )));
        }
        Ok(VersionSelection::Labels(labels))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    Keyword(String),
    Labels(Vec<String>),
}

impl TryFrom<SelectionRepr> for VersionSelection {
    type Error = Error;

    fn try_from(repr: SelectionRepr) -> Result<Self, Self::Error> {
        match repr {
            SelectionRepr::Keyword(keyword) => keyword.parse(),
            SelectionRepr::Labels(labels) if labels.is_empty() => Err(Error::Invalid(
                "version selection list is empty".to_string(),
            )),
            SelectionRepr::Labels(labels) => Ok(VersionSelection::labels(labels)),
        }
    }
}

impl From<VersionSelection> for SelectionRepr {
    fn from(selection: VersionSelection) -> Self {
        match selection {
            VersionSelection::All => SelectionRepr::Keyword("all".to_string()),
            VersionSelection::Labels(labels) => SelectionRepr::Labels(labels.into_iter().collect()),
        }
    }
}
