use ocsmetrics_types::{ExperimentVersion, Session, VersionKey, VersionSelection};
use std::collections::BTreeSet;

use crate::classifier::normalize_version_tag;
use crate::error::UnknownVersionError;

/// Every published version of every experiment, fetched once per run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    versions: Vec<ExperimentVersion>,
}

impl VersionCatalog {
    /// Build a catalog, keeping the first entry for each (experiment, label)
    pub fn new(versions: Vec<ExperimentVersion>) -> Self {
        let mut seen = BTreeSet::new();
        let versions = versions
            .into_iter()
            .filter(|version| seen.insert(version.key()))
            .collect();
        Self { versions }
    }

    pub fn versions(&self) -> &[ExperimentVersion] {
        &self.versions
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn for_experiment<'a>(
        &'a self,
        experiment: &'a str,
    ) -> impl Iterator<Item = &'a ExperimentVersion> + 'a {
        self.versions
            .iter()
            .filter(move |version| version.experiment == experiment)
    }

    pub fn experiments(&self) -> BTreeSet<&str> {
        self.versions
            .iter()
            .map(|version| version.experiment.as_str())
            .collect()
    }

    /// All version labels, the reference set for version-tag detection
    pub fn labels(&self) -> BTreeSet<String> {
        self.versions
            .iter()
            .map(|version| version.label.clone())
            .collect()
    }
}

/// The set of (experiment, version) pairs a run retains.
///
/// An unrestricted filter retains every session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionFilter {
    keys: Option<BTreeSet<VersionKey>>,
}

impl VersionFilter {
    pub fn unrestricted() -> Self {
        Self { keys: None }
    }

    pub fn only<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = VersionKey>,
    {
        Self {
            keys: Some(keys.into_iter().collect()),
        }
    }

    pub fn from_versions(versions: &[ExperimentVersion]) -> Self {
        Self::only(versions.iter().map(ExperimentVersion::key))
    }

    pub fn keys(&self) -> Option<&BTreeSet<VersionKey>> {
        self.keys.as_ref()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.keys.is_none()
    }

    pub fn retains_key(&self, key: &VersionKey) -> bool {
        self.keys.as_ref().is_none_or(|keys| keys.contains(key))
    }

    pub fn retains(&self, session: &Session) -> bool {
        self.retains_key(&session.version_key())
    }

    /// Whether every session this filter retains is also retained by `outer`
    pub fn is_within(&self, outer: &VersionFilter) -> bool {
        match (&self.keys, &outer.keys) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(inner), Some(outer)) => inner.is_subset(outer),
        }
    }

    pub fn union(self, other: VersionFilter) -> VersionFilter {
        match (self.keys, other.keys) {
            (Some(mut left), Some(right)) => {
                left.extend(right);
                VersionFilter { keys: Some(left) }
            }
            _ => VersionFilter::unrestricted(),
        }
    }
}

fn label_matches(selected: &str, label: &str) -> bool {
    selected == label
        || normalize_version_tag(selected)
            .is_some_and(|normalized| Some(normalized) == normalize_version_tag(label))
}

/// Resolve `selection` against one experiment's catalog entries.
///
/// Explicit labels are matched exactly or after version-tag normalisation
/// (`7`, `V7` and `version 7` all select `v7`); any label that matches no
/// catalog entry is rejected.
pub fn resolve_versions(
    experiment: &str,
    selection: &VersionSelection,
    catalog: &VersionCatalog,
) -> Result<Vec<ExperimentVersion>, UnknownVersionError> {
    let known: Vec<&ExperimentVersion> = catalog.for_experiment(experiment).collect();

    if known.is_empty() {
        return Err(UnknownVersionError {
            experiment: Some(experiment.to_string()),
            label: selection.to_string(),
            known: Vec::new(),
        });
    }

    match selection {
        VersionSelection::All => Ok(known.into_iter().cloned().collect()),
        VersionSelection::Labels(labels) => {
            let mut resolved = Vec::new();
            for selected in labels {
                let matched: Vec<&ExperimentVersion> = known
                    .iter()
                    .copied()
                    .filter(|version| label_matches(selected, &version.label))
                    .collect();

                if matched.is_empty() {
                    return Err(UnknownVersionError {
                        experiment: Some(experiment.to_string()),
                        label: selected.clone(),
                        known: known.iter().map(|version| version.label.clone()).collect(),
                    });
                }
                for version in matched {
                    if !resolved.contains(version) {
                        resolved.push(version.clone());
                    }
                }
            }
            Ok(resolved)
        }
    }
}

/// Build the run's filter for a list of experiments (empty means all).
///
/// Named experiments are resolved one by one and unioned. With no experiment
/// named, `All` leaves the run unrestricted and explicit labels select that
/// label from every experiment publishing it.
pub fn build_filter(
    experiments: &[String],
    selection: &VersionSelection,
    catalog: &VersionCatalog,
) -> Result<VersionFilter, UnknownVersionError> {
    if !experiments.is_empty() {
        let mut keys = BTreeSet::new();
        for experiment in experiments {
            let resolved = resolve_versions(experiment, selection, catalog)?;
            keys.extend(resolved.iter().map(ExperimentVersion::key));
        }
        return Ok(VersionFilter { keys: Some(keys) });
    }

    let VersionSelection::Labels(labels) = selection else {
        return Ok(VersionFilter::unrestricted());
    };

    let mut keys = BTreeSet::new();
    for selected in labels {
        let before = keys.len();
        keys.extend(
            catalog
                .versions()
                .iter()
                .filter(|version| label_matches(selected, &version.label))
                .map(ExperimentVersion::key),
        );
        if keys.len() == before {
            return Err(UnknownVersionError {
                experiment: None,
                label: selected.clone(),
                known: catalog.labels().into_iter().collect(),
            });
        }
    }
    Ok(VersionFilter { keys: Some(keys) })
}
