use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ParticipantId, SessionId};
use super::version::VersionKey;

/// Experiment (bot) a session ran against, pinned to the version that served it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRef {
    /// Upstream experiment id (may be empty when the API omits it)
    pub id: String,
    /// Human-readable experiment name
    pub name: String,
    /// Version label, e.g. `v3`
    pub version: String,
}

/// One recorded interaction between a bot and a field worker.
///
/// Sessions are immutable once fetched. A later fetch carrying the same id
/// replaces the whole value rather than patching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub participant: ParticipantId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub experiment: ExperimentRef,
    pub team: String,
    /// Annotation and version tags in upstream order
    pub tags: Vec<String>,
    /// Optional field-worker rating of the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl Session {
    /// The (experiment, version) pair used by the version filter
    pub fn version_key(&self) -> VersionKey {
        VersionKey::new(&self.experiment.name, &self.experiment.version)
    }
}
