//! Upstream (OpenChatStudio API) record shapes and their conversion into
//! domain types. Only the fields the pipeline reads are modelled; everything
//! else in the payload is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{
    AuthorRole, ExperimentRef, ExperimentVersion, Message, ParticipantId, Session, SessionId,
    VersionKey, version_label,
};
use crate::{Error, Result};

/// Label used for sessions whose experiment carries no version number
pub const UNVERSIONED_LABEL: &str = "unversioned";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperimentSummaryRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version_number: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParticipantRecord {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub remote_id: Option<String>,
}

/// Tags arrive either as bare strings or as `{ "name": ... }` objects
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagRecord {
    Name(String),
    Object { name: String },
}

impl TagRecord {
    pub fn into_name(self) -> String {
        match self {
            TagRecord::Name(name) | TagRecord::Object { name } => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    #[serde(default)]
    pub team: TeamRecord,
    #[serde(default)]
    pub experiment: ExperimentSummaryRecord,
    #[serde(default)]
    pub participant: ParticipantRecord,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl SessionRecord {
    pub fn into_session(self) -> Session {
        let id = SessionId::new(self.id);
        let participant = self
            .participant
            .identifier
            .filter(|id| !id.trim().is_empty())
            .or(self.participant.remote_id.filter(|id| !id.trim().is_empty()))
            .map(ParticipantId::new)
            .unwrap_or_else(|| ParticipantId::anonymous(&id));

        Session {
            id,
            participant,
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or(self.created_at),
            experiment: ExperimentRef {
                id: self.experiment.id,
                name: self.experiment.name,
                version: label_for(self.experiment.version_number),
            },
            team: self.team.name,
            tags: self
                .tags
                .into_iter()
                .map(TagRecord::into_name)
                .filter(|tag| !tag.is_empty())
                .collect(),
            rating: self.rating,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Convert into a domain message owned by `session_id`.
    ///
    /// Records without an id get `<session id>:<index>`. A record that names
    /// a different parent session keeps that parent, so the aggregator can
    /// report the inconsistency instead of silently re-homing the message.
    pub fn into_message(self, session_id: &SessionId, index: usize) -> Message {
        let id = self
            .id
            .unwrap_or_else(|| format!("{}:{}", session_id, index));
        let parent = self
            .session_id
            .map(SessionId::new)
            .unwrap_or_else(|| session_id.clone());

        Message {
            id,
            session_id: parent,
            role: AuthorRole::from_wire(&self.role),
            content: self.content.unwrap_or_default(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionRecord {
    #[serde(default)]
    pub name: String,
    pub version_number: u32,
    #[serde(default)]
    pub is_default_version: bool,
    #[serde(default)]
    pub version_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version_number: Option<u32>,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
}

impl ExperimentRecord {
    /// Flatten into catalog entries. An experiment that lists no versions
    /// contributes its current version as the sole, default entry.
    pub fn into_versions(self) -> Vec<ExperimentVersion> {
        if self.versions.is_empty() {
            return vec![ExperimentVersion {
                experiment: self.name,
                label: label_for(self.version_number),
                is_default: true,
                description: String::new(),
            }];
        }

        self.versions
            .into_iter()
            .map(|version| ExperimentVersion {
                experiment: self.name.clone(),
                label: version_label(version.version_number),
                is_default: version.is_default_version,
                description: version.version_description.unwrap_or_default(),
            })
            .collect()
    }
}

fn label_for(version_number: Option<u32>) -> String {
    version_number
        .map(version_label)
        .unwrap_or_else(|| UNVERSIONED_LABEL.to_string())
}

pub fn decode_session(value: &Value) -> Result<Session> {
    SessionRecord::deserialize(value)
        .map(SessionRecord::into_session)
        .map_err(|source| Error::Decode {
            what: "session",
            source,
        })
}

pub fn decode_message(session_id: &SessionId, index: usize, value: &Value) -> Result<Message> {
    MessageRecord::deserialize(value)
        .map(|record| record.into_message(session_id, index))
        .map_err(|source| Error::Decode {
            what: "message",
            source,
        })
}

pub fn decode_experiment_versions(value: &Value) -> Result<Vec<ExperimentVersion>> {
    ExperimentRecord::deserialize(value)
        .map(ExperimentRecord::into_versions)
        .map_err(|source| Error::Decode {
            what: "experiment",
            source,
        })
}

/// Cheap projection of a raw session record onto its version key.
///
/// Used to discard sessions outside the version filter before full decoding.
pub fn session_version_key(value: &Value) -> Option<VersionKey> {
    let experiment = value.get("experiment")?;
    let name = experiment.get("name")?.as_str()?;
    let version = experiment
        .get("version_number")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok());
    Some(VersionKey::new(name, label_for(version)))
}
