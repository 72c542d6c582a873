use ocsmetrics_types::{Cursor, SessionId, VersionKey};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// Restrictions applied while paging through a resource
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchScope {
    /// Retained (experiment, version) pairs; `None` retains everything
    pub versions: Option<BTreeSet<VersionKey>>,
    /// Restrict to a single session (message pages)
    pub session: Option<SessionId>,
    /// Upstream `updated_at` of that session; a changed session gets fresh
    /// message pages
    pub revision: Option<String>,
}

impl FetchScope {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn versions(versions: BTreeSet<VersionKey>) -> Self {
        Self {
            versions: Some(versions),
            ..Self::default()
        }
    }

    pub fn session(session: SessionId) -> Self {
        Self {
            session: Some(session),
            ..Self::default()
        }
    }

    pub fn at_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Whether a session with `key` survives this scope
    pub fn retains(&self, key: &VersionKey) -> bool {
        self.versions
            .as_ref()
            .is_none_or(|versions| versions.contains(key))
    }
}

/// The API a page was fetched from. Pages from different deployments or
/// projects never share cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Upstream {
    pub base_url: String,
    pub project_id: Option<String>,
}

impl Upstream {
    pub fn new(base_url: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id,
        }
    }
}

/// SHA256 of the canonical form of the upstream, a fetch scope and the
/// page's position.
///
/// Two runs against the same upstream with identical filters, page size and
/// starting cursor produce the same fingerprint and therefore hit the same
/// cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterFingerprint(String);

impl FilterFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn fingerprint(
    upstream: &Upstream,
    scope: &FetchScope,
    cursor: Option<&Cursor>,
    page_size: u32,
) -> FilterFingerprint {
    let mut hasher = Sha256::new();

    hasher.update(b"upstream=");
    write_field(&mut hasher, &upstream.base_url);
    match &upstream.project_id {
        None => hasher.update(b"project=*;"),
        Some(project) => {
            hasher.update(b"project=");
            write_field(&mut hasher, project);
        }
    }

    match &scope.versions {
        None => hasher.update(b"versions=*"),
        Some(versions) => {
            hasher.update(b"versions=");
            // Length-prefix each field so ("a@b", "c") and ("a", "b@c") differ
            for key in versions {
                write_field(&mut hasher, &key.experiment);
                write_field(&mut hasher, &key.label);
            }
        }
    }

    hasher.update(b";session=");
    if let Some(session) = &scope.session {
        write_field(&mut hasher, session.as_str());
    }

    hasher.update(b";revision=");
    if let Some(revision) = &scope.revision {
        write_field(&mut hasher, revision);
    }

    hasher.update(b";cursor=");
    if let Some(cursor) = cursor {
        write_field(&mut hasher, cursor.as_str());
    }

    hasher.update(format!(";page_size={}", page_size).as_bytes());

    FilterFingerprint(format!("{:x}", hasher.finalize()))
}

fn write_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
