use ocsmetrics_types::{CoachingTags, Lexicon, SentimentScope, VersionSelection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fingerprint::Upstream;
use crate::path::resolve_workspace_path;
use crate::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://chatbots.dimagi.com/api";

const REDACTED: &str = "***";

/// Pagination, timeout and backoff knobs for the page fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: 500,
            request_timeout_secs: 60,
            backoff_base_ms: 250,
            backoff_max_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Total storage budget across all entries
    pub budget_bytes: u64,
    /// Entries older than this are treated as misses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,
    pub backend: CacheBackendKind,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            budget_bytes: 64 * 1024 * 1024,
            max_age_secs: None,
            backend: CacheBackendKind::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub lexicon: Lexicon,
    pub coaching_tags: CoachingTags,
    pub sentiment_scope: SentimentScope,
}

/// Immutable configuration for one pipeline run.
///
/// Built once from `config.toml`, the environment and command line flags,
/// then handed to the pipeline by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub api_base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Experiment names to aggregate; empty means every experiment
    pub experiments: Vec<String>,
    pub versions: VersionSelection,
    pub caching_enabled: bool,
    pub concurrency_limit: usize,
    pub max_retries: u32,
    pub fetch: FetchSettings,
    pub cache: CacheSettings,
    pub classifier: ClassifierSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: String::new(),
            project_id: None,
            experiments: Vec::new(),
            versions: VersionSelection::All,
            caching_enabled: true,
            concurrency_limit: 4,
            max_retries: 3,
            fetch: FetchSettings::default(),
            cache: CacheSettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

impl RunConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(resolve_workspace_path(None)?.join("config.toml"))
    }

    /// Overlay `OCS_API_KEY`, `OCS_API_BASE_URL` and `OCS_PROJECT_ID`
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty("OCS_API_KEY") {
            self.api_key = key;
        }
        if let Some(url) = non_empty("OCS_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(project) = non_empty("OCS_PROJECT_ID") {
            self.project_id = Some(project);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config(
                "API key is not set (use OCS_API_KEY or api_key in config.toml)".to_string(),
            ));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(Error::Config("api_base_url must not be empty".to_string()));
        }
        if self.concurrency_limit == 0 {
            return Err(Error::Config(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }
        if self.fetch.page_size == 0 {
            return Err(Error::Config("fetch.page_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Copy safe to print: the api key is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api_key.is_empty() {
            copy.api_key = REDACTED.to_string();
        }
        copy
    }

    /// Base url without a trailing slash
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Identity of the API pages are fetched from, part of every cache key
    pub fn upstream(&self) -> Upstream {
        Upstream::new(self.api_base(), self.project_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = RunConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.fetch.page_size, 500);
        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.max_retries, 3);
        assert!(config.caching_enabled);
        assert!(config.versions.is_all());
        assert_eq!(config.cache.max_age_secs, None);
    }

    #[test]
    fn test_config_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = RunConfig {
            experiments: vec!["ECD Coach".to_string()],
            versions: VersionSelection::labels(["v7", "v8"]),
            concurrency_limit: 8,
            ..RunConfig::default()
        };
        config.cache.max_age_secs = Some(3600);
        config.classifier.sentiment_scope = SentimentScope::ParticipantOnly;
        config.save_to(&config_path)?;

        let loaded = RunConfig::load_from(&config_path)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_load_missing_file_yields_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let loaded = RunConfig::load_from(&temp_dir.path().join("absent.toml"))?;
        assert_eq!(loaded, RunConfig::default());
        Ok(())
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RunConfig = toml::from_str(
            r#"
            versions = "all"
            caching_enabled = false

            [fetch]
            page_size = 50

            [classifier.lexicon]
            appreciation = ["asante"]
            dissatisfaction = []
            "#,
        )
        .unwrap();

        assert!(!config.caching_enabled);
        assert_eq!(config.fetch.page_size, 50);
        assert_eq!(config.fetch.backoff_base_ms, 250);
        assert_eq!(config.classifier.lexicon.appreciation, vec!["asante"]);
        assert_eq!(config.classifier.coaching_tags.good, "coaching_good");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("OCS_API_KEY", "secret"),
            ("OCS_API_BASE_URL", "http://localhost:8000/api/"),
            ("OCS_PROJECT_ID", " "),
        ]
        .into_iter()
        .collect();

        let mut config = RunConfig {
            api_key: "from-file".to_string(),
            project_id: Some("p-1".to_string()),
            ..RunConfig::default()
        };
        config.apply_env_from(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.api_base(), "http://localhost:8000/api");
        assert_eq!(config.project_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_validate() {
        let mut config = RunConfig::default();
        assert!(config.validate().is_err());

        config.api_key = "k".to_string();
        assert!(config.validate().is_ok());

        config.concurrency_limit = 0;
        assert!(config.validate().is_err());
        config.concurrency_limit = 1;

        config.fetch.page_size = 0;
        assert!(config.validate().is_err());
        config.fetch.page_size = 10;

        config.api_base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_masks_key() {
        let config = RunConfig {
            api_key: "secret".to_string(),
            ..RunConfig::default()
        };
        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(shown.contains("***"));
        assert!(!shown.contains("secret"));
    }
}
