use ocsmetrics_cache::{CACHE_DB_FILE, PageCache, SqliteBackend};
use ocsmetrics_core::{CacheBackendKind, CacheSettings, RunConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::pipeline::Pipeline;
use crate::transport::HttpTransport;
use crate::{Result, RunError};

const CONFIG_FILE: &str = "config.toml";

/// Data directory holding `config.toml` and the page cache database
#[derive(Debug, Clone)]
pub struct Workspace {
    data_dir: PathBuf,
}

impl Workspace {
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir).map_err(|err| {
            RunError::Config(format!(
                "cannot create data directory {}: {}",
                data_dir.display(),
                err
            ))
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_DB_FILE)
    }

    /// Config from `explicit` (or the workspace's `config.toml`), with
    /// environment overrides applied. A missing file yields defaults.
    pub fn load_config(&self, explicit: Option<&Path>) -> Result<RunConfig> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config_path());
        if explicit.is_some() && !path.exists() {
            return Err(RunError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let mut config = RunConfig::load_from(&path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn open_cache(&self, settings: &CacheSettings) -> Result<PageCache> {
        let cache = match settings.backend {
            CacheBackendKind::Sqlite => {
                let backend = SqliteBackend::open(&self.cache_path())?;
                PageCache::new(backend, settings.budget_bytes)
            }
            CacheBackendKind::Memory => PageCache::in_memory(settings.budget_bytes),
        };

        Ok(match settings.max_age_secs {
            Some(secs) => {
                let max_age = i64::try_from(secs)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .unwrap_or(chrono::Duration::MAX);
                cache.with_max_age(max_age)
            }
            None => cache,
        })
    }

    /// Pipeline over the live API, using this workspace's cache
    pub fn pipeline(&self, config: RunConfig) -> Result<Pipeline> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        let cache = if config.caching_enabled {
            self.open_cache(&config.cache)?
        } else {
            PageCache::disabled()
        };
        tracing::debug!(
            data_dir = %self.data_dir.display(),
            caching = cache.is_enabled(),
            "workspace pipeline ready"
        );

        Ok(Pipeline::new(config, Arc::new(transport), Arc::new(cache)))
    }
}
