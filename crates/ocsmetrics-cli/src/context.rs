use anyhow::Result;
use ocsmetrics_core::{RunConfig, resolve_workspace_path};
use ocsmetrics_runtime::Workspace;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

use crate::args::OutputFormat;

/// Lazily opened workspace and configuration for one command invocation
pub struct ExecutionContext {
    data_dir: PathBuf,
    config_path: Option<PathBuf>,
    pub format: OutputFormat,
    workspace: OnceCell<Workspace>,
    config: OnceCell<RunConfig>,
}

impl ExecutionContext {
    pub fn new(data_dir: Option<&str>, config_path: Option<&str>, format: OutputFormat) -> Result<Self> {
        let data_dir = resolve_workspace_path(data_dir)?;
        let config_path = config_path.map(ocsmetrics_core::expand_tilde);

        Ok(Self {
            data_dir,
            config_path,
            format,
            workspace: OnceCell::new(),
            config: OnceCell::new(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn workspace(&self) -> Result<&Workspace> {
        self.workspace
            .get_or_try_init(|| Ok(Workspace::open(self.data_dir.clone())?))
    }

    /// File the configuration is read from
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Ok(self.workspace()?.config_path()),
        }
    }

    /// Configuration from file and environment, before command line overrides
    pub fn config(&self) -> Result<&RunConfig> {
        self.config.get_or_try_init(|| {
            let workspace = self.workspace()?;
            Ok(workspace.load_config(self.config_path.as_deref())?)
        })
    }
}
