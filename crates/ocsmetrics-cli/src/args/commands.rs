use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Fetch sessions and compute metrics for the selected versions")]
    Metrics(MetricsArgs),

    #[command(about = "List the experiment version catalog")]
    Versions {
        /// Only list versions of this experiment
        #[arg(long)]
        experiment: Option<String>,
    },

    #[command(about = "Inspect or clear the page cache")]
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    #[command(about = "Inspect configuration")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct MetricsArgs {
    /// Experiment to aggregate (repeatable); defaults to the configured list
    #[arg(long = "experiment", value_name = "NAME")]
    pub experiments: Vec<String>,

    /// Version labels to include, comma separated (e.g. v1,v2)
    #[arg(long, value_delimiter = ',', conflicts_with = "all_versions")]
    pub versions: Vec<String>,

    /// Include every version
    #[arg(long)]
    pub all_versions: bool,

    /// Neither read nor write the page cache
    #[arg(long)]
    pub no_cache: bool,

    /// Maximum concurrent message fetches
    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Stop the session listing after N pages
    #[arg(long, value_name = "N")]
    pub limit_pages: Option<usize>,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    #[command(about = "Show cache size and counters")]
    Stats,

    #[command(about = "Remove cached pages")]
    Clear {
        /// Only clear entries under this resource prefix (e.g. messages)
        #[arg(long)]
        resource: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Print the effective configuration with the API key redacted")]
    Show,

    #[command(about = "Print the config file path")]
    Path,
}
