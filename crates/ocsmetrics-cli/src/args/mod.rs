mod commands;
mod types;

pub use commands::*;
pub use types::*;

use clap::Parser;

#[derive(Parser)]
#[command(name = "ocsmetrics")]
#[command(about = "Quality and engagement metrics for OpenChatStudio coaching sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Workspace directory holding config.toml and the page cache
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Config file to use instead of <data-dir>/config.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(long, default_value = "plain", global = true)]
    pub format: OutputFormat,

    #[arg(long, default_value = "warn", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}
