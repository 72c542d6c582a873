use anyhow::Result;

use crate::args::{CacheCommand, Cli, Commands, ConfigCommand};
use crate::context::ExecutionContext;
use crate::handlers;
use crate::logging;

pub fn run(cli: Cli) -> Result<()> {
    logging::init(cli.log_level);
    let ctx = ExecutionContext::new(cli.data_dir.as_deref(), cli.config.as_deref(), cli.format)?;

    match cli.command {
        Commands::Metrics(args) => handlers::metrics::handle(&ctx, &args),

        Commands::Versions { experiment } => handlers::versions::handle(&ctx, experiment.as_deref()),

        Commands::Cache { command } => match command {
            CacheCommand::Stats => handlers::cache::stats(&ctx),
            CacheCommand::Clear { resource } => handlers::cache::clear(&ctx, resource.as_deref()),
        },

        Commands::Config { command } => match command {
            ConfigCommand::Show => handlers::config::show(&ctx),
            ConfigCommand::Path => handlers::config::path(&ctx),
        },
    }
}
