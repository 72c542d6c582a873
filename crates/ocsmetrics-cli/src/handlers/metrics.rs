use anyhow::Result;
use ocsmetrics_core::RunConfig;
use ocsmetrics_types::VersionSelection;
use tokio_util::sync::CancellationToken;

use super::block_on;
use crate::args::MetricsArgs;
use crate::context::ExecutionContext;
use crate::presentation;

pub fn handle(ctx: &ExecutionContext, args: &MetricsArgs) -> Result<()> {
    let config = apply_overrides(ctx.config()?.clone(), args);
    tracing::debug!(config = ?config.redacted(), "effective configuration");
    let cancel = CancellationToken::new();
    let pipeline = ctx
        .workspace()?
        .pipeline(config)?
        .with_cancel(cancel.clone())
        .with_page_limit(args.limit_pages);

    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("Interrupted, stopping after the current page...");
        on_interrupt.cancel();
    })?;

    match block_on(pipeline.run())? {
        Ok(run) => presentation::metrics::print_run(&run, ctx.format),
        Err(failure) => {
            presentation::metrics::print_failure(&failure, ctx.format)?;
            Err(failure.into())
        }
    }
}

/// Command line flags take precedence over file and environment settings
fn apply_overrides(mut config: RunConfig, args: &MetricsArgs) -> RunConfig {
    if !args.experiments.is_empty() {
        config.experiments = args.experiments.clone();
    }
    if args.all_versions {
        config.versions = VersionSelection::All;
    } else if !args.versions.is_empty() {
        config.versions = VersionSelection::labels(args.versions.iter().map(|v| v.trim()));
    }
    if args.no_cache {
        config.caching_enabled = false;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency_limit = concurrency;
    }
    if let Some(retries) = args.max_retries {
        config.max_retries = retries;
    }
    config
}
