use anyhow::Result;
use ocsmetrics_cache::Invalidation;

use crate::context::ExecutionContext;
use crate::presentation;

pub fn stats(ctx: &ExecutionContext) -> Result<()> {
    let config = ctx.config()?;
    let cache = ctx.workspace()?.open_cache(&config.cache)?;
    presentation::cache::print_stats(&cache.stats()?, ctx.format)
}

pub fn clear(ctx: &ExecutionContext, resource: Option<&str>) -> Result<()> {
    let config = ctx.config()?;
    let cache = ctx.workspace()?.open_cache(&config.cache)?;
    let scope = match resource {
        Some(prefix) => Invalidation::prefix(prefix),
        None => Invalidation::All,
    };

    let removed = cache.invalidate(&scope)?;
    tracing::info!(removed, ?scope, "cache invalidated");
    presentation::cache::print_cleared(removed, resource, ctx.format)
}
