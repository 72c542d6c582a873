use anyhow::Result;

use super::block_on;
use crate::context::ExecutionContext;
use crate::presentation;

pub fn handle(ctx: &ExecutionContext, experiment: Option<&str>) -> Result<()> {
    let pipeline = ctx.workspace()?.pipeline(ctx.config()?.clone())?;
    let catalog = block_on(pipeline.fetch_catalog())??;

    let versions: Vec<_> = catalog
        .versions()
        .iter()
        .filter(|version| experiment.is_none_or(|name| version.experiment == name))
        .cloned()
        .collect();

    if let Some(name) = experiment
        && versions.is_empty()
    {
        anyhow::bail!(
            "Experiment '{}' not found (known: {})",
            name,
            catalog.experiments().into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    presentation::versions::print(&versions, ctx.format)
}
