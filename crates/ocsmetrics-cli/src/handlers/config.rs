use anyhow::Result;

use crate::args::OutputFormat;
use crate::context::ExecutionContext;

pub fn show(ctx: &ExecutionContext) -> Result<()> {
    let config = ctx.config()?.redacted();
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Plain | OutputFormat::Csv => print!("{}", toml::to_string_pretty(&config)?),
    }
    Ok(())
}

pub fn path(ctx: &ExecutionContext) -> Result<()> {
    println!("{}", ctx.config_path()?.display());
    Ok(())
}
