mod args;
mod commands;
pub mod context;
mod handlers;
mod logging;
pub mod presentation;

pub use args::{CacheCommand, Cli, Commands, ConfigCommand, LogLevel, OutputFormat};
pub use commands::run;
