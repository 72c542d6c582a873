//! Rendering of command results as plain text, JSON or CSV.
//!
//! Plain views are `Display` types; color is only applied when stdout is a
//! terminal.

pub mod cache;
pub mod metrics;
pub mod versions;

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::fmt;

pub(crate) fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Section heading, bold when `color` is set
pub(crate) fn heading(f: &mut fmt::Formatter<'_>, text: &str, color: bool) -> fmt::Result {
    if color {
        writeln!(f, "{}", text.bold())
    } else {
        writeln!(f, "{}", text)
    }
}

/// `label` padded to a fixed column, dimmed when `color` is set
pub(crate) fn row(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    value: impl fmt::Display,
    color: bool,
) -> fmt::Result {
    let padded = format!("{:<26}", label);
    if color {
        writeln!(f, "  {}{}", padded.dimmed(), value)
    } else {
        writeln!(f, "  {}{}", padded, value)
    }
}
