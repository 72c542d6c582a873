//! Testing infrastructure for ocsmetrics integration tests.
//!
//! - `ScriptedTransport`: an in-memory upstream that serves prepared pages
//! - `fixtures`: builders for upstream JSON records

pub mod fixtures;
pub mod transport;

pub use transport::ScriptedTransport;
