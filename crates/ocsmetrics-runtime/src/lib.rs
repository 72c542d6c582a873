// Runtime - async orchestration of a metrics run
// Owns everything that touches the network or the clock: transport, retry
// with backoff, the paginated fetcher and the end-to-end pipeline.

mod error;
mod fetcher;
mod pipeline;
mod retry;
pub mod transport;
mod workspace;

pub use error::{Result, RunError, RunFailure, RunProgress};
pub use fetcher::{FetchOutcome, PageFetcher, Pages, resource_key};
pub use pipeline::{Pipeline, RunReport, RunStats};
pub use retry::{BackoffPolicy, RetryError, RetryPolicy};
pub use transport::{HttpTransport, PageRequest, Transport};
pub use workspace::Workspace;
