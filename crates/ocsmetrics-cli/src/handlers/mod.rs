pub mod cache;
pub mod config;
pub mod metrics;
pub mod versions;

use anyhow::Result;
use std::future::Future;

/// Drive `future` to completion on a fresh multi-threaded runtime
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
