//! Blocking entry points
//!
//! Synchronous callers never block a runtime thread on an async compile or
//! resolve. The future runs to completion on a dedicated worker thread that
//! owns a current-thread runtime, and the caller joins that thread.

use exten_domain::error::{Error, Result};
use std::future::Future;
use std::thread;

/// Name of the worker threads spawned by [`run_blocking`]
pub const BLOCKING_WORKER_NAME: &str = "exten-blocking";

/// Run `future` to completion on a dedicated worker and return its output
///
/// Safe to call from inside or outside a tokio runtime. Per-key locks are
/// shared with async callers, so single-flight guarantees still hold.
pub fn run_blocking<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
    T: Send,
{
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name(BLOCKING_WORKER_NAME.to_string())
            .spawn_scoped(scope, move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| Error::io_with_source("failed to build blocking worker runtime", e))?;
                runtime.block_on(future)
            })
            .map_err(|e| Error::io_with_source("failed to spawn blocking worker", e))?;

        worker
            .join()
            .map_err(|_| Error::internal("blocking worker panicked"))?
    })
}
