pub mod auth;
pub mod health;
pub mod users;

use std::future::Future;
use std::time::Instant;

use tracing::info;

/// Log entry and exit of an operation with its wall time.
pub(crate) async fn observe<F, T>(operation: &'static str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    info!(operation, "processing {operation}");
    let output = fut.await;
    info!(
        operation,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "finished {operation}"
    );
    output
}
