//! Correlation ids for engine operations.
//!
//! Every engine operation runs inside a task-local scope carrying a UUID. The
//! HTTP client forwards it as `x-request-id` and log events record it, so one
//! unlock and the refresh it triggers share a single id.

use std::future::Future;
use uuid::Uuid;

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Returns the correlation id of the current operation, if any.
#[must_use]
pub fn current_correlation_id() -> Option<String> {
    CORRELATION_ID.try_with(Clone::clone).ok()
}

/// Runs `fut` inside a correlation scope.
///
/// Nested calls keep the outer id.
pub async fn in_correlation_scope<F>(fut: F) -> F::Output
where
    F: Future,
{
    let id = current_correlation_id().unwrap_or_else(|| Uuid::new_v4().to_string());
    CORRELATION_ID.scope(id, fut).await
}
