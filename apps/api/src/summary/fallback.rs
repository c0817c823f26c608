use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Awaits `op`; on error logs it against `context` and returns `fallback`.
///
/// Used for enrichment lookups whose failure must never abort the caller.
pub async fn soft_fail<T, E, F>(context: &str, fallback: T, op: F) -> T
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match op.await {
        Ok(value) => value,
        Err(e) => {
            warn!("{context} failed, using fallback: {e}");
            fallback
        }
    }
}
