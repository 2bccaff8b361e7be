//! Command execution helpers
//!
//! Every command runs through [`execute_command`] so timing and outcome
//! logging look the same across entry points.

use std::future::Future;
use std::time::Instant;

use hearth_domain::Result;

use crate::utils::logging::log_command_execution;

/// Execute a command with automatic timing and outcome logging.
///
/// # Example
///
/// ```rust,ignore
/// pub async fn list_sources(ctx: &AppContext, owner_id: &str) -> Result<Vec<SourceSummary>> {
///     execute_command("sources::list_sources", || async {
///         ctx.registry().list_sources(owner_id).await
///     })
///     .await
/// }
/// ```
pub async fn execute_command<F, Fut, T>(command_name: &str, command_fn: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let result = command_fn().await;
    log_command_execution(command_name, start.elapsed(), result.as_ref().err());
    result
}
