pub mod auth;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod reaper;
pub mod routes;
pub mod stories;
pub mod users;

mod views;

use tracing::error;

use murmur_db::Database;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Runs a store operation off the async runtime. `context` becomes the
/// client-facing message if the store itself fails.
pub(crate) async fn blocking<F, T>(state: &AppState, context: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> murmur_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal(context, e)
        })?
        .map_err(|e| ApiError::from_store(context, e))
}
