pub mod auth;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod users;

use tracing::error;

use tandem_db::CancellationToken;

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;

/// Runs blocking store work off the async runtime.
///
/// The cancellation token fires if the request future is dropped before the
/// work finishes, which interrupts the statement SQLite is running.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner, &CancellationToken) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let app = state.clone();

    let result = tokio::task::spawn_blocking(move || f(&app, &cancel)).await;
    guard.disarm();

    result.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })?
}
