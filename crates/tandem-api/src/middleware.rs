use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::warn;

use crate::auth::{AppState, TokenError};
use crate::error::ApiError;

/// The authenticated caller of a request, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewer(pub Option<i64>);

/// Resolves an optional bearer token into a [`Viewer`].
///
/// Requests without an `Authorization` header, or with a scheme other than
/// `Bearer`, pass through anonymously. A `Bearer` credential that cannot be
/// decoded or fails verification is rejected with 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let viewer = match req.headers().get(header::AUTHORIZATION) {
        Some(value) if value.as_bytes().starts_with(b"Bearer") => {
            let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() else {
                warn!("Rejected malformed bearer credentials");
                return Err(TokenError::Malformed.into());
            };
            let user_id = state.tokens.authenticate(bearer.token()).inspect_err(|e| {
                warn!("Rejected bearer token: {:?}", e);
            })?;
            Some(user_id)
        }
        _ => None,
    };

    req.extensions_mut().insert(Viewer(viewer));
    Ok(next.run(req).await)
}
