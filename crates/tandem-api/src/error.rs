use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use tandem_db::{ErrorKind, StoreError};

use crate::auth::TokenError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Token(TokenError::Invalid(_) | TokenError::Malformed) => StatusCode::UNAUTHORIZED,
            ApiError::Token(TokenError::Issue(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, "request failed");
            let text = status.canonical_reason().unwrap_or("Internal Server Error");
            return (status, text).into_response();
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::InvalidEmail, StatusCode::UNPROCESSABLE_ENTITY),
            (StoreError::InvalidUsername, StatusCode::UNPROCESSABLE_ENTITY),
            (StoreError::InvalidPassword, StatusCode::CONFLICT),
            (StoreError::UserExists, StatusCode::CONFLICT),
            (StoreError::UserNotFound, StatusCode::NOT_FOUND),
            (StoreError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (StoreError::ForbiddenSelfFollow, StatusCode::FORBIDDEN),
            (StoreError::Cancelled, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn infrastructure_errors_hide_details() {
        use http_body_util::BodyExt;
        use tandem_db::error::SqlError;

        let err = StoreError::query("profile query", SqlError::InvalidQuery);
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Internal Server Error");
    }
}
