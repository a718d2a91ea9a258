use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-level failures surfaced to the client.
///
/// Login and profile deliberately collapse distinct causes into one variant
/// (unknown email vs wrong password, missing cookie vs bad token vs deleted
/// user) so the response body never reveals which check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::UserExists => (StatusCode::BAD_REQUEST, "User already exists"),
            AuthError::InvalidCredentials => (StatusCode::BAD_REQUEST, "Invalid credentials"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AuthError::Store(ref e) => {
                error!(error = %e, "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
            }
            AuthError::Internal(ref e) => {
                error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn user_exists_maps_to_400() {
        let response = AuthError::UserExists.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "User already exists" })
        );
    }

    #[tokio::test]
    async fn invalid_credentials_maps_to_400() {
        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Invalid credentials" })
        );
    }

    #[tokio::test]
    async fn unauthorized_maps_to_401() {
        let response = AuthError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Unauthorized" })
        );
    }

    #[tokio::test]
    async fn store_failure_hides_details() {
        let response = AuthError::Store(sqlx::Error::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Something went wrong" })
        );
    }
}
