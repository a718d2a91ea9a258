use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest},
        extractors::AuthUser,
        repo_types::User,
        services::{hash_password, verify_password},
        session::SessionKeys,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(profile))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map_or(false, |db| db.is_unique_violation())
}

/// 201 with the session cookie and an empty body.
fn session_created(keys: &SessionKeys, token: &str) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        AppendHeaders([(header::SET_COOKIE, keys.cookie(token))]),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    let hash = hash_password(&payload.password)?;

    let user = match User::create(&state.db, &payload.email, &hash).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email already registered");
            return Err(AuthError::UserExists);
        }
        Err(e) => return Err(AuthError::Store(e)),
    };

    let keys = SessionKeys::from_ref(&state);
    let token = keys.issue(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(session_created(&keys, &token))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password fall through to the same error
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            AuthError::InvalidCredentials
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let keys = SessionKeys::from_ref(&state);
    let token = keys.issue(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(session_created(&keys, &token))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    // A valid token for a deleted user reads the same as no session at all
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_serialization() {
        let response = PublicUser {
            id: 1,
            email: "test@example.com".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("id"));
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn session_created_sets_cookie_and_empty_body() {
        use jsonwebtoken::{DecodingKey, EncodingKey};
        use std::time::Duration;

        let keys = SessionKeys {
            encoding: EncodingKey::from_secret(b"dev-secret"),
            decoding: DecodingKey::from_secret(b"dev-secret"),
            cookie_name: "session".into(),
            max_age: Duration::from_secs(86400),
        };
        let response = session_created(&keys, "tok").into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(
            cookie,
            "session=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=86400"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }
}
