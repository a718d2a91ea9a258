use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::session::{self, SessionKeys};
use crate::error::AuthError;

/// The authenticated principal: a verified user id from the session cookie.
///
/// This is the single authentication gate; handlers take an `AuthUser` and
/// never re-decode the token. Every rejection is the same `Unauthorized`
/// response, whether the cookie is missing, malformed, or badly signed.
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);

        let token = session::session_token(&parts.headers, &keys.cookie_name)
            .ok_or(AuthError::Unauthorized)?;

        let claims = keys.verify(&token).map_err(|e| {
            warn!(error = %e, "session token rejected");
            AuthError::Unauthorized
        })?;

        Ok(AuthUser(claims.sub))
    }
}
