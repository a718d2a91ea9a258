use std::time::Duration;

use axum::extract::FromRef;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::SessionConfig;
use crate::state::AppState;

/// Session token payload. Carries only the user id; expiry lives in the
/// cookie's Max-Age, not in the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
}

/// Signing and verification keys plus the cookie parameters, materialized
/// from the configured session secret.
#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub cookie_name: String,
    pub max_age: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig {
            secret,
            cookie_name,
            ttl_seconds,
        } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            cookie_name,
            max_age: Duration::from_secs(ttl_seconds),
        }
    }
}

impl SessionKeys {
    pub fn issue(&self, user_id: i64) -> anyhow::Result<String> {
        let token = encode(&Header::default(), &Claims { sub: user_id }, &self.encoding)?;
        debug!(user_id = %user_id, "session token issued");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // No exp claim in the payload; the cookie governs lifetime
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;
        debug!(user_id = %data.claims.sub, "session token verified");
        Ok(data.claims)
    }

    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.cookie_name,
            token,
            self.max_age.as_secs()
        )
    }
}

/// Pull the session token out of a (possibly multi-valued) Cookie header.
pub(crate) fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        pair.strip_prefix(cookie_name)?
            .strip_prefix('=')
            .map(str::to_string)
    })
}
