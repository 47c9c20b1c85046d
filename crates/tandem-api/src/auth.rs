use std::sync::Arc;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::info;

use tandem_db::{Database, StoreError, validate};
use tandem_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use tandem_types::models::AuthUser;

use crate::error::ApiError;
use crate::middleware::Viewer;
use crate::blocking;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenCodec,
}

// -- Tokens --

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("malformed bearer credentials")]
    Malformed,

    #[error("could not issue token: {0}")]
    Issue(#[source] jsonwebtoken::errors::Error),
}

/// Issues and verifies the stateless HS256 tokens carried as bearer
/// credentials. Expiry is enforced without leeway.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifespan: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, lifespan: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifespan,
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now + self.lifespan;
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Issue)?;
        Ok((token, expires_at))
    }

    /// Returns the user id embedded in a valid, unexpired token.
    pub fn authenticate(&self, token: &str) -> Result<i64, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(TokenError::Invalid)?;
        Ok(data.claims.sub)
    }
}

// -- Passwords --

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// A mismatch reports the user as not found, same as an unknown email.
fn verify_password(password: &str, stored: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("stored password hash unreadable: {e}"))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| StoreError::UserNotFound)?;
    Ok(())
}

// -- Handlers --

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    blocking(&state, move |app, cancel| {
        let email = validate::email(&req.email)?;
        let username = validate::username(&req.username)?;
        let password = validate::password(&req.password)?;

        let password_hash = hash_password(password)?;
        let user_id = app.db.create_user(cancel, email, username, &password_hash)?;

        info!(user_id, username, "user registered");
        Ok(())
    })
    .await?;

    Ok(Json(RegisterResponse {
        text: "user created".to_string(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let out = blocking(&state, move |app, cancel| {
        let email = validate::email(&req.email)?;
        let password = validate::password(&req.password).map_err(|_| StoreError::UserNotFound)?;

        let user = app
            .db
            .credentials_by_email(cancel, email)?
            .ok_or(StoreError::UserNotFound)?;
        verify_password(password, &user.password)?;

        let (token, expires_at) = app.tokens.issue(user.id)?;
        Ok(LoginResponse {
            token,
            expires_at,
            auth_user: AuthUser {
                id: user.id,
                username: user.username,
            },
        })
    })
    .await?;

    Ok(Json(out))
}

pub async fn auth_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<AuthUser>, ApiError> {
    let user = blocking(&state, move |app, cancel| Ok(app.db.auth_user(cancel, viewer.0)?)).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip() {
        let codec = TokenCodec::new("test-secret", Duration::hours(1));
        let (token, expires_at) = codec.issue(42).unwrap();

        assert!(expires_at > Utc::now());
        assert_eq!(codec.authenticate(&token).unwrap(), 42);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::new("test-secret", Duration::seconds(-5));
        let (token, _) = codec.issue(42).unwrap();

        assert!(matches!(codec.authenticate(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = TokenCodec::new("test-secret", Duration::hours(1));
        let (token, _) = codec.issue(42).unwrap();
        let (other, _) = codec.issue(7).unwrap();

        // Graft the payload of one token onto the signature of another.
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);
        assert!(matches!(codec.authenticate(&forged), Err(TokenError::Invalid(_))));

        let foreign = TokenCodec::new("another-secret", Duration::hours(1));
        assert!(matches!(foreign.authenticate(&token), Err(TokenError::Invalid(_))));

        assert!(matches!(codec.authenticate("not-a-token"), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("Secr3t!").unwrap();
        assert_ne!(hash, "Secr3t!");
        assert!(verify_password("Secr3t!", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(ApiError::Store(StoreError::UserNotFound))
        ));
    }
}
