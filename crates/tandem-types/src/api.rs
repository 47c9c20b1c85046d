use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AuthUser;

// -- JWT Claims --

/// Token payload. `sub` is the numeric user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub auth_user: AuthUser,
}

// -- Users --

/// Query string of `GET /users`. `first` stays a string so that a
/// non-numeric value falls back to the default page size instead of failing.
#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    #[serde(default)]
    pub search: String,
    pub first: Option<String>,
    #[serde(default)]
    pub after: String,
}

impl UsersQuery {
    pub fn first(&self) -> i64 {
        self.first
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}
