//! Input normalization for account and profile operations.
//!
//! Every function trims its input and returns the trimmed slice on success.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::StoreError;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,17}$").expect("username pattern"));

pub fn email(raw: &str) -> Result<&str, StoreError> {
    let email = raw.trim();
    if EMAIL.is_match(email) { Ok(email) } else { Err(StoreError::InvalidEmail) }
}

pub fn username(raw: &str) -> Result<&str, StoreError> {
    let username = raw.trim();
    if USERNAME.is_match(username) { Ok(username) } else { Err(StoreError::InvalidUsername) }
}

pub fn password(raw: &str) -> Result<&str, StoreError> {
    let password = raw.trim();
    if password.is_empty() { Err(StoreError::InvalidPassword) } else { Ok(password) }
}
