use rusqlite::{ErrorCode, OptionalExtension};

use tandem_types::models::AuthUser;

use crate::error::{ResultExt, StoreError};
use crate::models::CredentialRow;
use crate::{CancellationToken, Database};

impl Database {
    // -- Users --

    /// Inserts a new user. Inputs are expected to be validated and the
    /// password already hashed.
    pub fn create_user(
        &self,
        cancel: &CancellationToken,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<i64, StoreError> {
        self.with_conn(cancel, |conn| {
            match conn.execute(
                "INSERT INTO users (email, username, password) VALUES (?1, ?2, ?3)",
                (email, username, password_hash),
            ) {
                Ok(_) => Ok(conn.last_insert_rowid()),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Err(StoreError::UserExists)
                }
                Err(e) => Err(StoreError::query("insert user", e)),
            }
        })
    }

    pub fn credentials_by_email(
        &self,
        cancel: &CancellationToken,
        email: &str,
    ) -> Result<Option<CredentialRow>, StoreError> {
        self.with_conn(cancel, |conn| {
            conn.query_row(
                "SELECT id, username, password FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(CredentialRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password: row.get(2)?,
                    })
                },
            )
            .optional()
            .query_context("credentials query")
        })
    }

    /// Resolves the viewer to a user. Tokens are stateless and may carry an
    /// id that no longer exists; that case is reported as not found.
    pub fn auth_user(
        &self,
        cancel: &CancellationToken,
        viewer: Option<i64>,
    ) -> Result<AuthUser, StoreError> {
        let id = viewer.ok_or(StoreError::Unauthenticated)?;

        let username: Option<String> = self.with_conn(cancel, |conn| {
            conn.query_row("SELECT username FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()
                .query_context("auth user query")
        })?;

        let username = username.ok_or(StoreError::UserNotFound)?;
        Ok(AuthUser { id, username })
    }
}
