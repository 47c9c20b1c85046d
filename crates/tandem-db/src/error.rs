use thiserror::Error;

use crate::query::QueryBuildError;

pub use rusqlite::Error as SqlError;

/// Coarse classification of a [`StoreError`], used by the HTTP layer to pick
/// a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthenticated,
    Forbidden,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid email")]
    InvalidEmail,

    #[error("invalid username")]
    InvalidUsername,

    #[error("invalid password")]
    InvalidPassword,

    #[error("user already exists")]
    UserExists,

    #[error("user not found")]
    UserNotFound,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("cannot follow yourself")]
    ForbiddenSelfFollow,

    #[error("could not build query: {0}")]
    QueryBuild(#[from] QueryBuildError),

    #[error("{context} failed: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("transaction {stage} failed: {source}")]
    Transaction {
        stage: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{context} failed: {source}")]
    RelationshipWrite {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("database lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidEmail | StoreError::InvalidUsername => ErrorKind::Validation,
            StoreError::InvalidPassword | StoreError::UserExists => ErrorKind::Conflict,
            StoreError::UserNotFound => ErrorKind::NotFound,
            StoreError::Unauthenticated => ErrorKind::Unauthenticated,
            StoreError::ForbiddenSelfFollow => ErrorKind::Forbidden,
            StoreError::QueryBuild(_)
            | StoreError::Query { .. }
            | StoreError::Transaction { .. }
            | StoreError::RelationshipWrite { .. }
            | StoreError::Cancelled
            | StoreError::Poisoned => ErrorKind::Infrastructure,
        }
    }

    pub fn query(context: &'static str, source: rusqlite::Error) -> Self {
        StoreError::Query { context, source }
    }

    pub fn transaction(stage: &'static str, source: rusqlite::Error) -> Self {
        StoreError::Transaction { stage, source }
    }

    pub fn write(context: &'static str, source: rusqlite::Error) -> Self {
        StoreError::RelationshipWrite { context, source }
    }
}

/// Attaches operation context to raw rusqlite results.
pub(crate) trait ResultExt<T> {
    fn query_context(self, context: &'static str) -> Result<T, StoreError>;
    fn write_context(self, context: &'static str) -> Result<T, StoreError>;
}

impl<T> ResultExt<T> for Result<T, rusqlite::Error> {
    fn query_context(self, context: &'static str) -> Result<T, StoreError> {
        self.map_err(|e| StoreError::query(context, e))
    }

    fn write_context(self, context: &'static str) -> Result<T, StoreError> {
        self.map_err(|e| StoreError::write(context, e))
    }
}
