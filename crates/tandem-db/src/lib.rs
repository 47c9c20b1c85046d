pub mod error;
pub mod follows;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod queries;
pub mod query;
pub mod validate;

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub use error::{ErrorKind, StoreError};
pub use profiles::{PageSizePolicy, UserSearch};
pub use tokio_util::sync::CancellationToken;

/// SQLite virtual machine instructions between two cancellation checks.
const PROGRESS_OPS: i32 = 1000;

pub struct Database {
    conn: Mutex<Connection>,
    page_size: PageSizePolicy,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            page_size: PageSizePolicy::default(),
        })
    }

    pub fn with_page_size(mut self, policy: PageSizePolicy) -> Self {
        self.page_size = policy;
        self
    }

    pub fn page_size(&self) -> PageSizePolicy {
        self.page_size
    }

    pub fn with_conn<F, T>(&self, cancel: &CancellationToken, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        self.with_conn_mut(cancel, |conn| f(conn))
    }

    /// Runs `f` with exclusive access to the connection. Statements started
    /// inside `f` are interrupted as soon as `cancel` fires.
    pub fn with_conn_mut<F, T>(&self, cancel: &CancellationToken, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        // The token may have fired while this call was queued on the lock.
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let token = AssertUnwindSafe(cancel.clone());
        conn.progress_handler(PROGRESS_OPS, Some(move || token.is_cancelled()));
        let result = f(&mut conn);
        conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|e| if cancel.is_cancelled() { StoreError::Cancelled } else { e })
    }
}
