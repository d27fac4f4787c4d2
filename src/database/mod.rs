use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::AppError;

pub mod documents;
pub mod local_storage;
pub mod queries;
pub mod schema;

pub use documents::{DocumentStore, Listener, SetOptions, SqliteDocumentStore, Subscription};
pub use local_storage::LocalStorage;

/// One connection shared by the document store, local storage and chat history.
pub type SharedConnection = Arc<Mutex<Connection>>;

pub const DB_FILE_NAME: &str = "dreamos.db";

pub fn init_database(db_path: &Path) -> Result<SharedConnection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database at {}", db_path.display()))?;

    // Enable WAL mode
    conn.pragma_update(None, "journal_mode", &"WAL")?;
    conn.pragma_update(None, "synchronous", &"NORMAL")?;
    conn.pragma_update(None, "foreign_keys", &"ON")?;

    // Create schema
    schema::create_tables(&conn)?;

    Ok(Arc::new(Mutex::new(conn)))
}

/// Fresh schema in memory; used by tests.
pub fn open_in_memory() -> Result<SharedConnection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", &"ON")?;
    schema::create_tables(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn lock(conn: &SharedConnection) -> crate::error::Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| AppError::InvalidState("database lock poisoned".to_string()))
}
