use rusqlite::OptionalExtension;

use super::{lock, SharedConnection};
use crate::error::Result;

/// Flat string key/value storage for device-local state.
#[derive(Clone)]
pub struct LocalStorage {
    conn: SharedConnection,
}

impl LocalStorage {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = lock(&self.conn)?;
        let value = conn
            .query_row("SELECT value FROM local_storage WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory;

    #[test]
    fn set_get_remove() {
        let storage = LocalStorage::new(open_in_memory().unwrap());
        assert_eq!(storage.get("schedule").unwrap(), None);

        storage.set("schedule", "{}").unwrap();
        storage.set("schedule", r#"{"2025-11-13":[]}"#).unwrap();
        assert_eq!(storage.get("schedule").unwrap().as_deref(), Some(r#"{"2025-11-13":[]}"#));

        storage.remove("schedule").unwrap();
        assert_eq!(storage.get("schedule").unwrap(), None);
    }
}
