//! Key/value editor settings.
//!
//! # Invariants
//! - Keys are unique; `set` overwrites.

use crate::repo::{ensure_connection_ready, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Persistence contract for small string preferences.
pub trait SettingsRepository {
    fn get(&self, key: &str) -> RepoResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> RepoResult<()>;
    /// Removes `key`; a missing key is not an error.
    fn remove(&self, key: &str) -> RepoResult<()>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "settings", &["key", "value", "updated_at"])?;
        Ok(Self { conn })
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1;", [key])?;
        Ok(())
    }
}

/// Process-local settings for hosts without a database.
#[derive(Debug, Default)]
pub struct MemorySettingsRepository {
    values: RefCell<BTreeMap<String, String>>,
}

impl MemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsRepository for MemorySettingsRepository {
    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> RepoResult<()> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SettingsRepository, SqliteSettingsRepository};
    use crate::db::open_db_in_memory;

    #[test]
    fn set_overwrites_and_remove_is_idempotent() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSettingsRepository::try_new(&conn).unwrap();
        assert_eq!(repo.get("proof_mode").unwrap(), None);

        repo.set("proof_mode", "active").unwrap();
        repo.set("proof_mode", "inactive").unwrap();
        assert_eq!(repo.get("proof_mode").unwrap().as_deref(), Some("inactive"));

        repo.remove("proof_mode").unwrap();
        repo.remove("proof_mode").unwrap();
        assert_eq!(repo.get("proof_mode").unwrap(), None);
    }
}
