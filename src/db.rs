use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed persistence: best-effort group checkpoints plus the flat
/// metadata key-value store written by the router.
pub struct Db {
    pub conn: Mutex<Connection>,
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("Failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("Failed to set pragmas");
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .expect("Failed to run migrations");
    }

    // --- Group checkpoints ---

    pub fn save_group(&self, id: &str, state_json: &str, version: u64) -> rusqlite::Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO groups (id, state, version, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET state = ?2, version = ?3, updated_at = ?4",
            params![id, state_json, version as i64, &now],
        )?;
        Ok(())
    }

    pub fn load_group(&self, id: &str) -> rusqlite::Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT state FROM groups WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn group_count(&self) -> i64 {
        self.conn()
            .query_row("SELECT COUNT(*) FROM groups", [], |r| r.get(0))
            .unwrap_or(0)
    }

    // --- Metadata KV ---

    pub fn kv_put(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        self.conn().execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_get(&self, key: &str) -> rusqlite::Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn kv_delete(&self, key: &str) -> rusqlite::Result<()> {
        self.conn()
            .execute("DELETE FROM metadata WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// All keys starting with `prefix`, in key order. The prefix is escaped
    /// so emails containing LIKE wildcards cannot widen the scan.
    pub fn kv_prefix(&self, prefix: &str) -> rusqlite::Result<Vec<(String, String)>> {
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT key, value FROM metadata WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let rows = stmt
            .query_map(params![format!("{escaped}%")], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}
