// Memo persistence using SQLite: one blob table for state, one for uploads.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::debug;

use creditmemo_recon::store::MemoStore;
use creditmemo_recon::{MemoState, SourceFile, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS blobs (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    digest TEXT NOT NULL UNIQUE,   -- sha256 of the bytes
    name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    bytes BLOB NOT NULL,
    added_at TEXT NOT NULL
);
"#;

const STATE_KEY: &str = "memo";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(backend)?;
        debug!(path = %path.display(), "opened memo store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(backend)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self { conn })
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

impl MemoStore for SqliteStore {
    fn save(&mut self, state: &MemoState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![STATE_KEY, json, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<MemoState>, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT value FROM blobs WHERE key = ?1", params![STATE_KEY], |row| row.get(0))
            .optional()
            .map_err(backend)?;
        json.map(|s| serde_json::from_str(&s).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }

    fn save_file(&mut self, file: &SourceFile) -> Result<(), StoreError> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO files (digest, name, mime_type, bytes, added_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    digest(&file.bytes),
                    file.name,
                    file.mime_type,
                    file.bytes,
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .map_err(backend)?;
        if inserted == 0 {
            debug!(file = %file.name, "identical upload already stored");
        }
        Ok(())
    }

    fn load_files(&self) -> Result<Vec<SourceFile>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, mime_type, bytes FROM files ORDER BY seq")
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SourceFile {
                    name: row.get(0)?,
                    mime_type: row.get(1)?,
                    bytes: row.get(2)?,
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(backend)?;
        tx.execute("DELETE FROM blobs", []).map_err(backend)?;
        tx.execute("DELETE FROM files", []).map_err(backend)?;
        tx.commit().map_err(backend)
    }
}
