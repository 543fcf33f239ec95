//! Local `SQLite` backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::schema::{self, ROSTER_ROW_ID};
use super::{migrations, RosterStore};
use crate::error::{Error, Result};
use crate::roster::RosterSnapshot;

/// Keeps the roster as a single row in a local `SQLite` database.
///
/// Queries run on the blocking pool; the connection is shared behind a
/// mutex so the store itself stays `Send + Sync`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a roster database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening roster database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::initialize_schema(&conn)?;

        info!("Roster database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::internal("roster database lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("database task failed: {e}")))?
    }
}

fn read_document(conn: &Connection) -> Result<Option<String>> {
    let data = conn
        .query_row(
            "SELECT data FROM roster_state WHERE id = ?1",
            [ROSTER_ROW_ID],
            |row| row.get(0),
        )
        .optional()?;
    Ok(data)
}

/// Write the document unless the stored fingerprint already matches.
/// Returns `true` if a row was written.
fn write_document(conn: &Connection, json: &str, fingerprint: &str) -> Result<bool> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT fingerprint FROM roster_state WHERE id = ?1",
            [ROSTER_ROW_ID],
            |row| row.get(0),
        )
        .optional()?;
    if stored.as_deref() == Some(fingerprint) {
        return Ok(false);
    }

    conn.execute(
        r"
        INSERT INTO roster_state (id, data, fingerprint, updated_at)
        VALUES (?1, ?2, ?3, datetime('now'))
        ON CONFLICT(id) DO UPDATE SET
            data = excluded.data,
            fingerprint = excluded.fingerprint,
            updated_at = excluded.updated_at
        ",
        params![ROSTER_ROW_ID, json, fingerprint],
    )?;
    Ok(true)
}

#[async_trait]
impl RosterStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<RosterSnapshot> {
        match self.with_conn(read_document).await? {
            Some(text) => migrations::decode_snapshot_str(&text),
            None => {
                debug!("Roster database is empty, starting fresh");
                Ok(RosterSnapshot::new())
            }
        }
    }

    async fn save(&self, snapshot: &RosterSnapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        let fingerprint = blake3::hash(json.as_bytes()).to_hex().to_string();

        let written = self
            .with_conn(move |conn| write_document(conn, &json, &fingerprint))
            .await?;
        if written {
            debug!("Saved roster to {}", self.path.display());
        } else {
            debug!("Roster unchanged, skipping database write");
        }
        Ok(())
    }
}
