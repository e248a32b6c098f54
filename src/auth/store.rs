// Credential store: persistence contract for the token pair

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::types::{CredentialPair, CredentialRecord};

/// Key under which the session record is stored in SQLite
const SESSION_KEY: &str = "formgate:session";

/// Persistence contract for the credential pair.
///
/// The gateway holds no long-lived copy of the tokens; it reads current
/// values from the store at the start of each request attempt and writes
/// only after a successful refresh or on clear. Implementations must be
/// safe to call repeatedly; `clear` is idempotent.
pub trait CredentialStore: Send + Sync {
    /// Current pair; an empty pair when nothing is stored
    fn read(&self) -> Result<CredentialPair>;

    /// Replace the stored pair wholesale
    fn write(&self, pair: &CredentialPair) -> Result<()>;

    /// Destroy both tokens
    fn clear(&self) -> Result<()>;
}

/// In-process store. The default for embedders that persist tokens
/// elsewhere, and the test double.
#[derive(Default)]
pub struct MemoryStore {
    pair: RwLock<CredentialPair>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(pair),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn read(&self) -> Result<CredentialPair> {
        let guard = self
            .pair
            .read()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn write(&self, pair: &CredentialPair) -> Result<()> {
        let mut guard = self
            .pair
            .write()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        *guard = pair.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.write(&CredentialPair::default())
    }
}

/// SQLite-backed store: a single `auth_kv` key/value table holding the
/// session record as JSON.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if necessary) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }

        let store = Self { path };
        store.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
                [],
            )?;
            Ok(())
        })?;

        Ok(store)
    }

    /// Open the store at the default per-user location
    pub fn open_default() -> Result<Self> {
        Self::open(default_store_path()?)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = rusqlite::Connection::open(&self.path)
            .with_context(|| format!("Failed to open SQLite database: {}", self.path.display()))?;
        f(&conn).with_context(|| format!("SQLite query failed: {}", self.path.display()))
    }
}

impl CredentialStore for SqliteStore {
    fn read(&self) -> Result<CredentialPair> {
        let value: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM auth_kv WHERE key = ?",
                [SESSION_KEY],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })?;

        match value {
            None => Ok(CredentialPair::default()),
            Some(json) => {
                let record: CredentialRecord = serde_json::from_str(&json)
                    .context("Failed to parse stored session record")?;
                Ok(record.pair)
            }
        }
    }

    fn write(&self, pair: &CredentialPair) -> Result<()> {
        let record = CredentialRecord {
            pair: pair.clone(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).context("Failed to serialize session record")?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![SESSION_KEY, json],
            )?;
            Ok(())
        })
    }

    fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM auth_kv WHERE key = ?", [SESSION_KEY])?;
            Ok(())
        })
    }
}

/// Default store location under the per-user data directory
fn default_store_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not determine user data directory")?;
    Ok(data_dir.join("formgate").join("session.sqlite3"))
}
