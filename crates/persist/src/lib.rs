//! kubefzf persistence: the fetcher state snapshot in a small SQLite file.
//!
//! Every invocation of the completion binary is a fresh process, so the cache
//! only survives through this file. `save` merges the snapshot inside one
//! IMMEDIATE transaction: readers (WAL) see the previous or the next state,
//! never a mix, and concurrent writers queue on the database lock. Per kind,
//! the payload with the newest `fetched_at` wins and usage counters take the
//! maximum, so a completion saving a snapshot loaded before a concurrent
//! ingest does not undo that ingest. Kinds absent from the snapshot and unset
//! meta values are left as stored.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use kubefzf_core::{FetcherState, LiteObj, ResourceCache};
use metrics::{counter, histogram};
use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no fetcher state at {}; ingest some resources first", .0.display())]
    Missing(PathBuf),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt payload for {kind}: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type StateResult<T> = Result<T, StateError>;

/// Per-kind numbers for the `stats` report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindStats {
    pub kind: String,
    pub namespaced: bool,
    pub objects: usize,
    pub namespaces: usize,
    pub payload_bytes: usize,
    pub resource_version: Option<String>,
    pub fetched_at: i64,
    pub last_access: i64,
    pub completions: u64,
}

/// Loads and saves the fetcher state between invocations.
pub trait StateStore {
    fn load(&self) -> StateResult<FetcherState>;
    fn save(&self, state: &FetcherState) -> StateResult<()>;
    fn stats(&self) -> StateResult<Vec<KindStats>>;
}

/// SQLite-backed store. Opens a connection per call; the CLI does one load and one save.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    path: PathBuf,
    create: bool,
}

impl SqliteStateStore {
    /// Store over an existing database; a missing file is a load error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), create: false }
    }

    /// Store that creates the database (and its parent directory) on first use.
    pub fn open_or_create(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), create: true }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn connect(&self) -> StateResult<Connection> {
        if !self.create && !self.path.exists() {
            return Err(StateError::Missing(self.path.clone()));
        }
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.create {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let db = Connection::open_with_flags(&self.path, flags)?;
        db.busy_timeout(Duration::from_secs(5))?;
        db.pragma_update(None, "journal_mode", "WAL").ok();
        db.pragma_update(None, "synchronous", "NORMAL").ok();
        if self.create {
            db.execute_batch(
                "CREATE TABLE IF NOT EXISTS meta (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS kinds (
                    kind             TEXT PRIMARY KEY,
                    namespaced       INTEGER NOT NULL,
                    resource_version TEXT,
                    fetched_at       INTEGER NOT NULL,
                    last_access      INTEGER NOT NULL,
                    completions      INTEGER NOT NULL,
                    payload          BLOB NOT NULL
                );",
            )?;
        }
        Ok(db)
    }

    fn read_kinds(db: &Connection) -> StateResult<Vec<(ResourceCache, usize)>> {
        let mut stmt = db.prepare(
            "SELECT kind, namespaced, resource_version, fetched_at, last_access, completions, payload
             FROM kinds ORDER BY kind",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(0)?;
            let blob: Vec<u8> = row.get(6)?;
            let items: Vec<LiteObj> = serde_json::from_slice(&maybe_decompress(&blob))
                .map_err(|source| StateError::Payload { kind: kind.clone(), source })?;
            let cache = ResourceCache {
                kind,
                namespaced: row.get(1)?,
                items,
                resource_version: row.get(2)?,
                fetched_at: row.get(3)?,
                last_access: row.get(4)?,
                completions: row.get::<_, i64>(5)?.max(0) as u64,
            };
            out.push((cache, blob.len()));
        }
        Ok(out)
    }

    fn meta(db: &Connection, key: &str) -> StateResult<Option<String>> {
        Ok(db
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |r| r.get(0))
            .optional()?)
    }
}

impl StateStore for SqliteStateStore {
    fn load(&self) -> StateResult<FetcherState> {
        let started = Instant::now();
        let db = self.connect()?;
        let mut state = FetcherState {
            context: Self::meta(&db, "context")?,
            namespace: Self::meta(&db, "namespace")?,
            ..Default::default()
        };
        for (cache, _) in Self::read_kinds(&db)? {
            state.kinds.insert(cache.kind.clone(), cache);
        }
        histogram!("persist_load_ms", started.elapsed().as_secs_f64() * 1000.0);
        debug!(path = %self.path.display(), kinds = state.kinds.len(), "fetcher state loaded");
        Ok(state)
    }

    fn save(&self, state: &FetcherState) -> StateResult<()> {
        let started = Instant::now();
        let mut db = self.connect()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (key, value) in [("context", &state.context), ("namespace", &state.namespace)] {
            if let Some(v) = value {
                tx.execute("INSERT OR REPLACE INTO meta(key, value) VALUES (?1, ?2)", (key, v))?;
            }
        }
        for cache in state.kinds.values() {
            let json = serde_json::to_vec(&cache.items)
                .map_err(|source| StateError::Payload { kind: cache.kind.clone(), source })?;
            let completions = cache.completions.min(i64::MAX as u64) as i64;
            // A fetch committed by another process after our load wins over our copy
            let written = tx.execute(
                "INSERT INTO kinds(kind, namespaced, resource_version, fetched_at, last_access, completions, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(kind) DO UPDATE SET
                     namespaced       = excluded.namespaced,
                     resource_version = excluded.resource_version,
                     fetched_at       = excluded.fetched_at,
                     payload          = excluded.payload,
                     last_access      = max(kinds.last_access, excluded.last_access),
                     completions      = max(kinds.completions, excluded.completions)
                 WHERE excluded.fetched_at >= kinds.fetched_at",
                (
                    &cache.kind,
                    cache.namespaced,
                    &cache.resource_version,
                    cache.fetched_at,
                    cache.last_access,
                    completions,
                    maybe_compress(&json),
                ),
            )?;
            if written == 0 {
                tx.execute(
                    "UPDATE kinds SET last_access = max(last_access, ?2), completions = max(completions, ?3)
                     WHERE kind = ?1",
                    (&cache.kind, cache.last_access, completions),
                )?;
                debug!(kind = %cache.kind, fetched_at = cache.fetched_at, "newer fetch on disk; kept its payload");
            }
        }
        tx.commit()?;
        histogram!("persist_save_ms", started.elapsed().as_secs_f64() * 1000.0);
        counter!("persist_save_total", 1u64);
        debug!(path = %self.path.display(), kinds = state.kinds.len(), "fetcher state saved");
        Ok(())
    }

    fn stats(&self) -> StateResult<Vec<KindStats>> {
        let db = self.connect()?;
        let out = Self::read_kinds(&db)?
            .into_iter()
            .map(|(cache, payload_bytes)| {
                let mut namespaces: Vec<&str> = cache.items.iter().filter_map(|o| o.namespace.as_deref()).collect();
                namespaces.sort_unstable();
                namespaces.dedup();
                KindStats {
                    namespaces: namespaces.len(),
                    kind: cache.kind.clone(),
                    namespaced: cache.namespaced,
                    objects: cache.items.len(),
                    payload_bytes,
                    resource_version: cache.resource_version.clone(),
                    fetched_at: cache.fetched_at,
                    last_access: cache.last_access,
                    completions: cache.completions,
                }
            })
            .collect();
        Ok(out)
    }
}

/// `$HOME/.kubectl-fzf/state.db`, or `state.db` in the working directory without HOME.
pub fn default_state_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".kubectl-fzf").join("state.db"),
        None => PathBuf::from("state.db"),
    }
}

pub fn now_ts() -> i64 {
    // seconds since epoch
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    now.as_secs() as i64
}

pub fn maybe_compress(json: &[u8]) -> Vec<u8> {
    #[cfg(feature = "zstd")]
    {
        let lvl: i32 = std::env::var("KUBEFZF_ZSTD_LEVEL").ok().and_then(|s| s.parse().ok()).unwrap_or(3);
        return zstd::encode_all(json, lvl).unwrap_or_else(|_| json.to_vec());
    }
    json.to_vec()
}

pub fn maybe_decompress(blob: &[u8]) -> Vec<u8> {
    #[cfg(feature = "zstd")]
    {
        if let Ok(de) = zstd::decode_all(std::io::Cursor::new(blob)) {
            return de;
        }
    }
    blob.to_vec()
}
