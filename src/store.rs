// Copyright 2026 Quire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::catalog::Catalog;

#[derive(Debug)]
pub struct Store {
    pub conn: Connection,
    pub path: PathBuf,
    lock: Option<StoreLock>,
}

#[derive(Debug)]
struct StoreLock {
    _file: File,
    path: PathBuf,
    mode: StoreMode,
}

impl StoreLock {
    fn new(file: File, path: PathBuf, mode: StoreMode) -> Self {
        Self {
            _file: file,
            path,
            mode,
        }
    }
}

const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, Copy)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub page_count: i64,
    pub value_count: i64,
    pub db_size_bytes: u64,
}

#[derive(Debug)]
pub struct IntegrityReport {
    pub status: String,
    pub stats: StoreStats,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsistencyReport {
    pub page_count: i64,
    pub fts_count: i64,
    pub fts_missing: i64,
    pub orphan_values: i64,
    pub orphan_exact: i64,
}

impl ConsistencyReport {
    pub fn fts_ok(&self) -> bool {
        self.page_count == self.fts_count && self.fts_missing == 0
    }

    pub fn orphans_ok(&self) -> bool {
        self.orphan_values == 0 && self.orphan_exact == 0
    }
}

impl Store {
    pub fn init(path: &Path, catalog: &Catalog) -> Result<()> {
        if path.exists() {
            anyhow::bail!("store already exists at {}", path.display());
        }
        let _lock = Self::acquire_lock(path, StoreMode::ReadWrite)?;
        let conn = Self::open_connection(path, StoreMode::ReadWrite)?;
        Self::apply_pragmas(&conn, StoreMode::ReadWrite)?;
        Self::create_schema(&conn, catalog)?;
        Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Self::set_meta(&conn, "catalog_fingerprint", &catalog.fingerprint())?;
        Self::set_meta(&conn, "created_at", &now_rfc3339())?;
        Ok(())
    }

    pub fn open(path: &Path, mode: StoreMode, catalog: &Catalog) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "no store at {}; run `quire init` to create one",
                path.display()
            );
        }
        let lock = Self::acquire_lock(path, mode)?;
        let conn = Self::open_connection(path, mode)?;
        Self::apply_pragmas(&conn, mode)?;

        let version = Self::schema_version(&conn)?;
        if version != SCHEMA_VERSION {
            anyhow::bail!(
                "store schema version {} is not supported (expected {}); re-init the store",
                version,
                SCHEMA_VERSION
            );
        }
        let recorded = Self::get_meta(&conn, "catalog_fingerprint")?.unwrap_or_default();
        let expected = catalog.fingerprint();
        if recorded != expected {
            anyhow::bail!(
                "store at {} was initialized with a different field catalog \
                 (recorded {recorded}, configured {expected}); remove it and re-run `quire init`",
                path.display()
            );
        }

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            lock: Some(lock),
        })
    }

    fn open_connection(path: &Path, mode: StoreMode) -> Result<Connection> {
        let flags = match mode {
            StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            StoreMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        Ok(conn)
    }

    fn apply_pragmas(conn: &Connection, mode: StoreMode) -> Result<()> {
        if matches!(mode, StoreMode::ReadWrite) {
            conn.execute_batch("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;")
                .context("apply pragmas")?;
        }
        Ok(())
    }

    fn lock_path_for(path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let mut dir = std::env::temp_dir();
        dir.push("quire");
        fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        Ok(dir.join(format!("quire-{hash}.lock")))
    }

    fn acquire_lock(path: &Path, mode: StoreMode) -> Result<StoreLock> {
        let lock_path = Self::lock_path_for(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        let deadline = Instant::now() + Duration::from_millis(5000);
        loop {
            let locked = match mode {
                StoreMode::ReadOnly => file.try_lock_shared().map_err(|err| err.to_string()),
                StoreMode::ReadWrite => file.try_lock_exclusive().map_err(|err| err.to_string()),
            };
            match locked {
                Ok(()) => return Ok(StoreLock::new(file, lock_path, mode)),
                Err(_) if Instant::now() >= deadline => {
                    let mode_label = match mode {
                        StoreMode::ReadOnly => "read",
                        StoreMode::ReadWrite => "write",
                    };
                    anyhow::bail!(
                        "store is locked for {mode_label} access; another process may be using {}",
                        path.display()
                    );
                }
                Err(_) => {
                    sleep(Duration::from_millis(50));
                }
            }
        }
    }

    fn create_schema(conn: &Connection, catalog: &Catalog) -> Result<()> {
        let fts_columns = catalog.fts_columns().join(", ");
        let batch = format!(
            "CREATE TABLE IF NOT EXISTS meta (\n  key TEXT PRIMARY KEY,\n  value TEXT\n);\n\nCREATE TABLE IF NOT EXISTS page (\n  rowid INTEGER PRIMARY KEY,\n  id TEXT UNIQUE,\n  indexed_at TEXT\n);\n\nCREATE TABLE IF NOT EXISTS page_value (\n  page_id TEXT,\n  field TEXT,\n  ord INTEGER,\n  value TEXT\n);\n\nCREATE TABLE IF NOT EXISTS page_exact (\n  page_id TEXT,\n  subfield TEXT,\n  norm TEXT\n);\n\nCREATE INDEX IF NOT EXISTS idx_page_value_page ON page_value(page_id);\nCREATE INDEX IF NOT EXISTS idx_page_exact_page ON page_exact(page_id);\nCREATE INDEX IF NOT EXISTS idx_page_exact_lookup ON page_exact(subfield, norm);\n\nCREATE VIRTUAL TABLE IF NOT EXISTS page_fts USING fts5({fts_columns}, tokenize = 'unicode61 remove_diacritics 0');"
        );
        conn.execute_batch(&batch).context("create schema")?;
        Ok(())
    }

    pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("set meta")?;
        Ok(())
    }

    pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key=?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .context("read meta")?;
        Ok(value)
    }

    fn schema_version(conn: &Connection) -> Result<i64> {
        if !Self::table_exists(conn, "meta")? {
            return Ok(0);
        }
        let value = Self::get_meta(conn, "schema_version")?;
        Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0))
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get(0),
            )
            .context("check table")?;
        Ok(count > 0)
    }

    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM page_fts", [])
            .context("clear fts")?;
        self.conn
            .execute("DELETE FROM page", [])
            .context("clear pages")?;
        self.conn
            .execute("DELETE FROM page_value", [])
            .context("clear values")?;
        self.conn
            .execute("DELETE FROM page_exact", [])
            .context("clear exact postings")?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let page_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM page", [], |row| row.get(0))
            .context("count pages")?;
        let value_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM page_value", [], |row| row.get(0))
            .context("count values")?;
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            page_count,
            value_count,
            db_size_bytes,
        })
    }

    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let status: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .context("integrity_check")?;
        let stats = self.stats()?;
        Ok(IntegrityReport { status, stats })
    }

    pub fn consistency_report(&self) -> Result<ConsistencyReport> {
        let page_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM page", [], |row| row.get(0))
            .context("count pages")?;
        let fts_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM page_fts", [], |row| row.get(0))
            .context("count fts")?;
        let fts_missing: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*)\n                 FROM page\n                 LEFT JOIN page_fts ON page_fts.rowid = page.rowid\n                 WHERE page_fts.rowid IS NULL",
                [],
                |row| row.get(0),
            )
            .context("fts missing")?;
        let orphan_values: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*)\n                 FROM page_value\n                 LEFT JOIN page ON page.id = page_value.page_id\n                 WHERE page.id IS NULL",
                [],
                |row| row.get(0),
            )
            .context("orphan values")?;
        let orphan_exact: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*)\n                 FROM page_exact\n                 LEFT JOIN page ON page.id = page_exact.page_id\n                 WHERE page.id IS NULL",
                [],
                |row| row.get(0),
            )
            .context("orphan exact postings")?;
        Ok(ConsistencyReport {
            page_count,
            fts_count,
            fts_missing,
            orphan_values,
            orphan_exact,
        })
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let path = lock.path.clone();
            let mode = lock.mode;
            drop(lock);
            if matches!(mode, StoreMode::ReadWrite) {
                let _ = fs::remove_file(path);
            }
        }
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
