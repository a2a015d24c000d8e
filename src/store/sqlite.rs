use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{ResultStore, ScanRecord};
use crate::error::PersistenceError;
use crate::model::{Finding, PackageIdentity};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS vulnerability_scans (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        package_name    TEXT NOT NULL,
        ecosystem       TEXT NOT NULL,
        version         TEXT NOT NULL,
        vuln_id         TEXT NOT NULL,
        summary         TEXT,
        published       TEXT,
        severity_rating TEXT NOT NULL,
        fix_version     TEXT NOT NULL,
        raw_response    BLOB NOT NULL,
        created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX IF NOT EXISTS idx_vuln_scans_package
        ON vulnerability_scans(package_name, ecosystem, version);
";

/// SQLite-backed [`ResultStore`].
///
/// A single connection is shared behind a mutex; writes run on the blocking
/// thread pool, one transaction per outcome.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Directory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an existing database without creating it or its directory.
    ///
    /// Returns `Ok(None)` when nothing exists at `path`.
    pub fn open_if_exists(path: &Path) -> Result<Option<Self>, PersistenceError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::from_connection(Connection::open(path)?).map(Some)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Most recent records first.
    pub fn latest_scans(&self, limit: usize) -> Result<Vec<ScanRecord>, PersistenceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PersistenceError::Worker(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, package_name, ecosystem, version, vuln_id, summary, published,
                    severity_rating, fix_version, raw_response, created_at
             FROM vulnerability_scans
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![limit], |row| {
                Ok(ScanRecord {
                    id: Some(row.get(0)?),
                    package_name: row.get(1)?,
                    ecosystem: row.get(2)?,
                    version: row.get(3)?,
                    vuln_id: row.get(4)?,
                    summary: row.get(5)?,
                    published: row.get(6)?,
                    severity_rating: row.get(7)?,
                    fix_version: row.get(8)?,
                    raw_response: row.get(9)?,
                    created_at: Some(row.get(10)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn insert(conn: &mut Connection, records: &[ScanRecord]) -> Result<usize, PersistenceError> {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO vulnerability_scans (
                    package_name, ecosystem, version, vuln_id, summary,
                    published, severity_rating, fix_version, raw_response
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for record in records {
                stmt.execute(params![
                    record.package_name,
                    record.ecosystem,
                    record.version,
                    record.vuln_id,
                    record.summary,
                    record.published,
                    record.severity_rating,
                    record.fix_version,
                    record.raw_response,
                ])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn save(
        &self,
        identity: &PackageIdentity,
        findings: &[Finding],
        raw_response: &[u8],
    ) -> Result<usize, PersistenceError> {
        let records = ScanRecord::rows(identity, findings, raw_response);
        if records.is_empty() {
            return Ok(0);
        }

        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| PersistenceError::Worker(e.to_string()))?;
            Self::insert(&mut conn, &records)
        })
        .await
        .map_err(|e| PersistenceError::Worker(e.to_string()))?
    }
}
