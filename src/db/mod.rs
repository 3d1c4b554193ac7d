mod export;
mod schema;

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use export::{ExportFormat, ExportRow};

/// Code type stored when decoded content carries no `[label]` prefix.
pub const UNKNOWN_CODE_TYPE: &str = "unknown";

pub const BACKUP_DIR_NAME: &str = "backups";
const DEFAULT_STORE_STEM: &str = "qrcode_history";
const DEFAULT_STORE_EXTENSION: &str = "db";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("schema migration failed while {step}: {source}")]
    Migration {
        step: String,
        source: rusqlite::Error,
    },
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to store an empty decode result")]
    EmptyContent,
    #[error("batch stopped after {} of {total} ids: {source}", .applied.len())]
    Batch {
        applied: Vec<i64>,
        total: usize,
        source: rusqlite::Error,
    },
    #[error("in-memory store has no backup location")]
    NoBackupLocation,
    #[error("database lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: String,
    pub content: String,
    /// Empty for clipboard captures, which are never written to disk.
    pub image_path: String,
    pub code_type: String,
    pub is_favorite: bool,
}

impl HistoryRecord {
    pub fn has_image_file(&self) -> bool {
        !self.image_path.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInfo {
    pub version: String,
    pub created_at: String,
}

/// Result of a multi-id mutation. Ids that matched no row land in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: Vec<i64>,
    pub skipped: Vec<i64>,
}

/// What initialization had to change to bring the schema up to date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub created_table: bool,
    pub added_columns: Vec<&'static str>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        !self.created_table && self.added_columns.is_empty()
    }
}

pub struct HistoryStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
    migration: MigrationReport,
}

const HISTORY_COLUMNS: &str = "
    id,
    COALESCE(CAST(timestamp AS TEXT), ''),
    COALESCE(content, ''),
    COALESCE(image_path, ''),
    COALESCE(code_type, 'unknown'),
    COALESCE(is_favorite, 0)
";

const TOGGLE_FAVORITE_SQL: &str = "
    UPDATE history
    SET is_favorite = CASE WHEN COALESCE(is_favorite, 0) = 0 THEN 1 ELSE 0 END
    WHERE id = ?1
";

const DELETE_RECORD_SQL: &str = "DELETE FROM history WHERE id = ?1";

impl HistoryStore {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let migration = Self::initialize(&conn)?;
        info!(path = %path.display(), "history store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
            migration,
        })
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let migration = Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
            migration,
        })
    }

    fn initialize(conn: &Connection) -> Result<MigrationReport, DbError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let report = ensure_history_schema(conn)?;

        conn.execute_batch(schema::CREATE_DB_INFO_TABLE)?;
        conn.execute_batch(schema::CREATE_INDEX_FAVORITE_TIMESTAMP)?;

        conn.execute(
            "INSERT OR IGNORE INTO db_info (key, value) VALUES ('version', ?1)",
            params![schema::SCHEMA_VERSION],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO db_info (key, value) VALUES ('created_at', ?1)",
            params![Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()],
        )?;

        Ok(report)
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    pub fn record_decode(&self, content: &str, image_path: &str) -> Result<HistoryRecord, DbError> {
        if content.is_empty() {
            return Err(DbError::EmptyContent);
        }

        let code_type = extract_code_type(content);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO history (content, image_path, code_type, is_favorite) VALUES (?1, ?2, ?3, 0)",
            params![content, image_path, code_type],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, code_type, "recorded decode");
        Ok(get_record(&conn, id)?)
    }

    pub fn get(&self, id: i64) -> Result<Option<HistoryRecord>, DbError> {
        let conn = self.conn()?;
        get_record(&conn, id).optional().map_err(DbError::from)
    }

    /// Every record, favorites first and newest first within each group.
    pub fn list_all(&self) -> Result<Vec<HistoryRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "
            SELECT {HISTORY_COLUMNS}
            FROM history
            ORDER BY is_favorite DESC, timestamp DESC, id DESC
            "
        ))?;
        let rows = stmt.query_map([], record_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Flips the favorite flag of each id. Each flip commits on its own: if a
    /// statement fails, earlier flips stay applied and are listed in
    /// [`DbError::Batch`].
    pub fn toggle_favorite(&self, ids: &[i64]) -> Result<BatchOutcome, DbError> {
        self.apply_batch(ids, TOGGLE_FAVORITE_SQL)
    }

    /// Permanently removes each id. Same partial-application policy as
    /// [`HistoryStore::toggle_favorite`].
    pub fn delete_records(&self, ids: &[i64]) -> Result<BatchOutcome, DbError> {
        self.apply_batch(ids, DELETE_RECORD_SQL)
    }

    fn apply_batch(&self, ids: &[i64], sql: &str) -> Result<BatchOutcome, DbError> {
        let unique: BTreeSet<i64> = ids.iter().copied().collect();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut outcome = BatchOutcome::default();

        for id in &unique {
            match stmt.execute(params![id]) {
                Ok(0) => outcome.skipped.push(*id),
                Ok(_) => outcome.applied.push(*id),
                Err(source) => {
                    warn!(
                        failed_id = id,
                        applied = ?outcome.applied,
                        "batch stopped partway, applied changes are kept"
                    );
                    return Err(DbError::Batch {
                        applied: outcome.applied,
                        total: unique.len(),
                        source,
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Rows in insertion-time order (oldest first), as written by exports.
    pub fn export_rows(&self) -> Result<Vec<ExportRow>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "
            SELECT
                COALESCE(CAST(timestamp AS TEXT), ''),
                COALESCE(content, ''),
                COALESCE(code_type, 'unknown')
            FROM history
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ExportRow {
                timestamp: row.get(0)?,
                content: row.get(1)?,
                code_type: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn export_all(&self, format: ExportFormat) -> Result<Vec<u8>, DbError> {
        let rows = self.export_rows()?;
        export::render(format, &rows)
    }

    /// Writes an export to `dest` and returns how many records it holds.
    pub fn export_to_path(&self, format: ExportFormat, dest: &Path) -> Result<usize, DbError> {
        let rows = self.export_rows()?;
        let bytes = export::render(format, &rows)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, bytes)?;
        info!(path = %dest.display(), %format, records = rows.len(), "history exported");
        Ok(rows.len())
    }

    pub fn default_backup_dir(&self) -> Option<PathBuf> {
        self.location
            .as_deref()
            .map(|path| path.parent().unwrap_or(Path::new("")).join(BACKUP_DIR_NAME))
    }

    /// Snapshots the store into the `backups` directory next to the file.
    pub fn backup(&self) -> Result<PathBuf, DbError> {
        let dir = self.default_backup_dir().ok_or(DbError::NoBackupLocation)?;
        self.backup_into(&dir)
    }

    /// Snapshots the store into `dir` through the SQLite online backup API,
    /// so concurrent readers never see a torn copy.
    pub fn backup_into(&self, dir: &Path) -> Result<PathBuf, DbError> {
        fs::create_dir_all(dir)?;
        let now = Local::now();
        let mut attempt = 0;
        let target = loop {
            let candidate = dir.join(self.backup_file_name(now, attempt));
            if !candidate.exists() {
                break candidate;
            }
            attempt += 1;
        };
        let conn = self.conn()?;
        conn.backup(DatabaseName::Main, &target, None)?;
        info!(path = %target.display(), "history store backed up");
        Ok(target)
    }

    /// `<stem>_<YYYYmmdd_HHMMSS>.<ext>`, with `_<attempt>` appended after the
    /// timestamp when an earlier snapshot already took that second.
    fn backup_file_name(&self, at: DateTime<Local>, attempt: u32) -> String {
        let stem = self
            .location
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_STORE_STEM.to_string());
        let extension = self
            .location
            .as_deref()
            .and_then(Path::extension)
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_STORE_EXTENSION.to_string());
        let stamp = at.format("%Y%m%d_%H%M%S");
        if attempt == 0 {
            format!("{stem}_{stamp}.{extension}")
        } else {
            format!("{stem}_{stamp}_{attempt}.{extension}")
        }
    }

    /// Reclaims free pages and refreshes planner statistics.
    pub fn optimize(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch("VACUUM; ANALYZE;")?;
        info!("history store optimized");
        Ok(())
    }

    pub fn db_info(&self) -> Result<DbInfo, DbError> {
        let conn = self.conn()?;
        let value = |key: &str| {
            conn.query_row(
                "SELECT COALESCE(value, '') FROM db_info WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
        };
        Ok(DbInfo {
            version: value("version")?,
            created_at: value("created_at")?,
        })
    }

    pub fn close(self) -> Result<(), DbError> {
        let conn = self.conn.into_inner().map_err(|_| DbError::LockPoisoned)?;
        conn.close().map_err(|(_, err)| DbError::Sql(err))
    }
}

/// The label between a leading `[` and the first `]`, or [`UNKNOWN_CODE_TYPE`]
/// when the content does not start with `[`.
pub fn extract_code_type(content: &str) -> &str {
    match content.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => UNKNOWN_CODE_TYPE,
    }
}

fn get_record(conn: &Connection, id: i64) -> Result<HistoryRecord, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {HISTORY_COLUMNS} FROM history WHERE id = ?1"),
        params![id],
        record_from_row,
    )
}

fn record_from_row(row: &Row<'_>) -> Result<HistoryRecord, rusqlite::Error> {
    Ok(HistoryRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        content: row.get(2)?,
        image_path: row.get(3)?,
        code_type: row.get(4)?,
        is_favorite: row.get::<_, i64>(5)? != 0,
    })
}

fn ensure_history_schema(conn: &Connection) -> Result<MigrationReport, DbError> {
    let table: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'history'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if table.is_none() {
        conn.execute_batch(schema::CREATE_HISTORY_TABLE)
            .map_err(|source| DbError::Migration {
                step: "creating history table".to_string(),
                source,
            })?;
        return Ok(MigrationReport {
            created_table: true,
            added_columns: Vec::new(),
        });
    }

    let columns = history_columns(conn)?;
    let missing: Vec<(&'static str, &'static str)> = schema::LATE_HISTORY_COLUMNS
        .iter()
        .copied()
        .filter(|(name, _)| !columns.contains(*name))
        .collect();

    if missing.is_empty() {
        return Ok(MigrationReport::default());
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|source| DbError::Migration {
            step: "starting migration transaction".to_string(),
            source,
        })?;

    let mut added_columns = Vec::with_capacity(missing.len());
    for (name, ddl) in missing {
        tx.execute_batch(ddl).map_err(|source| DbError::Migration {
            step: format!("adding column {name}"),
            source,
        })?;
        added_columns.push(name);
    }

    if added_columns.contains(&"code_type") {
        let backfilled = backfill_code_types(&tx).map_err(|source| DbError::Migration {
            step: "backfilling code_type".to_string(),
            source,
        })?;
        debug!(rows = backfilled, "backfilled code_type for legacy rows");
    }

    tx.commit().map_err(|source| DbError::Migration {
        step: "committing migration".to_string(),
        source,
    })?;

    info!(columns = ?added_columns, "migrated legacy history table");
    Ok(MigrationReport {
        created_table: false,
        added_columns,
    })
}

fn history_columns(conn: &Connection) -> Result<HashSet<String>, DbError> {
    let mut columns = HashSet::new();
    let mut stmt = conn.prepare("PRAGMA table_info(history)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        columns.insert(row?);
    }
    Ok(columns)
}

fn backfill_code_types(conn: &Connection) -> Result<usize, rusqlite::Error> {
    let pending = {
        let mut stmt =
            conn.prepare("SELECT id, COALESCE(content, '') FROM history WHERE code_type IS NULL")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    for (id, content) in &pending {
        conn.execute(
            "UPDATE history SET code_type = ?1 WHERE id = ?2",
            params![extract_code_type(content), id],
        )?;
    }

    Ok(pending.len())
}
