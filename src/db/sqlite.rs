//! SQLite implementation of the metadata index.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::schema::{MIGRATIONS, SCHEMA};
use super::{FileRow, MetaRecord, NewFile};
use crate::error::Result;
use crate::ingest::ContentHash;

const FILE_COLUMNS: &str = "id, sum, name, added, taken, orient";

impl ToSql for ContentHash {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Blob(self.as_bytes())))
    }
}

impl FromSql for ContentHash {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        ContentHash::try_from(blob).map_err(|_| FromSqlError::InvalidBlobSize {
            expected_size: 32,
            blob_size: blob.len(),
        })
    }
}

/// True when `err` is a constraint violation, i.e. a second row for an
/// existing `sum`.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// The index owns a single connection. Statements are short, so callers
/// simply take turns on it.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        for migration in MIGRATIONS {
            let _ = conn.execute(migration, []);
        }
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a statement half-run.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // files
    // ========================================================================

    pub fn exists(&self, sum: &ContentHash) -> Result<bool> {
        let found = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM files WHERE sum = ?1)",
            [sum],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(found)
    }

    /// Insert a row and return its id. A second row for the same `sum`
    /// fails with a constraint violation (see [`is_unique_violation`]).
    pub fn insert(&self, file: &NewFile<'_>) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO files (sum, name, added, taken, orient, thumb)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                file.sum,
                file.name,
                file.added,
                file.taken,
                file.orient,
                file.thumb
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<FileRow>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1");
        let row = self.conn().query_row(&sql, [id], file_row).optional()?;
        Ok(row)
    }

    pub fn find_by_sum(&self, sum: &ContentHash) -> Result<Option<FileRow>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE sum = ?1");
        let row = self.conn().query_row(&sql, [sum], file_row).optional()?;
        Ok(row)
    }

    /// Rows newest-taken first. A `limit` of 0 returns everything after
    /// `offset`.
    pub fn list(&self, limit: u32, offset: u32) -> Result<Vec<FileRow>> {
        let limit: i64 = if limit == 0 { -1 } else { limit.into() };
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             ORDER BY taken DESC, added DESC, id DESC
             LIMIT ?1 OFFSET ?2"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit, offset], file_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Rows with `start <= taken <= end`, same ordering as [`list`](Self::list).
    pub fn list_between(&self, start: i64, end: i64) -> Result<Vec<FileRow>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE taken >= ?1 AND taken <= ?2
             ORDER BY taken DESC, added DESC, id DESC"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![start, end], file_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<u64> {
        let n = self
            .conn()
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get::<_, i64>(0))?;
        Ok(n.max(0) as u64)
    }

    /// The stored thumbnail, empty when none was recorded. `None` when the
    /// row does not exist.
    pub fn thumb_of(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let thumb = self
            .conn()
            .query_row("SELECT thumb FROM files WHERE id = ?1", [id], |row| {
                row.get::<_, Option<Vec<u8>>>(0)
            })
            .optional()?;
        Ok(thumb.map(Option::unwrap_or_default))
    }

    /// Replace the derived thumbnail and orientation. Returns false when the
    /// row does not exist.
    pub fn set_thumb(&self, id: i64, orient: u8, thumb: Option<&[u8]>) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE files SET orient = ?1, thumb = ?2 WHERE id = ?3",
            params![orient, thumb, id],
        )?;
        Ok(updated > 0)
    }

    /// Remove the `files` row. The append-only `meta` history stays.
    /// Returns false when the row did not exist.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.conn().execute("DELETE FROM files WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    // ========================================================================
    // meta
    // ========================================================================

    pub fn append_meta(&self, id: i64, time: i64, field: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO meta (id, time, field, value) VALUES (?1, ?2, ?3, ?4)",
            params![id, time, field, value],
        )?;
        Ok(())
    }

    /// The most recent value for `field`. Rows sharing a timestamp resolve to
    /// the one inserted last.
    pub fn latest_meta(&self, id: i64, field: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                r#"
                SELECT value FROM meta
                WHERE id = ?1 AND field = ?2
                ORDER BY time DESC, rowid DESC
                LIMIT 1
                "#,
                params![id, field],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    /// Every value recorded for `field`, newest first.
    pub fn meta_history(&self, id: i64, field: &str) -> Result<Vec<MetaRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT time, value FROM meta
            WHERE id = ?1 AND field = ?2
            ORDER BY time DESC, rowid DESC
            "#,
        )?;
        let records = stmt
            .query_map(params![id, field], |row| {
                Ok(MetaRecord {
                    time: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                    value: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

fn file_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    let orient = row.get::<_, Option<i64>>(5)?.unwrap_or(0);
    Ok(FileRow {
        id: row.get(0)?,
        sum: row.get(1)?,
        name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        added: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        taken: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        orient: if (1..=8).contains(&orient) { orient as u8 } else { 0 },
    })
}
