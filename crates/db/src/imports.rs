use rusqlite::{OptionalExtension, params};
use usage_core::{ImportCounts, ImportMode, ImportRun, ImportStatus};

use crate::Db;
use crate::error::{DbError, Result};
use crate::helpers::{IMPORT_COLUMNS, row_to_import_run};
use crate::types::RunCompletion;

impl Db {
    pub fn create_import_run(
        &self,
        mode: ImportMode,
        from_timestamp: Option<&str>,
        to_timestamp: &str,
        started_at: &str,
    ) -> Result<ImportRun> {
        self.conn.execute(
            r#"
            INSERT INTO imports (started_at, mode, from_timestamp, to_timestamp, status)
            VALUES (?1, ?2, ?3, ?4, 'running')
            "#,
            params![started_at, mode.as_str(), from_timestamp, to_timestamp],
        )?;
        Ok(ImportRun {
            id: self.conn.last_insert_rowid(),
            started_at: started_at.to_string(),
            finished_at: None,
            mode,
            from_timestamp: from_timestamp.map(str::to_string),
            to_timestamp: to_timestamp.to_string(),
            status: ImportStatus::Running,
            error_message: None,
        })
    }

    /// Moves a running import to its terminal status and returns the stored row.
    pub fn complete_import_run(&self, id: i64, completion: &RunCompletion) -> Result<ImportRun> {
        let status: ImportStatus = completion.status.into();
        let updated = self.conn.execute(
            r#"
            UPDATE imports
            SET finished_at = ?1, status = ?2, error_message = ?3
            WHERE id = ?4 AND status = 'running'
            "#,
            params![
                completion.finished_at,
                status.as_str(),
                completion.error_message,
                id
            ],
        )?;
        if updated == 0 {
            return Err(DbError::RunNotRunning(id));
        }
        self.get_import_run(id)?.ok_or(DbError::RunNotRunning(id))
    }

    pub fn get_import_run(&self, id: i64) -> Result<Option<ImportRun>> {
        let sql = format!("SELECT {IMPORT_COLUMNS} FROM imports WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], row_to_import_run)
            .optional()?)
    }

    pub fn get_last_successful_import(&self) -> Result<Option<ImportRun>> {
        let sql = format!(
            "SELECT {IMPORT_COLUMNS} FROM imports WHERE status = 'success' \
             ORDER BY finished_at DESC, id DESC LIMIT 1"
        );
        Ok(self.conn.query_row(&sql, [], row_to_import_run).optional()?)
    }

    pub fn get_latest_import(&self) -> Result<Option<ImportRun>> {
        let sql = format!(
            "SELECT {IMPORT_COLUMNS} FROM imports ORDER BY started_at DESC, id DESC LIMIT 1"
        );
        Ok(self.conn.query_row(&sql, [], row_to_import_run).optional()?)
    }

    pub fn get_import_history(&self, limit: u32) -> Result<Vec<ImportRun>> {
        let sql = format!(
            "SELECT {IMPORT_COLUMNS} FROM imports ORDER BY started_at DESC, id DESC LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], row_to_import_run)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_counts(&self) -> Result<ImportCounts> {
        let metrics: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM langfuse_daily_metrics", [], |row| {
                    row.get(0)
                })?;
        let requests: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM langfuse_requests", [], |row| row.get(0))?;
        Ok(ImportCounts {
            metrics: metrics.max(0) as u64,
            requests: requests.max(0) as u64,
        })
    }
}
