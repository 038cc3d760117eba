//! Analysis job operations.

use crate::database::Database;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tubesum_core::{AnalysisJob, AnalysisStore, JobStatus, JobUpdate};

const SELECT_COLUMNS: &str = "SELECT id, source_url, video_id, metadata, subtitles, segments, status, error, created_at, updated_at FROM analyses";

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl Database {
    /// Insert a new analysis job.
    pub fn insert_analysis(&self, job: &AnalysisJob) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO analyses (id, source_url, video_id, metadata, subtitles, segments, status, error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                job.id,
                job.source_url,
                job.video_id,
                serde_json::to_string(&job.metadata)?,
                serde_json::to_string(&job.subtitles)?,
                serde_json::to_string(&job.segments)?,
                job.status.as_str(),
                job.error,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get an analysis job by ID.
    pub fn get_analysis(&self, id: &str) -> DbResult<AnalysisJob> {
        let conn = self.conn()?;
        fetch(&conn, id)?.ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))
    }

    /// Get a job by a unique ID prefix, as typed on the command line.
    pub fn get_analysis_by_prefix(&self, prefix: &str) -> DbResult<AnalysisJob> {
        let conn = self.conn()?;
        if let Some(job) = fetch(&conn, prefix)? {
            return Ok(job);
        }

        let mut stmt = conn.prepare(&format!("{} WHERE id LIKE ?1 LIMIT 2", SELECT_COLUMNS))?;
        let mut jobs = stmt
            .query_map(params![format!("{}%", prefix)], row_to_analysis)?
            .collect::<Result<Vec<_>, _>>()?;

        match jobs.len() {
            0 => Err(DbError::NotFound(format!("Job not found: {}", prefix))),
            1 => Ok(jobs.remove(0)),
            _ => Err(DbError::Other(format!(
                "Ambiguous ID prefix '{}': multiple jobs match",
                prefix
            ))),
        }
    }

    /// Most recent job for a video id.
    pub fn find_analysis_by_video(&self, video_id: &str) -> DbResult<Option<AnalysisJob>> {
        let conn = self.conn()?;
        let job = conn
            .query_row(
                &format!(
                    "{} WHERE video_id = ?1 ORDER BY created_at DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![video_id],
                row_to_analysis,
            )
            .optional()?;
        Ok(job)
    }

    /// List jobs, newest first.
    pub fn list_analyses(&self, limit: Option<i64>) -> DbResult<Vec<AnalysisJob>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY created_at DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit.unwrap_or(-1)], row_to_analysis)?;
        let jobs = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Get job counts by status.
    pub fn status_counts(&self) -> DbResult<StatusCounts> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM analyses GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, count) = row?;
            match JobStatus::from_str(&status) {
                Some(JobStatus::Processing) => counts.processing = count,
                Some(JobStatus::Completed) => counts.completed = count,
                Some(JobStatus::Failed) => counts.failed = count,
                None => {}
            }
        }
        Ok(counts)
    }
}

impl AnalysisStore for Database {
    fn create(&self, job: AnalysisJob) -> tubesum_core::Result<AnalysisJob> {
        self.insert_analysis(&job)?;
        Ok(job)
    }

    fn get(&self, id: &str) -> tubesum_core::Result<Option<AnalysisJob>> {
        let conn = self.conn()?;
        Ok(fetch(&conn, id)?)
    }

    fn find_by_video_id(&self, video_id: &str) -> tubesum_core::Result<Option<AnalysisJob>> {
        Ok(self.find_analysis_by_video(video_id)?)
    }

    fn list(&self) -> tubesum_core::Result<Vec<AnalysisJob>> {
        Ok(self.list_analyses(None)?)
    }

    fn update(&self, id: &str, update: JobUpdate) -> tubesum_core::Result<AnalysisJob> {
        let mut conn = self.conn()?;
        // IMMEDIATE takes the write lock up front so read-modify-write is atomic.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;

        let mut job =
            fetch(&tx, id)?.ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))?;
        job.apply(update)?;
        write_results(&tx, &job)?;

        tx.commit().map_err(DbError::from)?;
        Ok(job)
    }
}

fn fetch(conn: &Connection, id: &str) -> DbResult<Option<AnalysisJob>> {
    let job = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            row_to_analysis,
        )
        .optional()?;
    Ok(job)
}

fn write_results(conn: &Connection, job: &AnalysisJob) -> DbResult<()> {
    let rows = conn.execute(
        "UPDATE analyses SET subtitles = ?2, segments = ?3, status = ?4, error = ?5, updated_at = ?6 WHERE id = ?1",
        params![
            job.id,
            serde_json::to_string(&job.subtitles)?,
            serde_json::to_string(&job.segments)?,
            job.status.as_str(),
            job.error,
            job.updated_at.to_rfc3339(),
        ],
    )?;

    if rows == 0 {
        return Err(DbError::NotFound(format!("Job not found: {}", job.id)));
    }
    Ok(())
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_analysis(row: &rusqlite::Row) -> rusqlite::Result<AnalysisJob> {
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    Ok(AnalysisJob {
        id: row.get(0)?,
        source_url: row.get(1)?,
        video_id: row.get(2)?,
        metadata: json_column(row, 3)?,
        subtitles: json_column(row, 4)?,
        segments: json_column(row, 5)?,
        status: JobStatus::from_str(&status_str).unwrap_or(JobStatus::Failed),
        error: row.get(7)?,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}
