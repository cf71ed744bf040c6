//! Job repository — CRUD operations for the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub progress: u8,
    pub parameters: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_type: row.get("job_type")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            parameters: row.get("parameters")?,
            result: row.get("result")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    /// Restrict to these statuses; empty means all.
    pub statuses: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row. Fails if the id already exists.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, job_type, status, progress, parameters, result, error,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.job_type,
                job.status,
                job.progress,
                job.parameters,
                job.result,
                job.error,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Updates the mutable fields of an existing job row. `id`, `job_type`,
/// `parameters` and `created_at` are immutable after creation.
pub fn update(db: &Database, job: &JobRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE jobs SET status=?2, progress=?3, result=?4, error=?5, updated_at=?6
             WHERE id=?1",
            params![
                job.id,
                job.status,
                job.progress,
                job.result,
                job.error,
                job.updated_at,
            ],
        )?;
        Ok(rows > 0)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries jobs newest-created-first, optionally filtered by status set.
pub fn query(db: &Database, filter: &JobFilter) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        let where_clause = if filter.statuses.is_empty() {
            String::new()
        } else {
            let placeholders: Vec<String> = filter
                .statuses
                .iter()
                .map(|s| {
                    param_values.push(Box::new(s.clone()));
                    format!("?{}", param_values.len())
                })
                .collect();
            format!("WHERE status IN ({})", placeholders.join(", "))
        };

        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    })
}

/// Atomically claims a queued job for execution (queued -> running).
///
/// This is the compare-and-swap that guarantees single-claim dispatch:
/// exactly one caller observes `true` for a given job.
pub fn claim(db: &Database, id: &str, updated_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE jobs SET status = 'running', updated_at = ?2
             WHERE id = ?1 AND status = 'queued'",
            params![id, updated_at],
        )?;
        Ok(rows == 1)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Deletes a job row. Returns the number of rows removed (0 or 1).
pub fn delete(db: &Database, id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(rows as u64)
    })
}

/// Deletes all jobs whose status is in the given set. Returns the number
/// of rows removed.
pub fn delete_where_status(db: &Database, statuses: &[String]) -> Result<u64, DatabaseError> {
    if statuses.is_empty() {
        return Ok(0);
    }
    db.with_conn(|conn| {
        let placeholders: Vec<String> = (1..=statuses.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "DELETE FROM jobs WHERE status IN ({})",
            placeholders.join(", ")
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> = statuses
            .iter()
            .map(|s| s as &dyn rusqlite::types::ToSql)
            .collect();
        let rows = conn.execute(&sql, params_ref.as_slice())?;
        Ok(rows as u64)
    })
}
