//! SQLite store built on `sqlx`.
//!
//! Timestamps are stored as microseconds since the Unix epoch so that range
//! queries compare integers. Status changes run as
//! `UPDATE ... WHERE status = ?` and inspect `rows_affected` to detect races.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use tracing::{info, warn};

use sclip_models::{
    Account, AccountId, Clip, ClipId, Job, JobId, JobStatus, PlanTier, Role, SourceId,
};

use crate::error::{StoreError, StoreResult};
use crate::{DeletedJob, JobStore, StoreStats};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        plan TEXT NOT NULL DEFAULT 'free',
        role TEXT NOT NULL DEFAULT 'user',
        created_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        source_locator TEXT NOT NULL,
        source_id TEXT NOT NULL,
        title TEXT,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_account_created ON jobs(account_id, created_at)",
    r#"CREATE TABLE IF NOT EXISTS clips (
        id TEXT PRIMARY KEY,
        job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        file_path TEXT NOT NULL,
        thumbnail_path TEXT,
        start_time REAL NOT NULL,
        end_time REAL NOT NULL,
        duration REAL NOT NULL,
        created_at INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_clips_job ON clips(job_id)",
];

const JOB_COLUMNS: &str =
    "id, account_id, source_locator, source_id, title, status, error_message, created_at, updated_at";

const CLIP_COLUMNS: &str =
    "id, job_id, title, file_path, thumbnail_path, start_time, end_time, duration, created_at";

const NON_TERMINAL: &str = "('queued', 'downloading', 'processing')";

/// Error message for jobs whose task died with the previous process.
pub const INTERRUPTED_MESSAGE: &str = "Processing was interrupted by a server restart";

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(micros: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::corrupt(format!("timestamp out of range: {}", micros)))
}

fn parse_status(s: &str) -> StoreResult<JobStatus> {
    JobStatus::parse(s).ok_or_else(|| StoreError::corrupt(format!("unknown job status: {}", s)))
}

fn account_from_row(row: &SqliteRow) -> StoreResult<Account> {
    Ok(Account {
        id: AccountId::new(row.try_get::<String, _>("id")?),
        email: row.try_get("email")?,
        plan: PlanTier::parse_lossy(&row.try_get::<String, _>("plan")?),
        role: Role::parse_lossy(&row.try_get::<String, _>("role")?),
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}

fn job_from_row(row: &SqliteRow) -> StoreResult<Job> {
    Ok(Job {
        id: JobId::from_string(row.try_get::<String, _>("id")?),
        account_id: AccountId::new(row.try_get::<String, _>("account_id")?),
        source_locator: row.try_get("source_locator")?,
        source_id: SourceId::from_string(row.try_get::<String, _>("source_id")?),
        title: row.try_get("title")?,
        status: parse_status(&row.try_get::<String, _>("status")?)?,
        error_message: row.try_get("error_message")?,
        created_at: from_micros(row.try_get("created_at")?)?,
        updated_at: from_micros(row.try_get("updated_at")?)?,
    })
}

fn clip_from_row(row: &SqliteRow) -> StoreResult<Clip> {
    Ok(Clip {
        id: ClipId::from_string(row.try_get::<String, _>("id")?),
        job_id: JobId::from_string(row.try_get::<String, _>("job_id")?),
        title: row.try_get("title")?,
        file_path: row.try_get("file_path")?,
        thumbnail_path: row.try_get("thumbnail_path")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        duration: row.try_get("duration")?,
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}

/// Write `failed` over `previous`, or explain why the row did not match.
async fn mark_failed(
    conn: &mut SqliteConnection,
    id: &JobId,
    previous: JobStatus,
    message: &str,
) -> StoreResult<()> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'failed', error_message = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(message)
    .bind(to_micros(Utc::now()))
    .bind(id.as_str())
    .bind(previous.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let actual: Option<String> = sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match actual {
            Some(actual) => StoreError::Conflict {
                expected: previous,
                actual: parse_status(&actual)?,
            },
            None => StoreError::not_found(format!("job {}", id)),
        });
    }
    Ok(())
}

/// [`JobStore`] backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite://shortclip.db` or `sqlite::memory:`),
    /// create the schema if needed and fail jobs left running by a previous
    /// process.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection is its own database.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;

        let interrupted = store.fail_interrupted_jobs().await?;
        if interrupted > 0 {
            warn!(interrupted, "Marked jobs left running by a previous process as failed");
        }

        info!(url, "Connected to SQLite store");
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Job tasks live in-process, so non-terminal rows at start-up have no task.
    async fn fail_interrupted_jobs(&self) -> StoreResult<u64> {
        let result = sqlx::query(&format!(
            "UPDATE jobs SET status = 'failed', error_message = ?, updated_at = ? WHERE status IN {}",
            NON_TERMINAL
        ))
        .bind(INTERRUPTED_MESSAGE)
        .bind(to_micros(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn current_status(&self, id: &JobId) -> StoreResult<Option<JobStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        status.map(|s| parse_status(&s)).transpose()
    }

    /// Explain why a guarded update touched no rows.
    async fn miss(&self, id: &JobId, expected: JobStatus) -> StoreError {
        match self.current_status(id).await {
            Ok(None) => StoreError::not_found(format!("job {}", id)),
            Ok(Some(actual)) => StoreError::Conflict { expected, actual },
            Err(e) => e,
        }
    }

    async fn count(&self, sql: &str) -> StoreResult<u64> {
        let n: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(n as u64)
    }

    async fn group_counts(&self, sql: &str) -> StoreResult<std::collections::BTreeMap<String, u64>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let key: String = row.try_get(0)?;
                let n: i64 = row.try_get(1)?;
                Ok((key, n as u64))
            })
            .collect()
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn get_account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        sqlx::query("SELECT id, email, plan, role, created_at FROM accounts WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(account_from_row)
            .transpose()
    }

    async fn upsert_account(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO accounts (id, email, plan, role, created_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET email = excluded.email, plan = excluded.plan, role = excluded.role"#,
        )
        .bind(account.id.as_str())
        .bind(&account.email)
        .bind(account.plan.as_str())
        .bind(account.role.as_str())
        .bind(to_micros(account.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_jobs_since(&self, account: &AccountId, since: DateTime<Utc>) -> StoreResult<u32> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE account_id = ? AND created_at >= ?")
            .bind(account.as_str())
            .bind(to_micros(since))
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u32)
    }

    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO jobs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            JOB_COLUMNS
        ))
        .bind(job.id.as_str())
        .bind(job.account_id.as_str())
        .bind(&job.source_locator)
        .bind(job.source_id.as_str())
        .bind(&job.title)
        .bind(job.status.as_str())
        .bind(&job.error_message)
        .bind(to_micros(job.created_at))
        .bind(to_micros(job.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(job_from_row)
            .transpose()
    }

    async fn list_jobs(&self, account: &AccountId) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE account_id = ? ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .bind(account.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn set_title(&self, id: &JobId, title: &str) -> StoreResult<()> {
        let result = sqlx::query(&format!(
            "UPDATE jobs SET title = ?, updated_at = ? WHERE id = ? AND status IN {}",
            NON_TERMINAL
        ))
        .bind(title)
        .bind(to_micros(Utc::now()))
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.current_status(id).await? {
                Some(status) => StoreError::Terminal(status),
                None => StoreError::not_found(format!("job {}", id)),
            });
        }
        Ok(())
    }

    async fn transition(&self, id: &JobId, from: JobStatus, to: JobStatus) -> StoreResult<()> {
        from.transition(to)?;

        let result = sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(to_micros(Utc::now()))
            .bind(id.as_str())
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.miss(id, from).await);
        }
        Ok(())
    }

    async fn fail_job(&self, id: &JobId, message: &str) -> StoreResult<JobStatus> {
        let mut tx = self.pool.begin().await?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let previous = match status {
            Some(s) => parse_status(&s)?,
            None => return Err(StoreError::not_found(format!("job {}", id))),
        };
        previous
            .transition(JobStatus::Failed)
            .map_err(|_| StoreError::Terminal(previous))?;

        mark_failed(&mut *tx, id, previous, message).await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn complete_job(&self, id: &JobId, clips: &[Clip]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE jobs SET status = 'completed', updated_at = ? WHERE id = ? AND status = 'processing'",
        )
        .bind(to_micros(Utc::now()))
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.miss(id, JobStatus::Processing).await);
        }

        for clip in clips {
            sqlx::query(&format!(
                "INSERT INTO clips ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                CLIP_COLUMNS
            ))
            .bind(clip.id.as_str())
            .bind(clip.job_id.as_str())
            .bind(&clip.title)
            .bind(&clip.file_path)
            .bind(&clip.thumbnail_path)
            .bind(clip.start_time)
            .bind(clip.end_time)
            .bind(clip.duration)
            .bind(to_micros(clip.created_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_job(&self, id: &JobId) -> StoreResult<Option<DeletedJob>> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let job = job_from_row(&row)?;

        let clip_rows = sqlx::query(&format!(
            "SELECT {} FROM clips WHERE job_id = ? ORDER BY start_time",
            CLIP_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_all(&mut *tx)
        .await?;
        let clips = clip_rows.iter().map(clip_from_row).collect::<StoreResult<Vec<_>>>()?;

        sqlx::query("DELETE FROM clips WHERE job_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(DeletedJob { job, clips }))
    }

    async fn list_clips(&self, job: &JobId) -> StoreResult<Vec<Clip>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clips WHERE job_id = ? ORDER BY start_time",
            CLIP_COLUMNS
        ))
        .bind(job.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(clip_from_row).collect()
    }

    async fn count_clips(&self, job: &JobId) -> StoreResult<u32> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clips WHERE job_id = ?")
            .bind(job.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u32)
    }

    async fn list_account_clips(&self, account: &AccountId) -> StoreResult<Vec<Clip>> {
        let rows = sqlx::query(
            r#"SELECT c.id, c.job_id, c.title, c.file_path, c.thumbnail_path,
                      c.start_time, c.end_time, c.duration, c.created_at
               FROM clips c JOIN jobs j ON j.id = c.job_id
               WHERE j.account_id = ?
               ORDER BY c.created_at DESC, c.start_time"#,
        )
        .bind(account.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(clip_from_row).collect()
    }

    async fn get_clip(&self, id: &ClipId) -> StoreResult<Option<Clip>> {
        sqlx::query(&format!("SELECT {} FROM clips WHERE id = ?", CLIP_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(clip_from_row)
            .transpose()
    }

    async fn delete_clip(&self, id: &ClipId) -> StoreResult<Option<Clip>> {
        let row = sqlx::query(&format!(
            "DELETE FROM clips WHERE id = ? RETURNING {}",
            CLIP_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(clip_from_row).transpose()
    }

    async fn stats(&self, since: DateTime<Utc>) -> StoreResult<StoreStats> {
        let jobs_since: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE created_at >= ?")
            .bind(to_micros(since))
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            total_accounts: self.count("SELECT COUNT(*) FROM accounts").await?,
            total_jobs: self.count("SELECT COUNT(*) FROM jobs").await?,
            total_clips: self.count("SELECT COUNT(*) FROM clips").await?,
            accounts_by_plan: self
                .group_counts("SELECT plan, COUNT(*) FROM accounts GROUP BY plan")
                .await?,
            jobs_by_status: self
                .group_counts("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .await?,
            jobs_since: jobs_since as u64,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_accounts_round_trip() {
        contract::accounts_round_trip(&store().await).await;
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        contract::job_lifecycle(&store().await).await;
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        contract::compare_and_set(&store().await).await;
    }

    #[tokio::test]
    async fn test_fail_is_terminal() {
        contract::fail_is_terminal(&store().await).await;
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        contract::delete_cascades(&store().await).await;
    }

    #[tokio::test]
    async fn test_delete_single_clip() {
        contract::delete_single_clip(&store().await).await;
    }

    #[tokio::test]
    async fn test_listing_and_counts() {
        contract::listing_and_counts(&store().await).await;
    }

    #[tokio::test]
    async fn test_account_clips() {
        contract::account_clips(&store().await).await;
    }

    #[tokio::test]
    async fn test_insert_requires_account() {
        contract::insert_requires_account(&store().await).await;
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("shortclip.db").display());

        {
            let store = SqliteStore::connect(&url).await.unwrap();
            contract::seed_account(&store, "acct").await;
        }

        let reopened = SqliteStore::connect(&url).await.unwrap();
        assert!(reopened.get_account(&AccountId::new("acct")).await.unwrap().is_some());
        reopened.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_failure_write_is_a_conflict() {
        let store = store().await;
        let account = contract::seed_account(&store, "acct").await;
        let job = contract::new_job(&account);
        store.insert_job(&job).await.unwrap();
        store.transition(&job.id, JobStatus::Queued, JobStatus::Downloading).await.unwrap();

        {
            let mut conn = store.pool.acquire().await.unwrap();
            let err = mark_failed(&mut *conn, &job.id, JobStatus::Queued, "boom").await.unwrap_err();
            assert!(matches!(
                err,
                StoreError::Conflict { expected: JobStatus::Queued, actual: JobStatus::Downloading }
            ));

            let err = mark_failed(&mut *conn, &JobId::new(), JobStatus::Queued, "boom").await.unwrap_err();
            assert!(err.is_not_found());
        }

        let loaded = store.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Downloading);
        assert!(loaded.error_message.is_none());
    }

    #[tokio::test]
    async fn test_restart_fails_unfinished_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("shortclip.db").display());

        let (running, queued, done) = {
            let store = SqliteStore::connect(&url).await.unwrap();
            let account = contract::seed_account(&store, "acct").await;
            let running = contract::new_job(&account);
            let queued = contract::new_job(&account);
            let done = contract::new_job(&account);
            for job in [&running, &queued, &done] {
                store.insert_job(job).await.unwrap();
            }
            store.transition(&running.id, JobStatus::Queued, JobStatus::Downloading).await.unwrap();
            store.transition(&done.id, JobStatus::Queued, JobStatus::Downloading).await.unwrap();
            store.transition(&done.id, JobStatus::Downloading, JobStatus::Processing).await.unwrap();
            store.complete_job(&done.id, &[]).await.unwrap();
            (running.id, queued.id, done.id)
        };

        let reopened = SqliteStore::connect(&url).await.unwrap();
        for id in [&running, &queued] {
            let job = reopened.get_job(id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
        }
        let done = reopened.get_job(&done).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.error_message.is_none());
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let back = from_micros(to_micros(now)).unwrap();
        assert_eq!(back.timestamp_micros(), now.timestamp_micros());
    }
}
