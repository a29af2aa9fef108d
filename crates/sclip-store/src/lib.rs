//! Persistence for accounts, jobs and clips.
//!
//! [`JobStore`] is the seam the pipeline and the HTTP layer share. Status
//! changes go through compare-and-set operations so that a job's transitions
//! stay monotonic even if a writer races a deletion.
//!
//! - [`SqliteStore`]: production store on top of `sqlx`
//! - [`MemoryStore`]: same semantics in memory, with per-job status history

pub mod error;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use sclip_models::{Account, AccountId, Clip, ClipId, Job, JobId, JobStatus};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A job removed by [`JobStore::delete_job`], with the clips that cascaded.
#[derive(Debug, Clone)]
pub struct DeletedJob {
    pub job: Job,
    pub clips: Vec<Clip>,
}

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_accounts: u64,
    pub total_jobs: u64,
    pub total_clips: u64,
    pub accounts_by_plan: BTreeMap<String, u64>,
    pub jobs_by_status: BTreeMap<String, u64>,
    pub jobs_since: u64,
}

/// Storage operations for the clip pipeline.
#[async_trait]
pub trait JobStore: Send + Sync {
    // Accounts

    async fn get_account(&self, id: &AccountId) -> StoreResult<Option<Account>>;

    async fn upsert_account(&self, account: &Account) -> StoreResult<()>;

    /// Jobs created by `account` at or after `since`.
    async fn count_jobs_since(&self, account: &AccountId, since: DateTime<Utc>) -> StoreResult<u32>;

    // Jobs

    /// Insert a new job. The owning account must exist.
    async fn insert_job(&self, job: &Job) -> StoreResult<()>;

    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// The account's jobs, newest first.
    async fn list_jobs(&self, account: &AccountId) -> StoreResult<Vec<Job>>;

    /// Record the title of a job that is still in flight. Fails with
    /// `Terminal` once the job has finished.
    async fn set_title(&self, id: &JobId, title: &str) -> StoreResult<()>;

    /// Compare-and-set `from -> to`. Fails with `NotFound` if the job is gone
    /// and `Conflict` if its status is no longer `from`.
    async fn transition(&self, id: &JobId, from: JobStatus, to: JobStatus) -> StoreResult<()>;

    /// Move a non-terminal job to `failed` with a reason, returning the
    /// status it left. Fails with `Terminal` if the job already finished.
    async fn fail_job(&self, id: &JobId, message: &str) -> StoreResult<JobStatus>;

    /// Atomically insert `clips` and move the job `processing -> completed`.
    async fn complete_job(&self, id: &JobId, clips: &[Clip]) -> StoreResult<()>;

    /// Delete a job and its clips. `None` if it did not exist.
    async fn delete_job(&self, id: &JobId) -> StoreResult<Option<DeletedJob>>;

    // Clips

    /// Clips of a job in playback order.
    async fn list_clips(&self, job: &JobId) -> StoreResult<Vec<Clip>>;

    async fn count_clips(&self, job: &JobId) -> StoreResult<u32>;

    /// Every clip across the account's jobs, newest first.
    async fn list_account_clips(&self, account: &AccountId) -> StoreResult<Vec<Clip>>;

    async fn get_clip(&self, id: &ClipId) -> StoreResult<Option<Clip>>;

    async fn delete_clip(&self, id: &ClipId) -> StoreResult<Option<Clip>>;

    // Admin

    async fn stats(&self, since: DateTime<Utc>) -> StoreResult<StoreStats>;

    /// Cheap reachability check.
    async fn ping(&self) -> StoreResult<()>;
}
