//! In-memory store for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use sclip_models::{Account, AccountId, Clip, ClipId, Job, JobId, JobStatus};

use crate::error::{StoreError, StoreResult};
use crate::{DeletedJob, JobStore, StoreStats};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    jobs: HashMap<JobId, Job>,
    clips: HashMap<ClipId, Clip>,
    /// Every status a job has held, kept after deletion
    history: HashMap<JobId, Vec<JobStatus>>,
}

impl Inner {
    fn job_mut(&mut self, id: &JobId) -> StoreResult<&mut Job> {
        self.jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("job {}", id)))
    }

    fn record(&mut self, id: &JobId, status: JobStatus) {
        self.history.entry(id.clone()).or_default().push(status);
    }

    fn clips_of(&self, job: &JobId) -> Vec<Clip> {
        let mut clips: Vec<Clip> = self.clips.values().filter(|c| &c.job_id == job).cloned().collect();
        clips.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        clips
    }
}

/// [`JobStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses the job has held, in order.
    pub async fn status_history(&self, id: &JobId) -> Vec<JobStatus> {
        self.inner.read().await.history.get(id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get_account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        Ok(self.inner.read().await.accounts.get(id).cloned())
    }

    async fn upsert_account(&self, account: &Account) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .accounts
            .insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn count_jobs_since(&self, account: &AccountId, since: DateTime<Utc>) -> StoreResult<u32> {
        let inner = self.inner.read().await;
        let count = inner
            .jobs
            .values()
            .filter(|j| &j.account_id == account && j.created_at >= since)
            .count();
        Ok(count as u32)
    }

    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.accounts.contains_key(&job.account_id) {
            return Err(StoreError::not_found(format!("account {}", job.account_id)));
        }
        inner.jobs.insert(job.id.clone(), job.clone());
        inner.record(&job.id, job.status);
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.inner.read().await.jobs.get(id).cloned())
    }

    async fn list_jobs(&self, account: &AccountId) -> StoreResult<Vec<Job>> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| &j.account_id == account)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn set_title(&self, id: &JobId, title: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let job = inner.job_mut(id)?;
        if job.status.is_terminal() {
            return Err(StoreError::Terminal(job.status));
        }
        job.title = Some(title.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn transition(&self, id: &JobId, from: JobStatus, to: JobStatus) -> StoreResult<()> {
        from.transition(to)?;

        let mut inner = self.inner.write().await;
        let job = inner.job_mut(id)?;
        if job.status != from {
            return Err(StoreError::Conflict { expected: from, actual: job.status });
        }
        job.status = to;
        job.updated_at = Utc::now();
        inner.record(id, to);
        Ok(())
    }

    async fn fail_job(&self, id: &JobId, message: &str) -> StoreResult<JobStatus> {
        let mut inner = self.inner.write().await;
        let job = inner.job_mut(id)?;
        let previous = job.status;
        previous
            .transition(JobStatus::Failed)
            .map_err(|_| StoreError::Terminal(previous))?;
        job.status = JobStatus::Failed;
        job.error_message = Some(message.to_string());
        job.updated_at = Utc::now();
        inner.record(id, JobStatus::Failed);
        Ok(previous)
    }

    async fn complete_job(&self, id: &JobId, clips: &[Clip]) -> StoreResult<()> {
        JobStatus::Processing.transition(JobStatus::Completed)?;

        let mut inner = self.inner.write().await;
        let job = inner.job_mut(id)?;
        if job.status != JobStatus::Processing {
            return Err(StoreError::Conflict {
                expected: JobStatus::Processing,
                actual: job.status,
            });
        }
        job.status = JobStatus::Completed;
        job.updated_at = Utc::now();
        for clip in clips {
            inner.clips.insert(clip.id.clone(), clip.clone());
        }
        inner.record(id, JobStatus::Completed);
        Ok(())
    }

    async fn delete_job(&self, id: &JobId) -> StoreResult<Option<DeletedJob>> {
        let mut inner = self.inner.write().await;
        let Some(job) = inner.jobs.remove(id) else {
            return Ok(None);
        };
        let clips = inner.clips_of(id);
        inner.clips.retain(|_, c| &c.job_id != id);
        Ok(Some(DeletedJob { job, clips }))
    }

    async fn list_clips(&self, job: &JobId) -> StoreResult<Vec<Clip>> {
        Ok(self.inner.read().await.clips_of(job))
    }

    async fn count_clips(&self, job: &JobId) -> StoreResult<u32> {
        let inner = self.inner.read().await;
        Ok(inner.clips.values().filter(|c| &c.job_id == job).count() as u32)
    }

    async fn list_account_clips(&self, account: &AccountId) -> StoreResult<Vec<Clip>> {
        let inner = self.inner.read().await;
        let mut clips: Vec<Clip> = inner
            .clips
            .values()
            .filter(|c| {
                inner
                    .jobs
                    .get(&c.job_id)
                    .is_some_and(|j| &j.account_id == account)
            })
            .cloned()
            .collect();
        clips.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.start_time.total_cmp(&b.start_time))
        });
        Ok(clips)
    }

    async fn get_clip(&self, id: &ClipId) -> StoreResult<Option<Clip>> {
        Ok(self.inner.read().await.clips.get(id).cloned())
    }

    async fn delete_clip(&self, id: &ClipId) -> StoreResult<Option<Clip>> {
        Ok(self.inner.write().await.clips.remove(id))
    }

    async fn stats(&self, since: DateTime<Utc>) -> StoreResult<StoreStats> {
        let inner = self.inner.read().await;
        let mut stats = StoreStats {
            total_accounts: inner.accounts.len() as u64,
            total_jobs: inner.jobs.len() as u64,
            total_clips: inner.clips.len() as u64,
            ..Default::default()
        };
        for account in inner.accounts.values() {
            *stats.accounts_by_plan.entry(account.plan.to_string()).or_default() += 1;
        }
        for job in inner.jobs.values() {
            *stats.jobs_by_status.entry(job.status.to_string()).or_default() += 1;
            if job.created_at >= since {
                stats.jobs_since += 1;
            }
        }
        Ok(stats)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    #[tokio::test]
    async fn test_accounts_round_trip() {
        contract::accounts_round_trip(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        contract::job_lifecycle(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        contract::compare_and_set(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_fail_is_terminal() {
        contract::fail_is_terminal(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        contract::delete_cascades(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_delete_single_clip() {
        contract::delete_single_clip(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_listing_and_counts() {
        contract::listing_and_counts(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_account_clips() {
        contract::account_clips(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_insert_requires_account() {
        contract::insert_requires_account(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_status_history() {
        let store = MemoryStore::new();
        let account = contract::seed_account(&store, "acct").await;
        let job = contract::new_job(&account);
        store.insert_job(&job).await.unwrap();
        store.transition(&job.id, JobStatus::Queued, JobStatus::Downloading).await.unwrap();
        store.fail_job(&job.id, "boom").await.unwrap();

        assert_eq!(
            store.status_history(&job.id).await,
            vec![JobStatus::Queued, JobStatus::Downloading, JobStatus::Failed]
        );
    }
}
