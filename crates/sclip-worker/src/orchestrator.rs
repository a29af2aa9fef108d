//! Job admission, lookup and deletion.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use sclip_media::MediaTools;
use sclip_models::quota::window_start;
use sclip_models::{check_quota, resolve_source, Account, AccountId, Clip, ClipId, Job, JobId, JobStatus};
use sclip_store::{JobStore, StoreStats};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::spawn_job;
use crate::metrics;
use crate::paths::{remove_file, JobPaths};
use crate::pipeline::JobContext;

/// A job together with the clips visible to a status poll.
#[derive(Debug, Clone)]
pub struct JobView {
    pub job: Job,
    /// Empty unless the job is `completed`
    pub clips: Vec<Clip>,
}

/// A job with its clip count, as listed for an account.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job: Job,
    pub clips_count: u32,
}

/// Entry point for everything that touches jobs.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    tools: Arc<dyn MediaTools>,
    config: WorkerConfig,
    /// Serializes quota count + insert
    admission: Mutex<()>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn JobStore>, tools: Arc<dyn MediaTools>, config: WorkerConfig) -> Self {
        Self {
            store,
            tools,
            config,
            admission: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub async fn account(&self, id: &AccountId) -> WorkerResult<Account> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| WorkerError::AccountNotFound(id.to_string()))
    }

    /// Admit a job for `locator` and start it in the background.
    ///
    /// Quota is checked before the locator is resolved; neither failure
    /// creates a job.
    pub async fn submit(&self, account_id: &AccountId, locator: &str) -> WorkerResult<Job> {
        self.admit(account_id, locator).await.map(|(job, _)| job)
    }

    /// [`submit`](Self::submit), also returning the job task's handle.
    pub async fn admit(
        &self,
        account_id: &AccountId,
        locator: &str,
    ) -> WorkerResult<(Job, JoinHandle<()>)> {
        let account = self.account(account_id).await?;

        let job = {
            let _admission = self.admission.lock().await;

            let recent = self
                .store
                .count_jobs_since(&account.id, window_start(Utc::now()))
                .await?;
            if let Err(denied) = check_quota(account.plan, recent) {
                metrics::record_job_denied("quota");
                info!(account_id = %account.id, plan = %account.plan, recent, "Job denied by quota");
                return Err(denied.into());
            }

            let source = resolve_source(locator).map_err(|e| {
                metrics::record_job_denied("invalid_source");
                WorkerError::from(e)
            })?;

            let job = Job::new(account.id.clone(), locator.trim(), source);
            self.store.insert_job(&job).await?;
            job
        };

        metrics::record_job_admitted(account.plan.as_str());
        info!(job_id = %job.id, account_id = %account.id, source_id = %job.source_id, "Job admitted");

        let handle = spawn_job(JobContext::new(
            job.id.clone(),
            job.source_id.clone(),
            JobPaths::new(&self.config.work_dir, &job.id),
            Arc::clone(&self.store),
            Arc::clone(&self.tools),
        ));

        Ok((job, handle))
    }

    /// The account's job, or `JobNotFound` (also for other accounts' jobs).
    async fn owned_job(&self, account_id: &AccountId, job_id: &JobId) -> WorkerResult<Job> {
        match self.store.get_job(job_id).await? {
            Some(job) if job.is_owned_by(account_id) => Ok(job),
            _ => Err(WorkerError::job_not_found(job_id)),
        }
    }

    /// Poll view: clips only once the job has completed.
    pub async fn status(&self, account_id: &AccountId, job_id: &JobId) -> WorkerResult<JobView> {
        let job = self.owned_job(account_id, job_id).await?;
        let clips = if job.status == JobStatus::Completed {
            self.store.list_clips(job_id).await?
        } else {
            Vec::new()
        };
        Ok(JobView { job, clips })
    }

    /// A job with every clip it currently has.
    pub async fn job(&self, account_id: &AccountId, job_id: &JobId) -> WorkerResult<JobView> {
        let job = self.owned_job(account_id, job_id).await?;
        let clips = self.store.list_clips(job_id).await?;
        Ok(JobView { job, clips })
    }

    pub async fn list_jobs(&self, account_id: &AccountId) -> WorkerResult<Vec<JobSummary>> {
        let jobs = self.store.list_jobs(account_id).await?;
        let mut summaries = Vec::with_capacity(jobs.len());
        for job in jobs {
            let clips_count = self.store.count_clips(&job.id).await?;
            summaries.push(JobSummary { job, clips_count });
        }
        Ok(summaries)
    }

    /// Delete a job and its files. Returns whether a record was removed;
    /// unknown ids and other accounts' jobs are a no-op.
    pub async fn delete_job(&self, account_id: &AccountId, job_id: &JobId) -> WorkerResult<bool> {
        if self.owned_job(account_id, job_id).await.is_err() {
            return Ok(false);
        }

        let Some(deleted) = self.store.delete_job(job_id).await? else {
            return Ok(false);
        };

        let paths = JobPaths::new(&self.config.work_dir, job_id);
        let failures = paths.remove_all(&deleted.clips).await;
        if failures > 0 {
            warn!(job_id = %job_id, failures, "Some job files could not be removed");
        }
        info!(job_id = %job_id, clips = deleted.clips.len(), "Job deleted");
        Ok(true)
    }

    pub async fn list_clips(&self, account_id: &AccountId) -> WorkerResult<Vec<Clip>> {
        Ok(self.store.list_account_clips(account_id).await?)
    }

    /// A clip, with ownership checked through its job.
    pub async fn clip(&self, account_id: &AccountId, clip_id: &ClipId) -> WorkerResult<Clip> {
        let clip = self
            .store
            .get_clip(clip_id)
            .await?
            .ok_or_else(|| WorkerError::ClipNotFound(clip_id.to_string()))?;
        self.owned_job(account_id, &clip.job_id)
            .await
            .map_err(|_| WorkerError::ClipNotFound(clip_id.to_string()))?;
        Ok(clip)
    }

    /// Delete one clip record and its file.
    pub async fn delete_clip(&self, account_id: &AccountId, clip_id: &ClipId) -> WorkerResult<()> {
        self.clip(account_id, clip_id).await?;
        if let Some(clip) = self.store.delete_clip(clip_id).await? {
            remove_file(std::path::Path::new(&clip.file_path)).await;
            info!(clip_id = %clip_id, job_id = %clip.job_id, "Clip deleted");
        }
        Ok(())
    }

    pub async fn stats(&self) -> WorkerResult<StoreStats> {
        Ok(self.store.stats(window_start(Utc::now())).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sclip_media::testing::FakeMediaTools;
    use sclip_models::PlanTier;
    use sclip_store::MemoryStore;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct Harness {
        orchestrator: Orchestrator,
        store: Arc<MemoryStore>,
        account: Account,
        _dir: tempfile::TempDir,
    }

    async fn harness(tools: FakeMediaTools, plan: PlanTier) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let account = Account::new("acct", "acct@example.com").with_plan(plan);
        store.upsert_account(&account).await.unwrap();

        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(tools),
            WorkerConfig::with_work_dir(dir.path()),
        );
        Harness { orchestrator, store, account, _dir: dir }
    }

    /// Submit and wait for the job task to finish.
    async fn run_job(h: &Harness) -> Job {
        let (job, handle) = h.orchestrator.admit(&h.account.id, URL).await.unwrap();
        handle.await.unwrap();
        h.store.get_job(&job.id).await.unwrap().unwrap()
    }

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[tokio::test]
    async fn test_ninety_second_source_produces_three_clips() {
        let h = harness(FakeMediaTools::new("Talk", 90.0), PlanTier::Free).await;

        let (job, handle) = h.orchestrator.admit(&h.account.id, URL).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        handle.await.unwrap();

        let view = h.orchestrator.status(&h.account.id, &job.id).await.unwrap();
        assert_eq!(view.job.status, JobStatus::Completed);
        assert_eq!(view.job.title.as_deref(), Some("Talk"));
        assert_eq!(view.clips.len(), 3);
        assert!(view.clips.iter().all(|c| c.duration == 30.0));
        assert!(view.clips.iter().all(|c| Path::new(&c.file_path).exists()));
    }

    #[tokio::test]
    async fn test_acquisition_failure_never_reaches_processing() {
        let h = harness(FakeMediaTools::new("Talk", 90.0).failing_acquire(), PlanTier::Free).await;

        let done = run_job(&h).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error_message.is_some());
        let history = h.store.status_history(&done.id).await;
        assert!(!history.contains(&JobStatus::Processing));
        assert!(!history.contains(&JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_all_trims_failing_still_completes() {
        let h = harness(FakeMediaTools::new("Talk", 600.0).failing_trims(), PlanTier::Free).await;

        let done = run_job(&h).await;

        assert_eq!(done.status, JobStatus::Completed);
        let view = h.orchestrator.status(&h.account.id, &done.id).await.unwrap();
        assert!(view.clips.is_empty());
    }

    #[tokio::test]
    async fn test_quota_denies_third_free_job() {
        let h = harness(FakeMediaTools::new("Talk", 45.0), PlanTier::Free).await;

        h.orchestrator.submit(&h.account.id, URL).await.unwrap();
        h.orchestrator.submit(&h.account.id, URL).await.unwrap();
        let err = h.orchestrator.submit(&h.account.id, URL).await.unwrap_err();

        assert!(matches!(err, WorkerError::QuotaExceeded(q) if q.limit == 2));
        assert_eq!(h.orchestrator.list_jobs(&h.account.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unlimited_plan_is_not_gated() {
        let h = harness(FakeMediaTools::new("Talk", 45.0), PlanTier::Lifetime).await;
        for _ in 0..6 {
            h.orchestrator.submit(&h.account.id, URL).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_concurrent_submissions_respect_quota() {
        let h = Arc::new(harness(FakeMediaTools::new("Talk", 45.0), PlanTier::Free).await);

        let attempts = (0..6).map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.orchestrator.submit(&h.account.id, URL).await.is_ok() })
        });
        let mut admitted = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            admitted += attempt.await.unwrap() as usize;
        }
        assert_eq!(admitted, 2);
    }

    #[tokio::test]
    async fn test_invalid_source_creates_no_job() {
        let h = harness(FakeMediaTools::new("Talk", 45.0), PlanTier::Free).await;

        let err = h.orchestrator.submit(&h.account.id, "https://vimeo.com/1").await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidSource(_)));
        assert!(h.orchestrator.list_jobs(&h.account.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let h = harness(FakeMediaTools::new("Talk", 45.0), PlanTier::Free).await;
        let err = h.orchestrator.submit(&AccountId::new("nobody"), URL).await.unwrap_err();
        assert!(matches!(err, WorkerError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_removes_files() {
        let h = harness(FakeMediaTools::new("Talk", 90.0), PlanTier::Free).await;
        let job = run_job(&h).await;

        let view = h.orchestrator.status(&h.account.id, &job.id).await.unwrap();
        let paths = JobPaths::new(&h.orchestrator.config().work_dir, &job.id);
        assert!(paths.video.exists());

        assert!(h.orchestrator.delete_job(&h.account.id, &job.id).await.unwrap());
        assert!(!h.orchestrator.delete_job(&h.account.id, &job.id).await.unwrap());

        assert!(!paths.video.exists());
        assert!(!paths.thumbnail.exists());
        assert!(!paths.clips_dir.exists());
        assert!(view.clips.iter().all(|c| !Path::new(&c.file_path).exists()));
        assert!(matches!(
            h.orchestrator.status(&h.account.id, &job.id).await,
            Err(WorkerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_other_accounts_job_is_noop() {
        let h = harness(FakeMediaTools::new("Talk", 45.0), PlanTier::Free).await;
        let job = h.orchestrator.submit(&h.account.id, URL).await.unwrap();

        let intruder = AccountId::new("intruder");
        assert!(!h.orchestrator.delete_job(&intruder, &job.id).await.unwrap());
        assert!(h.store.get_job(&job.id).await.unwrap().is_some());
        assert!(h.orchestrator.status(&intruder, &job.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_mid_run_stops_the_job() {
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let tools = FakeMediaTools::new("Talk", 90.0).gated(started.clone(), gate.clone());
        let h = harness(tools, PlanTier::Free).await;

        let (job, handle) = h.orchestrator.admit(&h.account.id, URL).await.unwrap();
        started.notified().await;
        assert!(h.orchestrator.delete_job(&h.account.id, &job.id).await.unwrap());
        gate.notify_one();
        handle.await.unwrap();

        let paths = JobPaths::new(&h.orchestrator.config().work_dir, &job.id);
        assert!(h.store.get_job(&job.id).await.unwrap().is_none());
        assert_eq!(
            h.store.status_history(&job.id).await,
            vec![JobStatus::Queued, JobStatus::Downloading]
        );
        assert!(!paths.video.exists());
        assert!(!paths.clips_dir.exists());
    }

    #[tokio::test]
    async fn test_clip_ownership_and_delete() {
        let h = harness(FakeMediaTools::new("Talk", 90.0), PlanTier::Free).await;
        run_job(&h).await;

        let clips = h.orchestrator.list_clips(&h.account.id).await.unwrap();
        assert_eq!(clips.len(), 3);
        let target = &clips[0];

        assert!(matches!(
            h.orchestrator.clip(&AccountId::new("intruder"), &target.id).await,
            Err(WorkerError::ClipNotFound(_))
        ));

        h.orchestrator.delete_clip(&h.account.id, &target.id).await.unwrap();
        assert!(!Path::new(&target.file_path).exists());
        assert_eq!(h.orchestrator.list_clips(&h.account.id).await.unwrap().len(), 2);
        assert!(h.orchestrator.delete_clip(&h.account.id, &target.id).await.is_err());
    }

    #[tokio::test]
    async fn test_stats() {
        let h = harness(FakeMediaTools::new("Talk", 45.0), PlanTier::Free).await;
        run_job(&h).await;

        let stats = h.orchestrator.stats().await.unwrap();
        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.total_clips, 1);
        assert_eq!(stats.jobs_since, 1);
    }
}
