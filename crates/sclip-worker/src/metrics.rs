//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_ADMITTED_TOTAL: &str = "sclip_jobs_admitted_total";
    pub const JOBS_DENIED_TOTAL: &str = "sclip_jobs_denied_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "sclip_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "sclip_jobs_failed_total";
    pub const CLIPS_PRODUCED_TOTAL: &str = "sclip_clips_produced_total";
    pub const CLIPS_FAILED_TOTAL: &str = "sclip_clips_failed_total";
    pub const ACQUISITION_DURATION_SECONDS: &str = "sclip_acquisition_duration_seconds";
}

pub fn record_job_admitted(plan: &str) {
    let labels = [("plan", plan.to_string())];
    counter!(names::JOBS_ADMITTED_TOTAL, &labels).increment(1);
}

/// `reason` is `quota` or `invalid_source`.
pub fn record_job_denied(reason: &'static str) {
    counter!(names::JOBS_DENIED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed(stage: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "stage" => stage).increment(1);
}

pub fn record_clips(produced: usize, failed: usize) {
    counter!(names::CLIPS_PRODUCED_TOTAL).increment(produced as u64);
    counter!(names::CLIPS_FAILED_TOTAL).increment(failed as u64);
}

pub fn record_acquisition_duration(duration_secs: f64) {
    histogram!(names::ACQUISITION_DURATION_SECONDS).record(duration_secs);
}
