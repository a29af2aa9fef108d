//! Weekly job quota gate.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::plan::PlanTier;

/// Length of the rolling quota window.
pub const QUOTA_WINDOW_DAYS: i64 = 7;

/// Admission denied by the quota gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Weekly limit reached ({limit} jobs on the {plan} plan)")]
pub struct QuotaExceeded {
    pub plan: PlanTier,
    pub limit: u32,
}

/// Decide whether an account on `plan` that already created `jobs_in_window`
/// jobs during the trailing window may create another one.
pub fn check_quota(plan: PlanTier, jobs_in_window: u32) -> Result<(), QuotaExceeded> {
    match plan.weekly_job_limit() {
        Some(limit) if jobs_in_window >= limit => Err(QuotaExceeded { plan, limit }),
        _ => Ok(()),
    }
}

/// Start of the quota window ending at `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(QUOTA_WINDOW_DAYS)
}
