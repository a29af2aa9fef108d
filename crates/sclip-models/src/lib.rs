//! Shared data models for the ShortClip backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their lifecycle status
//! - Clips produced from a job
//! - Accounts, plan tiers and the weekly quota gate
//! - Source locator resolution

pub mod account;
pub mod clip;
pub mod job;
pub mod job_status;
pub mod plan;
pub mod quota;
pub mod source;

// Re-export common types
pub use account::{Account, AccountId, Role};
pub use clip::{Clip, ClipId};
pub use job::{Job, JobId};
pub use job_status::{JobStatus, TransitionError};
pub use plan::PlanTier;
pub use quota::{check_quota, QuotaExceeded, QUOTA_WINDOW_DAYS};
pub use source::{resolve_source, SourceError, SourceId};
