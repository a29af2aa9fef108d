//! Plan tiers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Jobs a free account may create per quota window.
pub const FREE_WEEKLY_JOB_LIMIT: u32 = 2;

/// Jobs a weekly-billed account may create per quota window.
pub const WEEKLY_PLAN_JOB_LIMIT: u32 = 5;

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Weekly,
    Monthly,
    Yearly,
    Lifetime,
}

impl PlanTier {
    /// All tiers.
    pub const ALL: [PlanTier; 5] = [
        PlanTier::Free,
        PlanTier::Weekly,
        PlanTier::Monthly,
        PlanTier::Yearly,
        PlanTier::Lifetime,
    ];

    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(PlanTier::Free),
            "weekly" => Some(PlanTier::Weekly),
            "monthly" => Some(PlanTier::Monthly),
            "yearly" => Some(PlanTier::Yearly),
            "lifetime" => Some(PlanTier::Lifetime),
            _ => None,
        }
    }

    /// Like [`parse`](Self::parse), but unknown plans fall back to `Free`.
    pub fn parse_lossy(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Maximum jobs per quota window, `None` when unlimited.
    pub fn weekly_job_limit(&self) -> Option<u32> {
        match self {
            PlanTier::Free => Some(FREE_WEEKLY_JOB_LIMIT),
            PlanTier::Weekly => Some(WEEKLY_PLAN_JOB_LIMIT),
            PlanTier::Monthly | PlanTier::Yearly | PlanTier::Lifetime => None,
        }
    }

    /// Get the plan name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Weekly => "weekly",
            PlanTier::Monthly => "monthly",
            PlanTier::Yearly => "yearly",
            PlanTier::Lifetime => "lifetime",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
