//! Account records referenced by jobs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::plan::PlanTier;

/// Account identifier (the authenticated subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parse the persisted representation; anything unknown is a plain user.
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// An account as seen by the pipeline: only plan and role matter here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    #[serde(default)]
    pub plan: PlanTier,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a free-tier user account.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(id),
            email: email.into(),
            plan: PlanTier::Free,
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    pub fn with_plan(mut self, plan: PlanTier) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_defaults() {
        let account = Account::new("user-1", "user@example.com");
        assert_eq!(account.plan, PlanTier::Free);
        assert!(!account.is_admin());

        let admin = account.with_role(Role::Admin).with_plan(PlanTier::Lifetime);
        assert!(admin.is_admin());
        assert_eq!(admin.plan, PlanTier::Lifetime);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse_lossy("admin"), Role::Admin);
        assert_eq!(Role::parse_lossy("user"), Role::User);
        assert_eq!(Role::parse_lossy("root"), Role::User);
    }
}
