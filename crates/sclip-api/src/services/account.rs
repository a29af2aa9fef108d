//! Account provisioning and plan management.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use sclip_models::quota::window_start;
use sclip_models::{Account, AccountId, PlanTier, Role};
use sclip_store::JobStore;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};

/// Quota usage for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountUsage {
    pub jobs_this_week: u32,
    /// `None` when the plan is unlimited
    pub weekly_limit: Option<u32>,
}

/// Account service.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn JobStore>,
    admin_ids: Arc<Vec<String>>,
}

impl AccountService {
    pub fn new(store: Arc<dyn JobStore>, admin_ids: Vec<String>) -> Self {
        Self {
            store,
            admin_ids: Arc::new(admin_ids),
        }
    }

    fn role_for(&self, id: &AccountId) -> Role {
        if self.admin_ids.iter().any(|a| a == id.as_str()) {
            Role::Admin
        } else {
            Role::User
        }
    }

    /// Get or create the account named by the token.
    pub async fn get_or_create(&self, user: &AuthUser) -> ApiResult<Account> {
        let role = self.role_for(&user.account_id);

        match self.store.get_account(&user.account_id).await? {
            Some(mut account) => {
                let email_changed = user
                    .email
                    .as_deref()
                    .is_some_and(|email| email != account.email);
                let promoted = role == Role::Admin && !account.is_admin();
                if email_changed || promoted {
                    if let Some(email) = &user.email {
                        account.email = email.clone();
                    }
                    if promoted {
                        account.role = Role::Admin;
                    }
                    if let Err(e) = self.store.upsert_account(&account).await {
                        warn!(account_id = %account.id, error = %e, "Failed to update account");
                    }
                }
                Ok(account)
            }
            None => {
                let account = Account::new(
                    user.account_id.as_str(),
                    user.email.clone().unwrap_or_default(),
                )
                .with_role(role);
                self.store.upsert_account(&account).await?;
                info!(account_id = %account.id, role = role.as_str(), "Created new account");
                Ok(account)
            }
        }
    }

    pub async fn set_plan(&self, id: &AccountId, plan: PlanTier) -> ApiResult<Account> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Account not found: {}", id)))?
            .with_plan(plan);
        self.store.upsert_account(&account).await?;
        info!(account_id = %id, plan = %plan, "Account plan updated");
        Ok(account)
    }

    pub async fn usage(&self, account: &Account) -> ApiResult<AccountUsage> {
        let jobs_this_week = self
            .store
            .count_jobs_since(&account.id, window_start(Utc::now()))
            .await?;
        Ok(AccountUsage {
            jobs_this_week,
            weekly_limit: account.plan.weekly_job_limit(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sclip_store::MemoryStore;

    fn user(id: &str, email: Option<&str>) -> AuthUser {
        AuthUser {
            account_id: AccountId::new(id),
            email: email.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_provisions_free_account_once() {
        let store = Arc::new(MemoryStore::new());
        let service = AccountService::new(store.clone(), vec![]);

        let created = service.get_or_create(&user("acct", Some("a@example.com"))).await.unwrap();
        assert_eq!(created.plan, PlanTier::Free);
        assert_eq!(created.role, Role::User);

        service.set_plan(&created.id, PlanTier::Monthly).await.unwrap();
        let again = service.get_or_create(&user("acct", Some("a@example.com"))).await.unwrap();
        assert_eq!(again.plan, PlanTier::Monthly);
    }

    #[tokio::test]
    async fn test_email_update_and_admin_promotion() {
        let store = Arc::new(MemoryStore::new());
        AccountService::new(store.clone(), vec![])
            .get_or_create(&user("boss", Some("old@example.com")))
            .await
            .unwrap();

        let service = AccountService::new(store.clone(), vec!["boss".to_string()]);
        let account = service.get_or_create(&user("boss", Some("new@example.com"))).await.unwrap();
        assert!(account.is_admin());

        let stored = store.get_account(&AccountId::new("boss")).await.unwrap().unwrap();
        assert_eq!(stored.email, "new@example.com");
        assert!(stored.is_admin());
    }

    #[tokio::test]
    async fn test_set_plan_unknown_account() {
        let service = AccountService::new(Arc::new(MemoryStore::new()), vec![]);
        let err = service.set_plan(&AccountId::new("ghost"), PlanTier::Weekly).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_usage() {
        let service = AccountService::new(Arc::new(MemoryStore::new()), vec![]);
        let account = service.get_or_create(&user("acct", None)).await.unwrap();
        let usage = service.usage(&account).await.unwrap();
        assert_eq!(usage, AccountUsage { jobs_this_week: 0, weekly_limit: Some(2) });
    }
}
