//! Account handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sclip_models::Account;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::services::AccountUsage;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: Account,
    #[serde(flatten)]
    pub usage: AccountUsage,
}

/// GET /api/account
pub async fn get_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AccountResponse>> {
    let account = state.accounts.get_or_create(&user).await?;
    let usage = state.accounts.usage(&account).await?;
    Ok(Json(AccountResponse { account, usage }))
}
