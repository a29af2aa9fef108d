//! Admin handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use sclip_models::{Account, AccountId, PlanTier};
use sclip_store::StoreStats;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct UpdatePlanResponse {
    pub message: String,
    pub account: Account,
}

async fn require_admin(state: &AppState, user: &AuthUser) -> ApiResult<()> {
    let account = state.accounts.get_or_create(user).await?;
    if !account.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(())
}

/// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<StoreStats>> {
    require_admin(&state, &user).await?;
    Ok(Json(state.orchestrator.stats().await?))
}

/// PUT /api/admin/accounts/:account_id/plan
pub async fn update_account_plan(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    user: AuthUser,
    payload: Result<Json<UpdatePlanRequest>, JsonRejection>,
) -> ApiResult<Json<UpdatePlanResponse>> {
    require_admin(&state, &user).await?;
    let Json(request) = payload?;

    let plan = PlanTier::parse(&request.plan)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid plan: {}", request.plan)))?;
    let account = state.accounts.set_plan(&AccountId::new(account_id), plan).await?;

    info!(admin = %user.account_id, account_id = %account.id, plan = %plan, "Admin updated plan");
    Ok(Json(UpdatePlanResponse {
        message: format!("Plan updated to {}", plan),
        account,
    }))
}
