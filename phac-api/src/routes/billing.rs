/// Billing overview
///
/// ```text
/// GET /v1/billing
/// ```
///
/// Plan, plan limits, current balance and the 20 latest ledger entries.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use phac_shared::{
    auth::middleware::AuthContext,
    credits::PlanLimits,
    models::{
        credit_transaction::CreditTransaction,
        profile::{PlanStatus, Profile},
    },
};
use serde::Serialize;

const RECENT_TRANSACTIONS: i64 = 20;

#[derive(Debug, Serialize)]
pub struct BillingResponse {
    pub plan: PlanStatus,

    /// None means unlimited
    pub max_active_keys: Option<u32>,

    pub credits_balance: i32,

    pub transactions: Vec<CreditTransaction>,
}

pub async fn billing(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<BillingResponse>> {
    let profile = Profile::find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    let transactions =
        CreditTransaction::list_by_user(&state.db, auth.user_id, RECENT_TRANSACTIONS).await?;

    Ok(Json(BillingResponse {
        plan: profile.plan_status,
        max_active_keys: PlanLimits::for_plan(profile.plan_status).max_active_keys,
        credits_balance: profile.credits_balance,
        transactions,
    }))
}
