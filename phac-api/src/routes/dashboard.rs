/// Dashboard overview
///
/// ```text
/// GET /v1/dashboard
/// ```
///
/// Returns the profile, the number of protected scripts, the number of
/// active license keys and the five latest activity entries.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use phac_shared::{
    auth::middleware::AuthContext,
    models::{
        activity_log::ActivityLog, license_key::LicenseKey, profile::Profile,
        script::ScriptRecord,
    },
};
use serde::Serialize;

/// Entries shown in the "recent activity" panel
const RECENT_ACTIVITY: i64 = 5;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub profile: Profile,
    pub scripts_protected: i64,
    pub active_keys: i64,
    pub recent_activity: Vec<ActivityLog>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardResponse>> {
    let profile = Profile::find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    let (scripts_protected, active_keys, recent_activity) = tokio::try_join!(
        ScriptRecord::count_by_user(&state.db, auth.user_id),
        LicenseKey::count_active(&state.db, auth.user_id),
        ActivityLog::list_by_user(&state.db, auth.user_id, None, RECENT_ACTIVITY),
    )?;

    Ok(Json(DashboardResponse {
        profile,
        scripts_protected,
        active_keys,
        recent_activity,
    }))
}
