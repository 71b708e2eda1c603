/// Activity history
///
/// ```text
/// GET /v1/activity?event_type=encryption&limit=50
/// ```
///
/// Newest first. `limit` defaults to and is capped at 100.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Unknown `event_type`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use phac_shared::{
    auth::middleware::AuthContext,
    models::activity_log::{ActivityLog, EventType, MAX_LIST_LIMIT},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub event_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub activity: Vec<ActivityLog>,
}

/// Empty `event_type` means no filter
fn parse_event_type(raw: Option<&str>) -> ApiResult<Option<EventType>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => EventType::from_str(value)
            .map(Some)
            .ok_or_else(|| ApiError::invalid("event_type", format!("Unknown event type: {}", value))),
    }
}

pub async fn list_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<ActivityResponse>> {
    let event_type = parse_event_type(query.event_type.as_deref())?;
    let limit = query.limit.unwrap_or(MAX_LIST_LIMIT);

    let activity = ActivityLog::list_by_user(&state.db, auth.user_id, event_type, limit).await?;

    Ok(Json(ActivityResponse { activity }))
}
