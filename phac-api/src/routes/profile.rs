/// Profile endpoints
///
/// # Endpoints
///
/// - `GET /v1/profile` - Current profile
/// - `PUT /v1/profile` - One-time name/company change
/// - `POST /v1/profile/password` - Change password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{validate_body, ApiJson},
};
use axum::{extract::State, Extension, Json};
use phac_shared::{
    auth::{middleware::AuthContext, password},
    models::{
        activity_log::{ActivityLog, EventType},
        profile::Profile,
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Profile update request; omitted fields keep their value
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Company name must be 1 to 100 characters"
    ))]
    pub company_name: Option<String>,
}

/// Password change request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,

    pub new_password: String,

    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub success: bool,
}

async fn load_profile(state: &AppState, auth: &AuthContext) -> ApiResult<Profile> {
    Profile::find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))
}

/// Get the caller's profile
///
/// # Errors
///
/// - `404 Not Found`: No profile for this user
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(load_profile(&state, &auth).await?))
}

/// Change name and/or company name
///
/// Allowed once per account.
///
/// # Endpoint
///
/// ```text
/// PUT /v1/profile
/// Content-Type: application/json
///
/// { "name": "Jane Smith", "company_name": "Smith Scripts" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to change
/// - `404 Not Found`: No profile for this user
/// - `409 Conflict`: The name change was already used
/// - `422 Unprocessable Entity`: Validation failed
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    validate_body(&req)?;

    let name = req.name.as_deref().map(str::trim);
    let company_name = req.company_name.as_deref().map(str::trim);

    if name.is_none() && company_name.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }
    if name.is_some_and(str::is_empty) {
        return Err(ApiError::invalid("name", "Name must be 1 to 100 characters"));
    }
    if company_name.is_some_and(str::is_empty) {
        return Err(ApiError::invalid(
            "company_name",
            "Company name must be 1 to 100 characters",
        ));
    }

    let Some(profile) =
        Profile::update_names_once(&state.db, auth.user_id, name, company_name).await?
    else {
        // Tell "already used" apart from "missing"
        load_profile(&state, &auth).await?;
        return Err(ApiError::Conflict(
            "The name can only be changed once".to_string(),
        ));
    };

    ActivityLog::record(
        &state.db,
        auth.user_id,
        EventType::ProfileUpdated,
        "Profile name updated",
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, "Profile updated");

    Ok(Json(profile))
}

/// Change the account password
///
/// # Endpoint
///
/// ```text
/// POST /v1/profile/password
/// Content-Type: application/json
///
/// {
///   "current_password": "OldP@ss123",
///   "new_password": "NewP@ss456",
///   "confirm_password": "NewP@ss456"
/// }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: User no longer exists
/// - `422 Unprocessable Entity`: Wrong current password, weak or mismatched
///   new password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<ChangePasswordResponse>> {
    validate_body(&req)?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::invalid(
            "current_password",
            "Current password is incorrect",
        ));
    }

    password::validate_password_strength(&req.new_password)
        .map_err(|message| ApiError::invalid("new_password", message))?;

    let password_hash = password::hash_password(&req.new_password)?;
    User::update_password(&state.db, user.id, &password_hash).await?;

    ActivityLog::record(
        &state.db,
        user.id,
        EventType::PasswordChanged,
        "Password changed",
    )
    .await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(ChangePasswordResponse { success: true }))
}
