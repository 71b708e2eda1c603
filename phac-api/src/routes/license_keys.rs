/// License key management
///
/// Keys are opaque identifiers that group protected scripts; the public key
/// is embedded in the standalone loader of each download.
///
/// # Endpoints
///
/// - `GET /v1/license-keys` - List keys with their linked scripts
/// - `POST /v1/license-keys` - Create a key
/// - `POST /v1/license-keys/:id/revoke` - Revoke a key
/// - `DELETE /v1/license-keys/:id` - Delete a key

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{validate_body, ApiJson},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use phac_shared::{
    auth::middleware::AuthContext,
    credits::PlanLimits,
    models::{
        activity_log::{ActivityLog, EventType},
        license_key::{CreateLicenseKey, LicenseKey},
        profile::Profile,
        script::{LinkedScript, ScriptRecord},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Create key request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLicenseKeyRequest {
    #[validate(length(min = 1, max = 100, message = "Key name must be 1 to 100 characters"))]
    pub key_name: String,
}

/// A key with the short form of its linked scripts
#[derive(Debug, Serialize)]
pub struct LicenseKeyResponse {
    #[serde(flatten)]
    pub key: LicenseKey,

    pub scripts: Vec<LinkedScript>,
}

#[derive(Debug, Serialize)]
pub struct ListLicenseKeysResponse {
    pub keys: Vec<LicenseKeyResponse>,
}

/// List the caller's keys, newest first
pub async fn list_license_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListLicenseKeysResponse>> {
    let keys = LicenseKey::list_by_user(&state.db, auth.user_id).await?;

    let mut response = Vec::with_capacity(keys.len());
    for key in keys {
        let scripts =
            ScriptRecord::list_linked(&state.db, auth.user_id, &key.linked_scripts).await?;
        response.push(LicenseKeyResponse { key, scripts });
    }

    Ok(Json(ListLicenseKeysResponse { keys: response }))
}

/// Create a license key
///
/// # Endpoint
///
/// ```text
/// POST /v1/license-keys
/// Content-Type: application/json
///
/// { "key_name": "Production server" }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: The plan's active key limit is reached
/// - `404 Not Found`: No profile for this user
/// - `422 Unprocessable Entity`: Name empty or longer than 100 characters
pub async fn create_license_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateLicenseKeyRequest>,
) -> ApiResult<(StatusCode, Json<LicenseKey>)> {
    validate_body(&req)?;

    let key_name = req.key_name.trim().to_string();
    if key_name.is_empty() {
        return Err(ApiError::invalid(
            "key_name",
            "Key name must be 1 to 100 characters",
        ));
    }

    let profile = Profile::find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    let limits = PlanLimits::for_plan(profile.plan_status);
    let active_keys = LicenseKey::count_active(&state.db, auth.user_id).await?;
    if !limits.allows_another_key(active_keys) {
        tracing::info!(
            user_id = %auth.user_id,
            plan = profile.plan_status.as_str(),
            active_keys,
            "License key limit reached"
        );
        return Err(ApiError::Forbidden(format!(
            "The {} plan allows {} active license key(s)",
            profile.plan_status.as_str(),
            limits.max_active_keys.unwrap_or_default()
        )));
    }

    let key = LicenseKey::create(
        &state.db,
        CreateLicenseKey {
            user_id: auth.user_id,
            key_name,
        },
    )
    .await?;

    ActivityLog::record(
        &state.db,
        auth.user_id,
        EventType::KeyCreated,
        format!("License key '{}' created", key.key_name),
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, key_id = %key.id, "License key created");

    Ok((StatusCode::CREATED, Json(key)))
}

/// Revoke a license key
///
/// Revoked keys stay listed but can no longer be used for protection.
///
/// # Errors
///
/// - `404 Not Found`: No such key for this user
pub async fn revoke_license_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(key_id): Path<Uuid>,
) -> ApiResult<Json<LicenseKey>> {
    let key = LicenseKey::revoke(&state.db, key_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("License key not found".to_string()))?;

    ActivityLog::record(
        &state.db,
        auth.user_id,
        EventType::KeyRevoked,
        format!("License key '{}' revoked", key.key_name),
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, key_id = %key.id, "License key revoked");

    Ok(Json(key))
}

/// Delete a license key
///
/// Script records keep existing with their key reference cleared.
///
/// # Errors
///
/// - `404 Not Found`: No such key for this user
pub async fn delete_license_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(key_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let key = LicenseKey::find_for_user(&state.db, key_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("License key not found".to_string()))?;

    if !LicenseKey::delete(&state.db, key.id, auth.user_id).await? {
        return Err(ApiError::NotFound("License key not found".to_string()));
    }

    ActivityLog::record(
        &state.db,
        auth.user_id,
        EventType::KeyDeleted,
        format!("License key '{}' deleted", key.key_name),
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, key_id = %key.id, "License key deleted");

    Ok(StatusCode::NO_CONTENT)
}
