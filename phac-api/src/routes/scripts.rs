/// Script protection workflow
///
/// # Endpoints
///
/// - `POST /v1/scripts/protect` - Protect Lua files under a license key
/// - `GET /v1/scripts` - Protected script records, newest first
///
/// # Workflow
///
/// ```text
/// validate -> charge credits -> protect -> record scripts + link to key + log
///                                   \
///                                    -> on failure: refund + record failures
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::functions::run_protection,
};
use axum::{extract::State, Extension, Json};
use phac_shared::{
    auth::middleware::AuthContext,
    credits::protection_cost,
    models::{
        activity_log::{ActivityLog, EventType},
        license_key::LicenseKey,
        script::{CreateScriptRecord, EncryptionStatus, ScriptRecord, ScriptStatus},
    },
    protection::{FileType, ProtectionLevel, ProtectionOutcome, SourceFile},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LUA_EXTENSION: &str = ".lua";

/// One uploaded script
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptUpload {
    pub name: String,
    pub content: String,
}

/// Protect request
#[derive(Debug, Deserialize)]
pub struct ProtectRequest {
    #[serde(default)]
    pub files: Vec<ScriptUpload>,

    pub protection_level: ProtectionLevel,

    pub license_key_id: Uuid,
}

/// Protect response: the protection outcome plus bookkeeping
#[derive(Debug, Serialize)]
pub struct ProtectResponse {
    pub success: bool,

    #[serde(flatten)]
    pub outcome: ProtectionOutcome,

    /// Records created for the protected files, in upload order
    pub script_ids: Vec<Uuid>,

    pub credits_charged: i32,

    pub credits_remaining: i32,
}

#[derive(Debug, Serialize)]
pub struct ListScriptsResponse {
    pub scripts: Vec<ScriptRecord>,
}

/// Protect Lua scripts under one of the caller's license keys
///
/// # Endpoint
///
/// ```text
/// POST /v1/scripts/protect
/// Authorization: Bearer <access token>
/// Content-Type: application/json
///
/// {
///   "files": [{ "name": "server.lua", "content": "..." }],
///   "protection_level": "advanced",
///   "license_key_id": "uuid"
/// }
/// ```
///
/// # Response
///
/// The `process-files` payload (`files`, `encryptionId`, `dateStr`,
/// `zipFilename`, `loaderCode`, `stats`) plus `script_ids`,
/// `credits_charged` and `credits_remaining`.
///
/// # Errors
///
/// - `400 Bad Request`: No files
/// - `402 Payment Required`: Not enough credits
/// - `404 Not Found`: License key not found
/// - `409 Conflict`: License key revoked
/// - `422 Unprocessable Entity`: A file is not `.lua`, or unknown level
/// - `500 Internal Server Error`: Protection failed (credits are refunded)
pub async fn protect_scripts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ProtectRequest>,
) -> ApiResult<Json<ProtectResponse>> {
    if req.files.is_empty() {
        return Err(ApiError::BadRequest("No files to process".to_string()));
    }
    if let Some(file) = req.files.iter().find(|f| !f.name.ends_with(LUA_EXTENSION)) {
        tracing::debug!(user_id = %auth.user_id, file = %file.name, "Rejected non-Lua upload");
        return Err(ApiError::invalid("files", "Only .lua files are supported"));
    }

    let key = LicenseKey::find_for_user(&state.db, req.license_key_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("License key not found".to_string()))?;
    if !key.is_active() {
        return Err(ApiError::Conflict("License key is revoked".to_string()));
    }

    let level = req.protection_level;
    let cost = protection_cost(req.files.len(), level);
    let ledger = state.ledger();

    let credits_remaining = ledger
        .charge(
            auth.user_id,
            cost,
            &format!(
                "Protection of {} file(s) at {} level",
                req.files.len(),
                level.as_str()
            ),
        )
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        key_id = %key.id,
        files = req.files.len(),
        level = level.as_str(),
        cost,
        "Protecting scripts"
    );

    let sources: Vec<SourceFile> = req
        .files
        .iter()
        .map(|f| SourceFile::new(f.name.as_str(), f.content.as_str(), FileType::Lua.as_str()))
        .collect();

    let outcome = match run_protection(sources, level).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(user_id = %auth.user_id, error = %err, "Protection failed, refunding");
            refund(&state, auth.user_id, cost).await;
            record_failures(&state, auth.user_id, key.id, level, &req.files).await;
            return Err(err);
        }
    };

    let script_ids = match record_success(&state, auth.user_id, &key, level, &req.files, &outcome)
        .await
    {
        Ok(ids) => ids,
        Err(err) => {
            refund(&state, auth.user_id, cost).await;
            return Err(err.into());
        }
    };

    tracing::info!(
        user_id = %auth.user_id,
        encryption_id = %outcome.encryption_id,
        scripts = script_ids.len(),
        "Scripts protected"
    );

    Ok(Json(ProtectResponse {
        success: true,
        outcome,
        script_ids,
        credits_charged: cost,
        credits_remaining,
    }))
}

/// List the caller's protected script records
pub async fn list_scripts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListScriptsResponse>> {
    let scripts = ScriptRecord::list_by_user(&state.db, auth.user_id).await?;

    Ok(Json(ListScriptsResponse { scripts }))
}

/// Records, key links and the log entry commit together
async fn record_success(
    state: &AppState,
    user_id: Uuid,
    key: &LicenseKey,
    level: ProtectionLevel,
    uploads: &[ScriptUpload],
    outcome: &ProtectionOutcome,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let mut tx = state.db.begin().await?;
    let mut script_ids = Vec::with_capacity(uploads.len());

    for (upload, protected) in uploads.iter().zip(&outcome.files) {
        let record = ScriptRecord::create(
            &mut *tx,
            CreateScriptRecord {
                user_id,
                license_key_id: Some(key.id),
                script_name: upload.name.clone(),
                original_size: byte_len(&upload.content),
                encrypted_size: Some(byte_len(&protected.content)),
                protection_level: Some(level.as_str().to_string()),
                status: ScriptStatus::Protected,
                status_encryption: EncryptionStatus::Success,
            },
        )
        .await?;
        script_ids.push(record.id);
    }

    LicenseKey::append_linked_scripts(&mut *tx, key.id, &script_ids).await?;

    ActivityLog::record(
        &mut *tx,
        user_id,
        EventType::Encryption,
        format!(
            "{} file(s) protected with level {}",
            script_ids.len(),
            level.as_str()
        ),
    )
    .await?;

    tx.commit().await?;

    Ok(script_ids)
}

/// Best effort: the request already failed, so errors here are only logged
async fn record_failures(
    state: &AppState,
    user_id: Uuid,
    key_id: Uuid,
    level: ProtectionLevel,
    uploads: &[ScriptUpload],
) {
    for upload in uploads {
        let result = ScriptRecord::create(
            &state.db,
            CreateScriptRecord {
                user_id,
                license_key_id: Some(key_id),
                script_name: upload.name.clone(),
                original_size: byte_len(&upload.content),
                encrypted_size: None,
                protection_level: Some(level.as_str().to_string()),
                status: ScriptStatus::Failed,
                status_encryption: EncryptionStatus::Failed,
            },
        )
        .await;

        if let Err(e) = result {
            tracing::error!(%user_id, script = %upload.name, error = %e, "Failed to record failed script");
        }
    }
}

async fn refund(state: &AppState, user_id: Uuid, amount: i32) {
    if let Err(e) = state
        .ledger()
        .refund(user_id, amount, "Refund for failed protection")
        .await
    {
        tracing::error!(%user_id, amount, error = %e, "Refund failed");
    }
}

fn byte_len(content: &str) -> i64 {
    i64::try_from(content.len()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protect_request_defaults_to_no_files() {
        let req: ProtectRequest = serde_json::from_value(serde_json::json!({
            "protection_level": "standard",
            "license_key_id": Uuid::nil(),
        }))
        .unwrap();

        assert!(req.files.is_empty());
        assert_eq!(req.protection_level, ProtectionLevel::Standard);
    }

    #[test]
    fn test_unknown_level_rejected() {
        let result: Result<ProtectRequest, _> = serde_json::from_value(serde_json::json!({
            "files": [],
            "protection_level": "ultra",
            "license_key_id": Uuid::nil(),
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_byte_len_counts_utf8_bytes() {
        assert_eq!(byte_len("abc"), 3);
        assert_eq!(byte_len("é"), 2);
    }
}
