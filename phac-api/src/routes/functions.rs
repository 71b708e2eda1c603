/// Stateless protection endpoints
///
/// Drop-in replacements for the hosted edge functions the dashboard used to
/// call. Neither endpoint touches the database or requires a token; both
/// accept any origin.
///
/// # Endpoints
///
/// - `POST /functions/v1/process-files` - Protect files, return them as JSON
/// - `POST /functions/v1/download-protected` - Package protected files as a zip

use crate::{
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use phac_shared::protection::{
    self, package, ProtectError, ProtectedFile, ProtectionLevel, ProtectionOutcome, SourceFile,
};
use serde::{Deserialize, Serialize};

/// Process request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFilesRequest {
    #[serde(default)]
    pub files: Vec<SourceFile>,

    pub protection_level: ProtectionLevel,

    /// Accepted for compatibility; not used by the transforms
    #[serde(default)]
    pub license_key: Option<String>,

    /// Accepted for compatibility; not used by the transforms
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Process response: the protection outcome plus a success flag
#[derive(Debug, Serialize)]
pub struct ProcessFilesResponse {
    pub success: bool,

    #[serde(flatten)]
    pub outcome: ProtectionOutcome,
}

/// Download request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(default)]
    pub files: Vec<ProtectedFile>,

    pub encryption_id: String,

    #[serde(default)]
    pub license_key: String,
}

/// Protect a batch of files
///
/// # Endpoint
///
/// ```text
/// POST /functions/v1/process-files
/// Content-Type: application/json
///
/// {
///   "files": [{ "name": "client.lua", "content": "...", "type": "lua" }],
///   "protectionLevel": "advanced"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "files": [{ "name": "client.lua", "content": "...", "type": "lua" }],
///   "encryptionId": "LOYW3V28-A1B2",
///   "dateStr": "20231114",
///   "zipFilename": "phacprotect-20231114-LOYW3V28-A1B2.zip",
///   "loaderCode": "...",
///   "stats": { "total": 1, "lua": 1, "js": 0, "html": 0, "css": 0, "json": 0 }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: No files, or malformed JSON
/// - `422 Unprocessable Entity`: Unknown protection level
pub async fn process_files(
    ApiJson(req): ApiJson<ProcessFilesRequest>,
) -> ApiResult<Json<ProcessFilesResponse>> {
    if req.files.is_empty() {
        return Err(ProtectError::NoFiles.into());
    }

    tracing::info!(
        files = req.files.len(),
        level = req.protection_level.as_str(),
        has_license_key = req.license_key.is_some(),
        "Processing files"
    );

    let outcome = run_protection(req.files, req.protection_level).await?;

    tracing::info!(
        encryption_id = %outcome.encryption_id,
        total = outcome.stats.total,
        "Files processed"
    );

    Ok(Json(ProcessFilesResponse {
        success: true,
        outcome,
    }))
}

/// Package protected files into a zip archive
///
/// # Endpoint
///
/// ```text
/// POST /functions/v1/download-protected
/// Content-Type: application/json
///
/// {
///   "files": [{ "name": "client.lua", "content": "...", "type": "lua" }],
///   "encryptionId": "LOYW3V28-A1B2",
///   "licenseKey": "phac_..."
/// }
/// ```
///
/// # Response
///
/// `application/zip` body sent as an attachment named
/// `phacprotect-<date>-<encryptionId>.zip`, with caching disabled.
///
/// # Errors
///
/// - `400 Bad Request`: No files, unusable encryption ID, license key or entry
///   names
pub async fn download_protected(ApiJson(req): ApiJson<DownloadRequest>) -> ApiResult<Response> {
    if req.files.is_empty() {
        return Err(ProtectError::NoFiles.into());
    }

    let archive = package::build_archive(&req.files, &req.encryption_id, &req.license_key)?;

    tracing::info!(
        filename = %archive.filename,
        files = req.files.len(),
        bytes = archive.bytes.len(),
        "Archive ready for download"
    );

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        archive.filename
    ))
    .map_err(|e| ApiError::InternalError(format!("Invalid archive filename: {}", e)))?;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
        (header::CONTENT_DISPOSITION, disposition),
        (header::CONTENT_LENGTH, HeaderValue::from(archive.bytes.len())),
        (
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
        (header::EXPIRES, HeaderValue::from_static("0")),
    ];

    Ok((StatusCode::OK, headers, Bytes::from(archive.bytes)).into_response())
}

/// Runs the regex transforms off the async workers
pub(crate) async fn run_protection(
    files: Vec<SourceFile>,
    level: ProtectionLevel,
) -> ApiResult<ProtectionOutcome> {
    tokio::task::spawn_blocking(move || protection::process_files(&files, level))
        .await
        .map_err(|e| ApiError::InternalError(format!("Protection task failed: {}", e)))?
        .map_err(ApiError::from)
}
