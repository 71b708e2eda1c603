/// Lua static analysis
///
/// ```text
/// POST /v1/analysis
/// Authorization: Bearer <access token>
/// Content-Type: application/json
///
/// { "file_name": "server.lua", "content": "..." }
/// ```
///
/// Charges `ANALYSIS_COST` credits per file. The credits come back if the
/// analysis itself fails.
///
/// # Errors
///
/// - `402 Payment Required`: Not enough credits
/// - `422 Unprocessable Entity`: Not a `.lua` file

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{extract::State, Extension, Json};
use phac_shared::{
    auth::middleware::AuthContext,
    credits::ANALYSIS_COST,
    models::activity_log::{ActivityLog, EventType},
    protection::analysis::{analyze_lua, AnalysisReport},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub report: AnalysisReport,

    pub credits_charged: i32,

    pub credits_remaining: i32,
}

pub async fn analyze(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<AnalysisRequest>,
) -> ApiResult<Json<AnalysisResponse>> {
    if !req.file_name.ends_with(".lua") {
        return Err(ApiError::invalid(
            "file_name",
            "Only .lua files are supported",
        ));
    }

    let ledger = state.ledger();
    let credits_remaining = ledger
        .charge(
            auth.user_id,
            ANALYSIS_COST,
            &format!("Analysis of {}", req.file_name),
        )
        .await?;

    let report = match analyze_lua(&req.file_name, &req.content) {
        Ok(report) => report,
        Err(err) => {
            if let Err(e) = ledger
                .refund(auth.user_id, ANALYSIS_COST, "Refund for failed analysis")
                .await
            {
                tracing::error!(user_id = %auth.user_id, error = %e, "Refund failed");
            }
            return Err(err.into());
        }
    };

    ActivityLog::record(
        &state.db,
        auth.user_id,
        EventType::Analysis,
        format!(
            "Analysis of {}: {} finding(s)",
            report.file_name,
            report.findings.len()
        ),
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        file = %report.file_name,
        findings = report.findings.len(),
        risk = ?report.risk_level,
        "Analysis complete"
    );

    Ok(Json(AnalysisResponse {
        report,
        credits_charged: ANALYSIS_COST,
        credits_remaining,
    }))
}
