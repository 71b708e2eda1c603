/// Request extractors
///
/// [`ApiJson`] is `axum::Json` with rejections rendered as [`ApiError`], so
/// malformed bodies get the same JSON error shape as every other failure.
/// Unknown enum values (e.g. a `protectionLevel` of `"ultra"`) become 422.

use axum::extract::FromRequest;
use validator::Validate;

use crate::error::{ApiError, ApiResult};

/// JSON body extractor with API-shaped rejections
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Runs `validator` rules on a request body
pub fn validate_body<T: Validate>(body: &T) -> ApiResult<()> {
    body.validate().map_err(ApiError::from)
}
