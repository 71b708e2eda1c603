/// Authentication endpoints
///
/// This module provides user authentication endpoints:
/// - Registration (account, profile and welcome credits in one step)
/// - Login
/// - Token refresh
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{validate_body, ApiJson},
};
use axum::{extract::State, Json};
use phac_shared::{
    auth::{jwt, password},
    credits::SIGNUP_CREDITS,
    models::{
        activity_log::{ActivityLog, EventType},
        credit_transaction::{CreateCreditTransaction, CreditTransaction, TransactionKind},
        profile::{CreateProfile, Profile},
        user::{CreateUser, User},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Company name must be 1 to 100 characters"
    ))]
    pub company_name: String,

    /// Email address
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: String,

    #[validate(range(min = 18, max = 120, message = "Age must be between 18 and 120"))]
    pub age: i32,

    /// Password (strength checked separately)
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Register response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    pub profile: Profile,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

/// Emails are matched case-insensitively
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new user
///
/// Creates the user, a trial profile with the welcome credits, the matching
/// ledger row and an `account_created` log entry in one transaction.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "name": "Jane Doe",
///   "company_name": "Doe Scripts",
///   "email": "jane@example.com",
///   "age": 27,
///   "password": "SecureP@ss123",
///   "confirm_password": "SecureP@ss123"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "user_id": "uuid",
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "profile": { "name": "Jane Doe", "plan_status": "trial", "credits_balance": 10, ... }
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    validate_body(&req)?;

    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid("password", message))?;

    let name = req.name.trim().to_string();
    let company_name = req.company_name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::invalid("name", "Name must be 1 to 100 characters"));
    }
    if company_name.is_empty() {
        return Err(ApiError::invalid(
            "company_name",
            "Company name must be 1 to 100 characters",
        ));
    }

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email: normalize_email(&req.email),
            password_hash,
        },
    )
    .await?;

    let profile = Profile::create(
        &mut *tx,
        CreateProfile {
            user_id: user.id,
            name,
            company_name,
            age: req.age,
            credits_balance: SIGNUP_CREDITS,
        },
    )
    .await?;

    CreditTransaction::create(
        &mut *tx,
        CreateCreditTransaction {
            user_id: user.id,
            amount: SIGNUP_CREDITS,
            kind: TransactionKind::Grant,
            description: "Welcome credits".to_string(),
            balance_after: SIGNUP_CREDITS,
        },
    )
    .await?;

    ActivityLog::record(
        &mut *tx,
        user.id,
        EventType::AccountCreated,
        "Account created",
    )
    .await?;

    tx.commit().await?;

    let (access_token, refresh_token) = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(Json(RegisterResponse {
        user_id: user.id,
        access_token,
        refresh_token,
        profile,
    }))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "jane@example.com",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "user_id": "uuid",
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ..."
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `422 Unprocessable Entity`: Malformed email
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    validate_body(&req)?;

    let user = User::find_by_email(&state.db, &normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;

    let (access_token, refresh_token) = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        user_id: user.id,
        access_token,
        refresh_token,
    }))
}

/// Token refresh endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/refresh
/// Content-Type: application/json
///
/// {
///   "refresh_token": "eyJ..."
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "access_token": "eyJ..."
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            name: "Jane Doe".to_string(),
            company_name: "Doe Scripts".to_string(),
            email: "jane@example.com".to_string(),
            age: 27,
            password: "SecureP@ss123".to_string(),
            confirm_password: "SecureP@ss123".to_string(),
        }
    }

    #[test]
    fn test_valid_register_request() {
        assert!(register_request().validate().is_ok());
    }

    #[test]
    fn test_age_bounds() {
        let mut req = register_request();
        req.age = 17;
        assert!(req.validate().is_err());

        req.age = 121;
        assert!(req.validate().is_err());

        req.age = 18;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_password_confirmation_must_match() {
        let mut req = register_request();
        req.confirm_password = "Different1!".to_string();

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));
    }

    #[test]
    fn test_name_length() {
        let mut req = register_request();
        req.name = String::new();
        assert!(req.validate().is_err());

        req.name = "x".repeat(101);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }
}
