/// Authentication endpoints
///
/// - `POST /v1/auth/register` - Register a new user on the BASIC plan
/// - `POST /v1/auth/login` - Exchange credentials for a token
/// - `GET  /v1/auth/verify-email?token=` - Confirm an e-mail address

use super::{envelope, ApiJson, COMPLETED, CREATED};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use managify_shared::services::account::NewAccount;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Full name must be between 1 and 100 characters"))]
    #[serde(alias = "fullName")]
    pub full_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked for length here and for character classes by the service
    #[validate(length(min = 6, max = 20, message = "Password must be between 6 and 20 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Verification link query
#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "full_name": "Ada Lovelace",
///   "email": "ada@example.com",
///   "password": "Secure#1"
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "message": "Resource created successfully",
///   "token": "eyJ...",
///   "userEmail": "ada@example.com",
///   "subscription": { "plan_type": "BASIC", "is_valid": true, ... }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: validation failed, weak password, or the e-mail or
///   full name is already registered
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    req.validate()?;

    let registration = state
        .services
        .accounts
        .register(NewAccount {
            full_name: req.full_name,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        envelope(
            CREATED,
            json!({
                "token": registration.token,
                "userEmail": registration.user.email,
                "subscription": registration.subscription,
            }),
        ),
    ))
}

/// Login endpoint
///
/// # Response
///
/// ```json
/// {
///   "message": "Operation completed successfully",
///   "email": "ada@example.com",
///   "name": "Ada Lovelace",
///   "token": "eyJ..."
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: unknown e-mail or wrong password
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    req.validate()?;

    let session = state.services.accounts.login(&req.email, &req.password).await?;

    Ok(envelope(
        COMPLETED,
        json!({
            "email": session.email,
            "name": session.name,
            "token": session.token,
        }),
    ))
}

/// Marks the address behind a verification token as verified
///
/// # Errors
///
/// - `400 Bad Request`: "Token missing" or "Invalid or expired token"
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> ApiResult<Json<Value>> {
    let token = query.token.unwrap_or_default();
    state.services.accounts.verify_email(&token).await?;

    Ok(envelope(COMPLETED, Value::Null))
}
