/// Invite endpoints
///
/// - `POST /v1/invites` - Invite a registered user to a project
/// - `GET  /v1/invites` - Invites received by the caller
/// - `PUT  /v1/invites/:invite_id/respond` - Accept or decline
///
/// Creating an invite that is already pending or accepted answers 200 with
/// the existing invite and `created: false` instead of 201.

use super::{envelope, ApiJson, CREATED, FETCHED, UPDATED};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use managify_shared::{auth::middleware::AuthContext, models::DocId};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

const ALREADY_SENT: &str = "invite already sent";

/// Create invite request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInviteRequest {
    #[validate(length(min = 1, message = "Project ID is required"))]
    pub project_id: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Respond invite request
#[derive(Debug, Deserialize)]
pub struct RespondInviteRequest {
    pub accept: bool,
}

/// # Errors
///
/// - `400 Bad Request`: malformed body, or the receiver is already a member
/// - `403 Forbidden`: the caller is not a member of the project
/// - `404 Not Found`: unknown receiver e-mail or project
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    req.validate()?;
    let project_id = DocId::parse(&req.project_id)?;

    let outcome = state
        .services
        .invites
        .create(auth.user_id, &req.email, project_id)
        .await?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, CREATED)
    } else {
        (StatusCode::OK, ALREADY_SENT)
    };

    Ok((
        status,
        envelope(
            message,
            json!({ "invite": outcome.invite, "created": outcome.created }),
        ),
    ))
}

pub async fn list_invites(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let invites = state.services.invites.list_for_receiver(auth.user_id).await?;

    Ok(envelope(FETCHED, json!({ "invites": invites })))
}

/// # Errors
///
/// - `404 Not Found`: "invite not found or already handled" when the invite
///   does not exist, is addressed to someone else, or was already answered
pub async fn respond_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(invite_id): Path<String>,
    ApiJson(req): ApiJson<RespondInviteRequest>,
) -> ApiResult<Json<Value>> {
    let invite_id = DocId::parse(&invite_id)?;

    let invite = state
        .services
        .invites
        .respond(auth.user_id, invite_id, req.accept)
        .await?;

    Ok(envelope(UPDATED, json!({ "invite": invite })))
}
