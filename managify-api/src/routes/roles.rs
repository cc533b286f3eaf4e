/// Role endpoints
///
/// - `POST   /v1/roles` - Owner assigns a role to a project member
/// - `DELETE /v1/roles/:role_id`

use super::{envelope, ApiJson, CREATED, DELETED};
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

#[derive(Debug, Deserialize, Validate)]
pub struct AddRoleRequest {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,

    #[validate(length(min = 1, message = "Project ID is required"))]
    pub project_id: String,

    #[validate(length(min = 1, max = 50, message = "Role must be between 1 and 50 characters"))]
    pub role: String,
}

/// # Errors
///
/// - `403 Forbidden`: "You are not owner"
/// - `400 Bad Request`: the target user is not a project member
pub async fn add_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<AddRoleRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    req.validate()?;
    let user_id = DocId::parse(&req.user_id)?;
    let project_id = DocId::parse(&req.project_id)?;

    let role = state
        .services
        .roles
        .add(auth.user_id, user_id, project_id, &req.role)
        .await?;

    Ok((StatusCode::CREATED, envelope(CREATED, json!({ "role": role }))))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(role_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let role_id = DocId::parse(&role_id)?;

    state.services.roles.delete(auth.user_id, role_id).await?;

    Ok(envelope(DELETED, Value::Null))
}
