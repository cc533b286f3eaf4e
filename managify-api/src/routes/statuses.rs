/// Status endpoints
///
/// - `POST   /v1/statuses` - Add a status column to a project
/// - `DELETE /v1/statuses/:project_id/:status_id`

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
pub struct CreateStatusRequest {
    #[validate(length(min = 1, message = "Project ID is required"))]
    pub project_id: String,

    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
}

pub async fn create_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateStatusRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    req.validate()?;
    let project_id = DocId::parse(&req.project_id)?;

    let status = state
        .services
        .statuses
        .create(auth.user_id, project_id, &req.name)
        .await?;

    Ok((StatusCode::CREATED, envelope(CREATED, json!({ "status": status }))))
}

pub async fn delete_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, status_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let project_id = DocId::parse(&project_id)?;
    let status_id = DocId::parse(&status_id)?;

    state
        .services
        .statuses
        .delete(auth.user_id, project_id, status_id)
        .await?;

    Ok(envelope(DELETED, Value::Null))
}
