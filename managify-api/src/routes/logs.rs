/// Activity log endpoints
///
/// - `GET /v1/logs` - The caller's most recent entries
/// - `GET /v1/logs/project/:project_id` - All entries of a project the
///   caller belongs to, oldest first

use super::{envelope, FETCHED};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use managify_shared::{
    auth::middleware::AuthContext, models::DocId, services::activity::RECENT_LOG_LIMIT,
};
use serde_json::{json, Value};

pub async fn recent_logs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let logs = state
        .services
        .logs
        .by_user(auth.user_id, RECENT_LOG_LIMIT)
        .await?;

    Ok(envelope(FETCHED, json!({ "logs": logs })))
}

pub async fn project_logs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let project_id = DocId::parse(&project_id)?;

    state
        .services
        .projects
        .require_member(project_id, auth.user_id)
        .await?;
    let logs = state.services.logs.by_project(project_id).await?;

    Ok(envelope(FETCHED, json!({ "logs": logs })))
}
