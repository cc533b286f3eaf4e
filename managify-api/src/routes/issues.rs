/// Issue endpoints
///
/// - `POST   /v1/issues`
/// - `GET    /v1/issues/status/:status_id`
/// - `GET    /v1/issues/upcoming?days=7`
/// - `DELETE /v1/issues/:issue_id`
/// - `PUT    /v1/issues/:issue_id/status/:status_id`

use super::{envelope, ApiJson, CREATED, DELETED, FETCHED, UPDATED};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use managify_shared::{
    auth::middleware::AuthContext,
    models::DocId,
    services::issue::{IssueDraft, DEFAULT_UPCOMING_DAYS},
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

/// Creates an issue in a status of the given project
///
/// ```text
/// POST /v1/issues
///
/// {
///   "title": "Fix login",
///   "status_id": "…",
///   "project_id": "…",
///   "priority": "high",
///   "due_date": "2026-01-31T00:00:00Z"
/// }
/// ```
pub async fn create_issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(draft): ApiJson<IssueDraft>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let issue = state.services.issues.create(auth.user_id, draft).await?;

    Ok((StatusCode::CREATED, envelope(CREATED, json!({ "issue": issue }))))
}

pub async fn issues_by_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(status_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let status_id = DocId::parse(&status_id)?;

    let issues = state.services.issues.by_status(auth.user_id, status_id).await?;

    Ok(envelope(FETCHED, json!({ "issues": issues })))
}

/// Issues due within `days` (default 7) in the caller's projects
pub async fn upcoming_issues(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Json<Value>> {
    let days = query.days.unwrap_or(DEFAULT_UPCOMING_DAYS);

    let issues = state.services.issues.upcoming(auth.user_id, days).await?;

    Ok(envelope(FETCHED, json!({ "issues": issues })))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(issue_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let issue_id = DocId::parse(&issue_id)?;

    state.services.issues.delete(auth.user_id, issue_id).await?;

    Ok(envelope(DELETED, Value::Null))
}

pub async fn update_issue_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((issue_id, status_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let issue_id = DocId::parse(&issue_id)?;
    let status_id = DocId::parse(&status_id)?;

    let issue = state
        .services
        .issues
        .update_status(auth.user_id, issue_id, status_id)
        .await?;

    Ok(envelope(UPDATED, json!({ "issue": issue })))
}
