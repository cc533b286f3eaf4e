/// Admin endpoints
///
/// Mounted under `/v1/admin` behind the admin guard; callers without the
/// admin claim get 403 before reaching these handlers.

use super::{envelope, DELETED, FETCHED};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use managify_shared::{auth::middleware::AuthContext, models::DocId};
use serde_json::{json, Value};

/// First 100 users, oldest first
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let users = state.services.admin.list_users().await?;
    Ok(envelope(FETCHED, json!({ "users": users })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = DocId::parse(&user_id)?;
    let user = state.services.admin.get_user(user_id).await?;
    Ok(envelope(FETCHED, json!({ "user": user })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = DocId::parse(&user_id)?;

    state.services.admin.delete_user(user_id).await?;
    tracing::info!(admin_id = %auth.user_id, user_id = %user_id, "Admin removed user");

    Ok(envelope(DELETED, Value::Null))
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let projects = state.services.admin.list_projects().await?;
    Ok(envelope(FETCHED, json!({ "projects": projects })))
}

pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let roles = state.services.admin.list_roles().await?;
    Ok(envelope(FETCHED, json!({ "roles": roles })))
}
