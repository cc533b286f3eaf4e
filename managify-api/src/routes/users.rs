/// User endpoint
///
/// `GET /v1/users/:user_id` returns the profile, owned projects and
/// subscription. The password hash is never serialized.

use super::{envelope, FETCHED};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use managify_shared::models::DocId;
use serde_json::{json, Value};

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = DocId::parse(&user_id)?;

    let details = state.services.accounts.get_user(user_id).await?;

    Ok(envelope(
        FETCHED,
        json!({
            "user": details.user,
            "projects": details.projects,
            "subscription": details.subscription,
        }),
    ))
}
