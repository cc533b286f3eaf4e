/// Project endpoints
///
/// - `POST   /v1/projects` - Create a project (plan quota applies)
/// - `GET    /v1/projects/:project_id` - Project with statuses and members
/// - `DELETE /v1/projects/:project_id` - Delete as owner or admin
/// - `DELETE /v1/projects/member/:member_id` - Remove a member from every
///   project the caller owns

use super::{envelope, ApiJson, CREATED, DELETED, FETCHED};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use managify_shared::{
    auth::middleware::AuthContext,
    models::{DocId, ProjectDraft},
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 500, message = "Description must be between 1 and 500 characters"))]
    pub description: String,

    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,

    #[validate(length(min = 1, message = "At least one tag is required"))]
    pub tags: Vec<String>,
}

impl CreateProjectRequest {
    /// Strips surrounding whitespace from the name so blank names fail validation
    fn trimmed(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self
    }
}

impl From<CreateProjectRequest> for ProjectDraft {
    fn from(req: CreateProjectRequest) -> Self {
        ProjectDraft {
            name: req.name,
            description: req.description,
            category: req.category,
            tags: req.tags,
        }
    }
}

/// Creates a project owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: validation failed, "plan limit reached" or
///   "no active subscription"; nothing is written in these cases
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let req = req.trimmed();
    req.validate()?;

    let project = state
        .services
        .projects
        .create(auth.user_id, req.into())
        .await?;

    Ok((StatusCode::CREATED, envelope(CREATED, json!({ "project": project }))))
}

/// Returns `{ project, statuses, members }`
///
/// Missing projects and projects the caller cannot see both answer 403.
pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let project_id = DocId::parse(&project_id)?;

    let details = state
        .services
        .projects
        .details(project_id, auth.user_id)
        .await?;

    Ok(envelope(
        FETCHED,
        json!({
            "project": details.project,
            "statuses": details.statuses,
            "members": details.members,
        }),
    ))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let project_id = DocId::parse(&project_id)?;

    state.services.projects.delete(project_id, &auth).await?;

    Ok(envelope(DELETED, Value::Null))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(member_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let member_id = DocId::parse(&member_id)?;

    let updated = state
        .services
        .projects
        .remove_team_member(auth.user_id, member_id)
        .await?;

    Ok(envelope(DELETED, json!({ "projects_updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tags: Vec<String>) -> CreateProjectRequest {
        CreateProjectRequest {
            name: "Website".to_string(),
            description: "Marketing site relaunch".to_string(),
            category: "web".to_string(),
            tags,
        }
    }

    #[test]
    fn test_create_project_validation() {
        assert!(request(vec!["frontend".to_string()]).validate().is_ok());

        let errors = request(Vec::new()).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("tags"));

        let mut long_name = request(vec!["x".to_string()]);
        long_name.name = "n".repeat(101);
        assert!(long_name.validate().is_err());
    }

    #[test]
    fn test_blank_name_rejected_after_trim() {
        let mut blank = request(vec!["x".to_string()]);
        blank.name = "   ".to_string();

        let errors = blank.trimmed().validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));

        let mut padded = request(vec!["x".to_string()]);
        padded.name = "  Website  ".to_string();
        let draft = ProjectDraft::from(padded.trimmed());
        assert_eq!(draft.name, "Website");
    }
}
