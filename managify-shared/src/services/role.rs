/// Project roles
///
/// Owners label their members with free-form role names.

use crate::auth::authorization::require_owner;
use crate::db::document::Filter;
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{DocId, Role};
use super::activity::ActivityLog;
use super::project::ProjectService;

/// Longest accepted role name
pub const MAX_ROLE_LEN: usize = 50;

#[derive(Debug, Clone)]
pub struct RoleService {
    db: Database,
    projects: ProjectService,
    logs: ActivityLog,
}

impl RoleService {
    pub fn new(db: Database, projects: ProjectService, logs: ActivityLog) -> Self {
        Self { db, projects, logs }
    }

    /// Assigns a role to a project member
    ///
    /// # Errors
    ///
    /// - `Forbidden` ("You are not owner") unless the requester owns the project
    /// - `InvalidInput` when the role is blank or the target is not a member
    pub async fn add(
        &self,
        requester: DocId,
        user_id: DocId,
        project_id: DocId,
        role: &str,
    ) -> ServiceResult<Role> {
        let role = role.trim();
        if role.is_empty() || role.chars().count() > MAX_ROLE_LEN {
            return Err(ServiceError::invalid("role must be between 1 and 50 characters"));
        }

        let project = self.projects.find(project_id).await?;
        require_owner(&project, requester)?;

        if !project.is_member(user_id) {
            return Err(ServiceError::invalid("user is not a member of this project"));
        }

        let role = Role {
            id: DocId::new(),
            user_id,
            project_id,
            role: role.to_string(),
        };

        self.db.collection::<Role>().insert_one(&role).await?;

        self.logs
            .append(project_id, requester, format!("Role Has Been Assigned -> {}", role.role))
            .await?;

        Ok(role)
    }

    /// Removes a role; only the project owner may do so
    pub async fn delete(&self, requester: DocId, role_id: DocId) -> ServiceResult<()> {
        let role = self
            .db
            .collection::<Role>()
            .find_by_id(role_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("role"))?;

        let project = self.projects.find(role.project_id).await?;
        require_owner(&project, requester)?;

        self.db.collection::<Role>().delete_one(&Filter::id(role_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Project, ProjectDraft};
    use crate::quota::QuotaPolicy;

    async fn setup() -> (RoleService, Project, DocId) {
        let db = Database::memory();
        let logs = ActivityLog::new(db.clone());
        let projects = ProjectService::new(db.clone(), QuotaPolicy::new(db.clone()), logs.clone());

        let member = DocId::new();
        let mut project = Project::from_draft(DocId::new(), ProjectDraft::default());
        project.team.push(member);
        db.collection::<Project>().insert_one(&project).await.unwrap();

        (RoleService::new(db, projects, logs), project, member)
    }

    #[tokio::test]
    async fn test_owner_assigns_and_deletes_roles() {
        let (roles, project, member) = setup().await;

        let role = roles.add(project.owner_id, member, project.id, "reviewer").await.unwrap();
        assert_eq!(role.role, "reviewer");

        roles.delete(project.owner_id, role.id).await.unwrap();
        let err = roles.delete(project.owner_id, role.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_only_owner_manages_roles() {
        let (roles, project, member) = setup().await;

        let err = roles.add(member, member, project.id, "lead").await.unwrap_err();
        assert_eq!(err.to_string(), "You are not owner");

        let role = roles.add(project.owner_id, member, project.id, "lead").await.unwrap();
        let err = roles.delete(member, role.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_target_must_be_member() {
        let (roles, project, _) = setup().await;

        let err = roles.add(project.owner_id, DocId::new(), project.id, "lead").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = roles.add(project.owner_id, project.owner_id, project.id, " ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
