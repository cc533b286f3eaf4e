/// Issue statuses
///
/// Per-project columns that issues move between. Only project members may
/// create or delete them.

use crate::db::document::{Filter, FindOptions, SortOrder};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{DocId, Status};
use super::activity::ActivityLog;
use super::project::ProjectService;
use chrono::Utc;

/// Longest accepted status name
pub const MAX_STATUS_NAME_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct StatusService {
    db: Database,
    projects: ProjectService,
    logs: ActivityLog,
}

impl StatusService {
    pub fn new(db: Database, projects: ProjectService, logs: ActivityLog) -> Self {
        Self { db, projects, logs }
    }

    pub async fn create(&self, requester: DocId, project_id: DocId, name: &str) -> ServiceResult<Status> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid("name is required"));
        }
        if name.chars().count() > MAX_STATUS_NAME_LEN {
            return Err(ServiceError::invalid("name must be at most 100 characters"));
        }

        self.projects.require_member(project_id, requester).await?;

        let now = Utc::now();
        let status = Status {
            id: DocId::new(),
            project_id,
            creator_id: requester,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.db.collection::<Status>().insert_one(&status).await?;

        self.logs
            .append(project_id, requester, format!("Status has been added -> {}", status.name))
            .await?;

        Ok(status)
    }

    pub async fn delete(&self, requester: DocId, project_id: DocId, status_id: DocId) -> ServiceResult<()> {
        self.projects.require_member(project_id, requester).await?;

        let deleted = self
            .db
            .collection::<Status>()
            .delete_one(&Filter::id(status_id).and(Filter::eq("project_id", project_id)))
            .await?;

        if deleted == 0 {
            return Err(ServiceError::not_found("status"));
        }

        Ok(())
    }

    /// Statuses of a project in creation order
    pub async fn by_project(&self, project_id: DocId) -> ServiceResult<Vec<Status>> {
        let statuses = self
            .db
            .collection::<Status>()
            .find(
                &Filter::eq("project_id", project_id),
                &FindOptions::default().sort_by("created_at", SortOrder::Ascending),
            )
            .await?;

        Ok(statuses)
    }

    pub async fn is_status_in_project(&self, status_id: DocId, project_id: DocId) -> ServiceResult<bool> {
        let count = self
            .db
            .collection::<Status>()
            .count(&Filter::id(status_id).and(Filter::eq("project_id", project_id)))
            .await?;

        Ok(count > 0)
    }

    /// Loads a status or fails with `NotFound`
    pub async fn find(&self, status_id: DocId) -> ServiceResult<Status> {
        self.db
            .collection::<Status>()
            .find_by_id(status_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("status"))
    }
}
