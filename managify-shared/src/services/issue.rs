/// Issues
///
/// Every issue sits in a status of its own project. Any project member may
/// create, move or delete issues.

use crate::db::document::{Filter, FindOptions, SortOrder, Update};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{DocId, Issue, IssuePriority};
use super::activity::ActivityLog;
use super::project::ProjectService;
use super::status::StatusService;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Longest accepted issue title
pub const MAX_TITLE_LEN: usize = 200;

/// Default look-ahead of [`IssueService::upcoming`]
pub const DEFAULT_UPCOMING_DAYS: i64 = 7;

/// Caller-supplied fields of a new issue
#[derive(Debug, Clone, Deserialize)]
pub struct IssueDraft {
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub status_id: DocId,

    pub project_id: DocId,

    #[serde(default)]
    pub priority: IssuePriority,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub assigned_id: Option<DocId>,
}

#[derive(Debug, Clone)]
pub struct IssueService {
    db: Database,
    projects: ProjectService,
    statuses: StatusService,
    logs: ActivityLog,
}

impl IssueService {
    pub fn new(
        db: Database,
        projects: ProjectService,
        statuses: StatusService,
        logs: ActivityLog,
    ) -> Self {
        Self {
            db,
            projects,
            statuses,
            logs,
        }
    }

    /// Creates an issue in one of the project's statuses
    ///
    /// # Errors
    ///
    /// - `NotFound` when the project does not exist
    /// - `Forbidden` when the requester is not a member
    /// - `InvalidInput` for a blank title, a foreign status, or an assignee
    ///   outside the project
    pub async fn create(&self, requester: DocId, draft: IssueDraft) -> ServiceResult<Issue> {
        let title = draft.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(ServiceError::invalid("title must be between 1 and 200 characters"));
        }

        let project = self.projects.require_member(draft.project_id, requester).await?;

        if !self.statuses.is_status_in_project(draft.status_id, draft.project_id).await? {
            return Err(ServiceError::invalid("status does not belong to this project"));
        }

        if let Some(assignee) = draft.assigned_id {
            if !project.is_member(assignee) {
                return Err(ServiceError::invalid("assignee is not a member of this project"));
            }
        }

        let issue = Issue {
            id: DocId::new(),
            title: title.to_string(),
            description: draft.description,
            status_id: draft.status_id,
            project_id: draft.project_id,
            priority: draft.priority,
            due_date: draft.due_date,
            tags: draft.tags,
            assigned_id: draft.assigned_id,
            created_at: Utc::now(),
        };

        self.db.collection::<Issue>().insert_one(&issue).await?;

        self.logs
            .append(issue.project_id, requester, format!("Issue has been created -> {}", issue.title))
            .await?;

        Ok(issue)
    }

    pub async fn delete(&self, requester: DocId, issue_id: DocId) -> ServiceResult<()> {
        let issue = self.find(issue_id).await?;
        self.projects.require_member(issue.project_id, requester).await?;

        self.db.collection::<Issue>().delete_one(&Filter::id(issue_id)).await?;
        Ok(())
    }

    /// Issues in a status, oldest first
    pub async fn by_status(&self, requester: DocId, status_id: DocId) -> ServiceResult<Vec<Issue>> {
        let status = self.statuses.find(status_id).await?;
        self.projects.require_member(status.project_id, requester).await?;

        let issues = self
            .db
            .collection::<Issue>()
            .find(
                &Filter::eq("status_id", status_id),
                &FindOptions::default().sort_by("created_at", SortOrder::Ascending),
            )
            .await?;

        Ok(issues)
    }

    /// Moves an issue to another status of the same project
    pub async fn update_status(
        &self,
        requester: DocId,
        issue_id: DocId,
        status_id: DocId,
    ) -> ServiceResult<Issue> {
        let mut issue = self.find(issue_id).await?;
        self.projects.require_member(issue.project_id, requester).await?;

        let status = self.statuses.find(status_id).await?;
        if status.project_id != issue.project_id {
            return Err(ServiceError::invalid("status does not belong to this project"));
        }

        self.db
            .collection::<Issue>()
            .update_one(&Filter::id(issue_id), &Update::new().set("status_id", status_id))
            .await?;
        issue.status_id = status_id;

        self.logs
            .append(
                issue.project_id,
                requester,
                format!("Issue status has been updated -> {}", status.name),
            )
            .await?;

        Ok(issue)
    }

    /// Issues due within the next `days` days in the requester's projects
    ///
    /// Sorted by due date, soonest first.
    pub async fn upcoming(&self, requester: DocId, days: i64) -> ServiceResult<Vec<Issue>> {
        if days <= 0 {
            return Err(ServiceError::invalid("days must be positive"));
        }

        let projects = self.projects.for_member(requester).await?;
        if projects.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let horizon = now + Duration::days(days);

        let mut issues: Vec<Issue> = self
            .db
            .collection::<Issue>()
            .find_all(&Filter::is_in("project_id", projects.iter().map(|p| p.id)))
            .await?
            .into_iter()
            .filter(|issue| issue.due_date.is_some_and(|due| due >= now && due <= horizon))
            .collect();

        issues.sort_by_key(|issue| issue.due_date);
        Ok(issues)
    }

    async fn find(&self, issue_id: DocId) -> ServiceResult<Issue> {
        self.db
            .collection::<Issue>()
            .find_by_id(issue_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("issue"))
    }
}
