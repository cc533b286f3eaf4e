/// Project activity log
///
/// Append-only audit trail. Entries are never updated or deleted.
/// A failed append is returned to the caller as-is; whatever the caller
/// already committed stays committed.

use crate::db::document::{Filter, FindOptions, SortOrder};
use crate::db::Database;
use crate::error::ServiceResult;
use crate::models::{DocId, ProjectLog};
use chrono::Utc;

/// Entries returned for a user's recent activity
pub const RECENT_LOG_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct ActivityLog {
    db: Database,
}

impl ActivityLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Records an action within a project
    pub async fn append(
        &self,
        project_id: DocId,
        user_id: DocId,
        message: impl Into<String>,
    ) -> ServiceResult<ProjectLog> {
        let entry = ProjectLog {
            id: DocId::new(),
            project_id,
            user_id,
            message: message.into(),
            timestamp: Utc::now(),
        };

        self.db.collection::<ProjectLog>().insert_one(&entry).await?;

        tracing::debug!(
            project_id = %project_id,
            user_id = %user_id,
            message = %entry.message,
            "Activity logged"
        );

        Ok(entry)
    }

    /// All entries of a project, oldest first
    pub async fn by_project(&self, project_id: DocId) -> ServiceResult<Vec<ProjectLog>> {
        let entries = self
            .db
            .collection::<ProjectLog>()
            .find(
                &Filter::eq("project_id", project_id),
                &FindOptions::default().sort_by("timestamp", SortOrder::Ascending),
            )
            .await?;

        Ok(entries)
    }

    /// A user's most recent entries, newest first
    pub async fn by_user(&self, user_id: DocId, limit: usize) -> ServiceResult<Vec<ProjectLog>> {
        let entries = self
            .db
            .collection::<ProjectLog>()
            .find(
                &Filter::eq("user_id", user_id),
                &FindOptions::default()
                    .sort_by("timestamp", SortOrder::Descending)
                    .limit(limit),
            )
            .await?;

        Ok(entries)
    }
}
