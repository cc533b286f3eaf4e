/// Administrative queries
///
/// Callers must check the admin claim before reaching this service.

use crate::db::document::{Filter, FindOptions, SortOrder};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{DocId, Project, Role, User, UserProfile};

/// Users returned by [`AdminService::list_users`]
pub const USER_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct AdminService {
    db: Database,
}

impl AdminService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<UserProfile>> {
        let users = self
            .db
            .collection::<User>()
            .find(
                &Filter::All,
                &FindOptions::default()
                    .sort_by("created_at", SortOrder::Ascending)
                    .limit(USER_LIST_LIMIT),
            )
            .await?;

        Ok(users.iter().map(UserProfile::from).collect())
    }

    pub async fn get_user(&self, user_id: DocId) -> ServiceResult<UserProfile> {
        User::find_by_id(&self.db, user_id)
            .await?
            .map(|user| user.profile())
            .ok_or_else(|| ServiceError::not_found("user"))
    }

    /// Deletes the user document only; owned projects are left in place
    pub async fn delete_user(&self, user_id: DocId) -> ServiceResult<()> {
        let deleted = self.db.collection::<User>().delete_one(&Filter::id(user_id)).await?;

        if deleted == 0 {
            return Err(ServiceError::not_found("user"));
        }

        tracing::warn!(user_id = %user_id, "User deleted by admin");
        Ok(())
    }

    pub async fn list_projects(&self) -> ServiceResult<Vec<Project>> {
        Ok(self.db.collection::<Project>().find_all(&Filter::All).await?)
    }

    pub async fn list_roles(&self) -> ServiceResult<Vec<Role>> {
        Ok(self.db.collection::<Role>().find_all(&Filter::All).await?)
    }
}
