/// Project aggregate
///
/// Owns project documents and their team lists, and keeps each owner's
/// `project_size` counter in step with the projects they own.
///
/// # Creation
///
/// ```text
/// QuotaPolicy::authorize_project_creation   (conditional increment)
///        │ denied ──> error, nothing written
///        ▼
/// insert project ── failed ──> QuotaPolicy::release (best effort) ──> error
///        ▼
/// ActivityLog::append("Project has been created")
/// ```
///
/// The steps are not wrapped in a transaction. A crash between the quota
/// increment and the insert leaves the owner charged for a project that
/// does not exist.

use crate::auth::authorization::{require_member, require_owner_or_admin};
use crate::auth::middleware::AuthContext;
use crate::db::document::{Filter, FindOptions, SortOrder, Update};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{DocId, Project, ProjectDraft, Status, User, UserProfile};
use crate::quota::QuotaPolicy;
use super::activity::ActivityLog;
use serde::Serialize;

/// Message returned when a project is missing or hidden from the caller
const NOT_FOUND_OR_DENIED: &str = "project not found or access denied";

/// A project with its statuses and team member profiles
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetails {
    pub project: Project,
    pub statuses: Vec<Status>,
    pub members: Vec<UserProfile>,
}

#[derive(Debug, Clone)]
pub struct ProjectService {
    db: Database,
    quota: QuotaPolicy,
    logs: ActivityLog,
}

impl ProjectService {
    pub fn new(db: Database, quota: QuotaPolicy, logs: ActivityLog) -> Self {
        Self { db, quota, logs }
    }

    /// Creates a project owned by `owner_id`
    ///
    /// # Errors
    ///
    /// - `PlanLimitReached` / `NoActiveSubscription` from the quota policy,
    ///   with no writes performed
    /// - `Store` when the insert fails; the quota charge is released first
    /// - `Store` when the log append fails; the project stays created
    pub async fn create(&self, owner_id: DocId, draft: ProjectDraft) -> ServiceResult<Project> {
        let grant = self.quota.authorize_project_creation(owner_id).await?;

        let project = Project::from_draft(owner_id, draft);

        if let Err(e) = self.db.collection::<Project>().insert_one(&project).await {
            tracing::error!(owner_id = %owner_id, error = %e, "Project insert failed, releasing quota");

            if let Err(release_err) = self.quota.release(owner_id).await {
                tracing::warn!(
                    owner_id = %owner_id,
                    error = %release_err,
                    "Quota compensation failed, project_size overcounts by one"
                );
            }

            return Err(e.into());
        }

        tracing::info!(
            project_id = %project.id,
            owner_id = %owner_id,
            project_size = grant.project_size,
            "Project created"
        );

        self.logs
            .append(project.id, owner_id, "Project has been created")
            .await?;

        Ok(project)
    }

    /// Deletes a project as its owner or an admin
    ///
    /// The owner's counter is decremented afterwards on a best-effort basis.
    pub async fn delete(&self, project_id: DocId, requester: &AuthContext) -> ServiceResult<()> {
        let project = self.find(project_id).await?;

        require_owner_or_admin(&project, requester)?;

        let deleted = self
            .db
            .collection::<Project>()
            .delete_one(&Filter::id(project_id))
            .await?;

        // Lost a race with a concurrent delete; that caller released the slot
        if deleted == 0 {
            return Err(ServiceError::not_found("project"));
        }

        if let Err(e) = self.quota.release(project.owner_id).await {
            tracing::warn!(
                project_id = %project_id,
                owner_id = %project.owner_id,
                error = %e,
                "Failed to decrement project_size after delete"
            );
        }

        tracing::info!(project_id = %project_id, requester = %requester.user_id, "Project deleted");
        Ok(())
    }

    /// Returns a project visible to `requester`
    ///
    /// Absence and lack of access look the same to the caller.
    pub async fn get(&self, project_id: DocId, requester: DocId) -> ServiceResult<Project> {
        let project = self
            .db
            .collection::<Project>()
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| ServiceError::forbidden(NOT_FOUND_OR_DENIED))?;

        if !project.is_member(requester) {
            return Err(ServiceError::forbidden(NOT_FOUND_OR_DENIED));
        }

        Ok(project)
    }

    /// Project plus its statuses and member profiles
    ///
    /// Statuses and members are fetched concurrently. A failed status query
    /// fails the request; a failed member lookup yields an empty list.
    pub async fn details(&self, project_id: DocId, requester: DocId) -> ServiceResult<ProjectDetails> {
        let project = self.get(project_id, requester).await?;

        let status_filter = Filter::eq("project_id", project_id);
        let status_order = FindOptions::default().sort_by("created_at", SortOrder::Ascending);
        let member_filter = Filter::is_in("id", project.team.iter());

        let status_collection = self.db.collection::<Status>();
        let user_collection = self.db.collection::<User>();

        let (statuses, members) = futures::join!(
            status_collection.find(&status_filter, &status_order),
            user_collection.find_all(&member_filter),
        );

        let members = members.unwrap_or_else(|e| {
            tracing::warn!(project_id = %project_id, error = %e, "Member lookup failed");
            Vec::new()
        });

        Ok(ProjectDetails {
            project,
            statuses: statuses?,
            members: members.iter().map(UserProfile::from).collect(),
        })
    }

    /// Membership predicate: owner or on the team
    ///
    /// A missing project has no members.
    pub async fn is_user_in_project(&self, user_id: DocId, project_id: DocId) -> ServiceResult<bool> {
        let project = self.db.collection::<Project>().find_by_id(project_id).await?;
        Ok(project.is_some_and(|p| p.is_member(user_id)))
    }

    /// Loads a project and checks that `user_id` belongs to it
    ///
    /// # Errors
    ///
    /// - `NotFound` when the project does not exist
    /// - `Forbidden` when the user is not a member
    pub async fn require_member(&self, project_id: DocId, user_id: DocId) -> ServiceResult<Project> {
        let project = self.find(project_id).await?;
        require_member(&project, user_id)?;
        Ok(project)
    }

    /// Loads a project or fails with `NotFound`
    pub async fn find(&self, project_id: DocId) -> ServiceResult<Project> {
        self.db
            .collection::<Project>()
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("project"))
    }

    /// Projects owned by the user or shared with them
    pub async fn for_member(&self, user_id: DocId) -> ServiceResult<Vec<Project>> {
        let projects = self.db.collection::<Project>();

        let owned_filter = Filter::eq("owner_id", user_id);
        let joined_filter = Filter::contains("team", user_id);

        let (owned, joined) = futures::try_join!(
            projects.find_all(&owned_filter),
            projects.find_all(&joined_filter),
        )?;

        Ok(owned.into_iter().chain(joined).collect())
    }

    /// Adds a user to the team; idempotent
    ///
    /// Returns whether the team changed. The owner is never added.
    pub async fn add_team_member(&self, project_id: DocId, user_id: DocId) -> ServiceResult<bool> {
        let project = self.find(project_id).await?;
        if project.is_owner(user_id) {
            return Ok(false);
        }

        let result = self
            .db
            .collection::<Project>()
            .update_one(&Filter::id(project_id), &Update::new().add_to_set("team", user_id))
            .await?;

        if result.matched == 0 {
            return Err(ServiceError::not_found("project"));
        }

        Ok(result.modified > 0)
    }

    /// Removes a member from every project the owner owns; idempotent
    ///
    /// Returns the number of projects whose team changed.
    pub async fn remove_team_member(&self, owner_id: DocId, member_id: DocId) -> ServiceResult<u64> {
        let result = self
            .db
            .collection::<Project>()
            .update_many(
                &Filter::eq("owner_id", owner_id).and(Filter::contains("team", member_id)),
                &Update::new().pull("team", member_id),
            )
            .await?;

        tracing::info!(
            owner_id = %owner_id,
            member_id = %member_id,
            projects = result.modified,
            "Team member removed"
        );

        Ok(result.modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{PlanType, Subscription};

    struct Fixture {
        db: Database,
        projects: ProjectService,
        logs: ActivityLog,
    }

    fn fixture() -> Fixture {
        let db = Database::memory();
        let logs = ActivityLog::new(db.clone());
        let projects = ProjectService::new(db.clone(), QuotaPolicy::new(db.clone()), logs.clone());
        Fixture { db, projects, logs }
    }

    async fn user(db: &Database, name: &str, plan: PlanType) -> DocId {
        let user = User::new(name.into(), format!("{}@x.com", name), "hash".into(), "tok".into());
        db.collection::<User>().insert_one(&user).await.unwrap();

        let mut subscription = Subscription::basic_for(user.id);
        subscription.plan_type = plan;
        db.collection::<Subscription>().insert_one(&subscription).await.unwrap();
        user.id
    }

    fn draft(name: &str) -> ProjectDraft {
        ProjectDraft {
            name: name.into(),
            description: "desc".into(),
            category: "web".into(),
            tags: vec!["t".into()],
        }
    }

    fn ctx(user_id: DocId, is_admin: bool) -> AuthContext {
        AuthContext {
            user_id,
            name: "x".into(),
            email: "x@x.com".into(),
            is_admin,
        }
    }

    async fn project_size(db: &Database, user_id: DocId) -> i64 {
        User::find_by_id(db, user_id).await.unwrap().unwrap().project_size
    }

    #[tokio::test]
    async fn test_fourth_basic_project_is_rejected() {
        let f = fixture();
        let owner = user(&f.db, "ada", PlanType::Basic).await;

        for name in ["P1", "P2", "P3"] {
            f.projects.create(owner, draft(name)).await.unwrap();
        }

        let err = f.projects.create(owner, draft("P4")).await.unwrap_err();
        assert!(matches!(err, ServiceError::PlanLimitReached));
        assert_eq!(project_size(&f.db, owner).await, 3);
        assert_eq!(
            f.db.collection::<Project>().count(&Filter::eq("owner_id", owner)).await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_project_size_tracks_creates_minus_deletes() {
        let f = fixture();
        let owner = user(&f.db, "ada", PlanType::Pro).await;

        let mut created = Vec::new();
        for i in 0..5 {
            created.push(f.projects.create(owner, draft(&format!("P{}", i))).await.unwrap());
        }
        for project in &created[..2] {
            f.projects.delete(project.id, &ctx(owner, false)).await.unwrap();
        }

        assert_eq!(project_size(&f.db, owner).await, 3);
    }

    #[tokio::test]
    async fn test_create_logs_activity() {
        let f = fixture();
        let owner = user(&f.db, "ada", PlanType::Basic).await;

        let project = f.projects.create(owner, draft("P")).await.unwrap();
        let entries = f.logs.by_project(project.id).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Project has been created");
        assert_eq!(entries[0].user_id, owner);
    }

    #[tokio::test]
    async fn test_delete_requires_owner_or_admin() {
        let f = fixture();
        let owner = user(&f.db, "ada", PlanType::Basic).await;
        let project = f.projects.create(owner, draft("P")).await.unwrap();

        let err = f.projects.delete(project.id, &ctx(DocId::new(), false)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        f.projects.delete(project.id, &ctx(DocId::new(), true)).await.unwrap();
        assert_eq!(project_size(&f.db, owner).await, 0);

        let err = f.projects.delete(project.id, &ctx(owner, false)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_get_hides_existence_from_strangers() {
        let f = fixture();
        let owner = user(&f.db, "ada", PlanType::Basic).await;
        let project = f.projects.create(owner, draft("P")).await.unwrap();

        assert_eq!(f.projects.get(project.id, owner).await.unwrap().id, project.id);

        let hidden = f.projects.get(project.id, DocId::new()).await.unwrap_err();
        let missing = f.projects.get(DocId::new(), owner).await.unwrap_err();
        assert_eq!(hidden.to_string(), missing.to_string());
        assert_eq!(hidden.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_team_membership_is_idempotent() {
        let f = fixture();
        let owner = user(&f.db, "ada", PlanType::Basic).await;
        let member = user(&f.db, "bob", PlanType::Basic).await;
        let project = f.projects.create(owner, draft("P")).await.unwrap();

        assert!(f.projects.add_team_member(project.id, member).await.unwrap());
        assert!(!f.projects.add_team_member(project.id, member).await.unwrap());
        assert!(!f.projects.add_team_member(project.id, owner).await.unwrap());

        let stored = f.projects.find(project.id).await.unwrap();
        assert_eq!(stored.team, vec![member]);
        assert!(f.projects.is_user_in_project(member, project.id).await.unwrap());
        assert!(f.projects.is_user_in_project(owner, project.id).await.unwrap());
        assert!(!f.projects.is_user_in_project(DocId::new(), project.id).await.unwrap());

        let details = f.projects.details(project.id, member).await.unwrap();
        assert_eq!(details.members.len(), 1);
        assert_eq!(details.members[0].id, member);

        assert_eq!(f.projects.for_member(member).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_member_from_all_owned_projects() {
        let f = fixture();
        let owner = user(&f.db, "ada", PlanType::Basic).await;
        let member = user(&f.db, "bob", PlanType::Basic).await;

        let p1 = f.projects.create(owner, draft("P1")).await.unwrap();
        let p2 = f.projects.create(owner, draft("P2")).await.unwrap();
        f.projects.add_team_member(p1.id, member).await.unwrap();
        f.projects.add_team_member(p2.id, member).await.unwrap();

        assert_eq!(f.projects.remove_team_member(owner, member).await.unwrap(), 2);
        assert_eq!(f.projects.remove_team_member(owner, member).await.unwrap(), 0);
        assert!(!f.projects.is_user_in_project(member, p1.id).await.unwrap());
    }
}
