/// Invite state machine
///
/// ```text
///              respond(accept)
///   pending ───────────────────> accepted   (receiver joins the team)
///      │
///      └──────────────────────> declined
///              respond(decline)
/// ```
///
/// Both transitions are single conditional updates filtered on
/// `status = pending` and the receiver, so a second response, a response
/// from someone else, and a response to an unknown invite all match nothing
/// and report `NotFoundOrAlreadyHandled`.
///
/// Creation is an upsert keyed on (project, receiver, status in
/// {pending, accepted}). Concurrent invites for the same pair converge on
/// one document; later callers get the existing invite back with
/// `created = false`.
///
/// Accepting and adding the receiver to the team are separate writes. If
/// the team update fails the invite stays accepted and the error is
/// returned; nothing is rolled back.

use crate::db::document::{Filter, FindOneAndUpdateOptions, FindOptions, SortOrder, Update};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{timestamp, DocId, InviteStatus, Project, ProjectInvite, User};
use super::activity::ActivityLog;
use super::project::ProjectService;
use chrono::Utc;
use serde::Serialize;

/// Fallback names for references that no longer resolve
const UNKNOWN_PROJECT: &str = "Project";
const UNKNOWN_SENDER: &str = "Someone";
const UNKNOWN_RECEIVER: &str = "Unknown";

/// Result of [`InviteService::create`]
#[derive(Debug, Clone, Serialize)]
pub struct InviteOutcome {
    pub invite: ProjectInvite,

    /// False when an open invite for the pair already existed
    pub created: bool,
}

/// An invite joined with display names
#[derive(Debug, Clone, Serialize)]
pub struct InviteView {
    #[serde(flatten)]
    pub invite: ProjectInvite,
    pub project_name: String,
    pub sender_name: String,
    pub receiver_name: String,
}

#[derive(Debug, Clone)]
pub struct InviteService {
    db: Database,
    projects: ProjectService,
    logs: ActivityLog,
}

impl InviteService {
    pub fn new(db: Database, projects: ProjectService, logs: ActivityLog) -> Self {
        Self { db, projects, logs }
    }

    /// Invites the user registered under `receiver_email` to a project
    ///
    /// # Errors
    ///
    /// - `NotFound` when the receiver or the project does not exist
    /// - `Forbidden` when the sender is not a project member
    /// - `AlreadyMember` when the receiver is the owner or on the team
    pub async fn create(
        &self,
        sender_id: DocId,
        receiver_email: &str,
        project_id: DocId,
    ) -> ServiceResult<InviteOutcome> {
        let email = receiver_email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ServiceError::invalid("email is required"));
        }

        let receiver = User::find_by_email(&self.db, &email)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;

        let project = self.projects.require_member(project_id, sender_id).await?;

        if project.is_member(receiver.id) {
            return Err(ServiceError::AlreadyMember);
        }

        let filter = Filter::eq("project_id", project_id)
            .and(Filter::eq("receiver_id", receiver.id))
            .and(Filter::is_in(
                "status",
                InviteStatus::blocking().iter().map(|s| s.as_str()),
            ));

        let update = Update::new()
            .set_on_insert("id", DocId::new())
            .set_on_insert("sender_id", sender_id)
            .set_on_insert("status", InviteStatus::Pending.as_str())
            .set_on_insert("created_at", timestamp::format(&Utc::now()));

        let found = self
            .db
            .collection::<ProjectInvite>()
            .find_one_and_update(
                &filter,
                &update,
                FindOneAndUpdateOptions {
                    upsert: true,
                    return_after: true,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::Internal("invite upsert returned no document".into()))?;

        if found.created {
            tracing::info!(
                invite_id = %found.value.id,
                project_id = %project_id,
                receiver_id = %receiver.id,
                "Invite created"
            );

            self.logs
                .append(project_id, sender_id, format!("Invite has been sent to {}", email))
                .await?;
        } else {
            tracing::debug!(invite_id = %found.value.id, "Invite already open, returning existing");
        }

        Ok(InviteOutcome {
            invite: found.value,
            created: found.created,
        })
    }

    /// Accepts or declines a pending invite addressed to `user_id`
    ///
    /// # Errors
    ///
    /// - `NotFoundOrAlreadyHandled` when no pending invite with this id is
    ///   addressed to the user
    /// - any error from the team update or log append after an accept; the
    ///   invite remains accepted
    pub async fn respond(
        &self,
        user_id: DocId,
        invite_id: DocId,
        accept: bool,
    ) -> ServiceResult<ProjectInvite> {
        let target = InviteStatus::from_response(accept);

        let filter = Filter::id(invite_id)
            .and(Filter::eq("receiver_id", user_id))
            .and(Filter::eq("status", InviteStatus::Pending.as_str()));

        let update = Update::new()
            .set("status", target.as_str())
            .set("updated_at", timestamp::format(&Utc::now()));

        let invite = self
            .db
            .collection::<ProjectInvite>()
            .find_one_and_update(
                &filter,
                &update,
                FindOneAndUpdateOptions {
                    upsert: false,
                    return_after: true,
                },
            )
            .await?
            .ok_or(ServiceError::NotFoundOrAlreadyHandled)?
            .value;

        tracing::info!(invite_id = %invite_id, status = target.as_str(), "Invite answered");

        if target == InviteStatus::Accepted {
            if let Err(e) = self.projects.add_team_member(invite.project_id, user_id).await {
                tracing::error!(
                    invite_id = %invite_id,
                    project_id = %invite.project_id,
                    error = %e,
                    "Invite accepted but team update failed"
                );
                return Err(e);
            }

            self.logs
                .append(invite.project_id, user_id, "Invite has been accepted")
                .await?;
        }

        Ok(invite)
    }

    /// Invites addressed to the user, newest first, with display names
    ///
    /// Missing projects or users fall back to placeholder names.
    pub async fn list_for_receiver(&self, receiver_id: DocId) -> ServiceResult<Vec<InviteView>> {
        let invites = self
            .db
            .collection::<ProjectInvite>()
            .find(
                &Filter::eq("receiver_id", receiver_id),
                &FindOptions::default().sort_by("created_at", SortOrder::Descending),
            )
            .await?;

        let views = invites.into_iter().map(|invite| self.view(invite));
        futures::future::try_join_all(views).await
    }

    async fn view(&self, invite: ProjectInvite) -> ServiceResult<InviteView> {
        let projects = self.db.collection::<Project>();
        let users = self.db.collection::<User>();

        let (project, sender, receiver) = futures::try_join!(
            projects.find_by_id(invite.project_id),
            users.find_by_id(invite.sender_id),
            users.find_by_id(invite.receiver_id),
        )?;

        Ok(InviteView {
            project_name: project.map_or_else(|| UNKNOWN_PROJECT.to_string(), |p| p.name),
            sender_name: sender.map_or_else(|| UNKNOWN_SENDER.to_string(), |u| u.full_name),
            receiver_name: receiver.map_or_else(|| UNKNOWN_RECEIVER.to_string(), |u| u.full_name),
            invite,
        })
    }
}
