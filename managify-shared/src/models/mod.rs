/// Document models for Managify
///
/// Each model maps to one collection through [`Model`](crate::db::Model).
///
/// # Models
///
/// - `user`: accounts, credentials and the owned-project counter
/// - `subscription`: plan tier per user
/// - `project`: projects and their teams
/// - `invite`: project invitations and their lifecycle
/// - `log`: append-only project activity
/// - `status`, `issue`, `role`: per-project work tracking
///
/// # Example
///
/// ```
/// use managify_shared::models::{DocId, Project, ProjectDraft};
///
/// let owner = DocId::new();
/// let project = Project::from_draft(owner, ProjectDraft {
///     name: "Website".into(),
///     description: "Marketing site relaunch".into(),
///     category: "web".into(),
///     tags: vec!["frontend".into()],
/// });
///
/// assert!(project.is_member(owner));
/// assert!(project.team.is_empty());
/// ```

pub mod id;
pub mod invite;
pub mod issue;
pub mod log;
pub mod project;
pub mod role;
pub mod status;
pub mod subscription;
pub mod timestamp;
pub mod user;

pub use id::{DocId, InvalidId};
pub use invite::{InviteStatus, ProjectInvite};
pub use issue::{Issue, IssuePriority};
pub use log::ProjectLog;
pub use project::{Project, ProjectDraft};
pub use role::Role;
pub use status::Status;
pub use subscription::{PlanType, Subscription};
pub use user::{User, UserProfile};
