/// Authorization checks
///
/// Managify has two levels of access control:
///
/// 1. **Admin**: the `is_admin` claim unlocks the admin endpoints and lets
///    an admin delete any project
/// 2. **Project membership**: owner or team member, checked against the
///    project document itself
///
/// # Example
///
/// ```
/// use managify_shared::auth::authorization::{require_member, require_owner};
/// use managify_shared::models::{DocId, Project, ProjectDraft};
///
/// let owner = DocId::new();
/// let project = Project::from_draft(owner, ProjectDraft::default());
///
/// assert!(require_owner(&project, owner).is_ok());
/// assert!(require_member(&project, DocId::new()).is_err());
/// ```

use super::middleware::AuthContext;
use crate::error::ServiceError;
use crate::models::{DocId, Project};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("Admin privileges required")]
    NotAdmin,

    /// Caller is neither owner nor on the team
    #[error("You are not a member of this project")]
    NotMember,

    #[error("You are not owner")]
    NotOwner,
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        ServiceError::Forbidden(err.to_string())
    }
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if !auth.is_admin {
        return Err(AuthzError::NotAdmin);
    }

    Ok(())
}

/// Requires the user to be the owner or a team member
pub fn require_member(project: &Project, user_id: DocId) -> Result<(), AuthzError> {
    if !project.is_member(user_id) {
        return Err(AuthzError::NotMember);
    }

    Ok(())
}

pub fn require_owner(project: &Project, user_id: DocId) -> Result<(), AuthzError> {
    if !project.is_owner(user_id) {
        return Err(AuthzError::NotOwner);
    }

    Ok(())
}

/// Owner, or any admin
pub fn require_owner_or_admin(project: &Project, auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin {
        return Ok(());
    }

    require_owner(project, auth.user_id)
}
