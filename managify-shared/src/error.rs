/// Domain error taxonomy
///
/// Every service returns [`ServiceError`]. Callers at the HTTP edge map
/// [`ServiceError::kind`] to a status code; specific variants exist so
/// tests and callers can tell the invite and quota outcomes apart.

use crate::db::document::StoreError;
use crate::models::InvalidId;

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed identifiers or missing/invalid fields
    InvalidInput,

    /// Missing or invalid credentials
    Unauthenticated,

    /// Authenticated but not allowed to touch the resource
    Forbidden,

    NotFound,

    /// Business-rule rejection (plan limit, already a member)
    Conflict,

    /// Store failures and timeouts
    Internal,
}

/// Error returned by domain services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Receiver is already the owner or on the team
    #[error("user is already a member")]
    AlreadyMember,

    /// Invite does not exist, belongs to someone else, or was answered
    #[error("invite not found or already handled")]
    NotFoundOrAlreadyHandled,

    /// BASIC plan owns its maximum number of projects
    #[error("plan limit reached")]
    PlanLimitReached,

    /// User has no valid subscription
    #[error("no active subscription")]
    NoActiveSubscription,

    #[error("{0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        ServiceError::NotFound(format!("{} not found", what))
    }

    pub fn forbidden(message: &str) -> Self {
        ServiceError::Forbidden(message.to_string())
    }

    pub fn invalid(message: &str) -> Self {
        ServiceError::InvalidInput(message.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidInput(_) => ErrorKind::InvalidInput,
            ServiceError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::NotFound(_) | ServiceError::NotFoundOrAlreadyHandled => {
                ErrorKind::NotFound
            }
            ServiceError::AlreadyMember
            | ServiceError::PlanLimitReached
            | ServiceError::NoActiveSubscription
            | ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Store(_) | ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<InvalidId> for ServiceError {
    fn from(err: InvalidId) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

/// Result alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_kinds() {
        assert_eq!(ServiceError::PlanLimitReached.kind(), ErrorKind::Conflict);
        assert_eq!(ServiceError::AlreadyMember.kind(), ErrorKind::Conflict);
        assert_eq!(ServiceError::NotFoundOrAlreadyHandled.kind(), ErrorKind::NotFound);
        assert_eq!(
            ServiceError::Store(StoreError::Timeout(Duration::from_secs(5))).kind(),
            ErrorKind::Internal
        );
        assert_eq!(ServiceError::invalid("bad").kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_messages() {
        assert_eq!(ServiceError::PlanLimitReached.to_string(), "plan limit reached");
        assert_eq!(ServiceError::not_found("project").to_string(), "project not found");
        assert_eq!(
            ServiceError::NotFoundOrAlreadyHandled.to_string(),
            "invite not found or already handled"
        );
    }

    #[test]
    fn test_invalid_id_is_invalid_input() {
        let err: ServiceError = InvalidId("xyz".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
