/// Project invite model
///
/// Invites move `pending -> accepted | declined` exactly once. At most one
/// invite per (project, receiver) may be pending or accepted at a time.

use super::id::DocId;
use crate::db::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invite lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Declined => "declined",
        }
    }

    /// Target state of a receiver's response
    pub fn from_response(accept: bool) -> Self {
        if accept {
            InviteStatus::Accepted
        } else {
            InviteStatus::Declined
        }
    }

    /// Accepted and declined admit no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InviteStatus::Pending)
    }

    /// States that block a new invite for the same (project, receiver)
    pub fn blocking() -> [InviteStatus; 2] {
        [InviteStatus::Pending, InviteStatus::Accepted]
    }
}

/// Stored invite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInvite {
    pub id: DocId,

    pub project_id: DocId,

    /// User who sent the invite
    pub sender_id: DocId,

    /// User invited to the team
    pub receiver_id: DocId,

    pub status: InviteStatus,

    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,

    /// Set when the receiver responds
    #[serde(
        default,
        with = "super::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model for ProjectInvite {
    const COLLECTION: &'static str = "project_invites";
}
