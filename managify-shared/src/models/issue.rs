/// Issue model
///
/// Issues belong to a project and sit in one of that project's statuses.

use super::id::DocId;
use crate::db::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl IssuePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePriority::Low => "low",
            IssuePriority::Medium => "medium",
            IssuePriority::High => "high",
            IssuePriority::Critical => "critical",
        }
    }
}

/// Stored issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: DocId,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Current status; always a status of `project_id`
    pub status_id: DocId,

    pub project_id: DocId,

    #[serde(default)]
    pub priority: IssuePriority,

    #[serde(
        default,
        with = "super::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Assigned member, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_id: Option<DocId>,

    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Model for Issue {
    const COLLECTION: &'static str = "issues";
}
