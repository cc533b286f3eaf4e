/// Activity log entry
///
/// Immutable record of a notable action within a project.

use super::id::DocId;
use crate::db::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLog {
    pub id: DocId,

    pub project_id: DocId,

    /// Acting user
    pub user_id: DocId,

    pub message: String,

    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Model for ProjectLog {
    const COLLECTION: &'static str = "logs";
}
