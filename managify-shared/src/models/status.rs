/// Issue status model
///
/// Statuses are per-project columns that issues move between.

use super::id::DocId;
use crate::db::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: DocId,

    pub project_id: DocId,

    /// User who created the status
    pub creator_id: DocId,

    pub name: String,

    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "super::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Model for Status {
    const COLLECTION: &'static str = "status";
}
