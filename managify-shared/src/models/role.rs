/// Project role assignment
///
/// A free-form role name given to a project member by the project owner.

use super::id::DocId;
use crate::db::Model;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: DocId,

    /// Member receiving the role
    pub user_id: DocId,

    pub project_id: DocId,

    /// Role name, e.g. "reviewer"
    pub role: String,
}

impl Model for Role {
    const COLLECTION: &'static str = "roles";
}
