/// Project model
///
/// A project has exactly one owner and a team of non-owner collaborators.
/// The owner never appears in `team`; membership is "owner or in team".

use super::id::DocId;
use crate::db::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID
    pub id: DocId,

    pub name: String,

    pub description: String,

    pub category: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Owning user; charged against their project quota
    pub owner_id: DocId,

    /// Non-owner collaborators
    #[serde(default)]
    pub team: Vec<DocId>,

    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Model for Project {
    const COLLECTION: &'static str = "projects";
}

/// Caller-supplied fields of a new project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Project {
    /// Builds a project owned by `owner_id` with an empty team
    pub fn from_draft(owner_id: DocId, draft: ProjectDraft) -> Self {
        Self {
            id: DocId::new(),
            name: draft.name,
            description: draft.description,
            category: draft.category,
            tags: draft.tags,
            owner_id,
            team: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_owner(&self, user_id: DocId) -> bool {
        self.owner_id == user_id
    }

    /// Owner or team member
    pub fn is_member(&self, user_id: DocId) -> bool {
        self.is_owner(user_id) || self.team.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_predicate() {
        let owner = DocId::new();
        let member = DocId::new();
        let stranger = DocId::new();

        let mut project = Project::from_draft(owner, ProjectDraft::default());
        project.team.push(member);

        assert!(project.is_member(owner));
        assert!(project.is_member(member));
        assert!(!project.is_member(stranger));
        assert!(project.is_owner(owner));
        assert!(!project.is_owner(member));
    }
}
