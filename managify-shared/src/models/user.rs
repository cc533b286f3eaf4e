/// User model
///
/// Users own projects, belong to other users' project teams, and hold one
/// subscription that caps how many projects they may own.
///
/// `project_size` counts owned projects. Only the quota policy and project
/// deletion change it, always through single conditional updates.
///
/// # Example
///
/// ```no_run
/// use managify_shared::db::Database;
/// use managify_shared::models::User;
///
/// # async fn example(db: Database) -> Result<(), Box<dyn std::error::Error>> {
/// if let Some(user) = User::find_by_email(&db, "ada@example.com").await? {
///     println!("{} owns {} projects", user.full_name, user.project_size);
/// }
/// # Ok(())
/// # }
/// ```

use super::id::DocId;
use crate::db::document::{Filter, StoreError};
use crate::db::{Database, Model};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: DocId,

    /// Display name, unique across users
    pub full_name: String,

    /// Lowercase e-mail address, unique across users
    pub email: String,

    /// Argon2id password hash
    #[serde(rename = "password")]
    pub password_hash: String,

    /// Number of projects this user owns
    #[serde(default)]
    pub project_size: i64,

    /// Grants access to the admin endpoints
    #[serde(default)]
    pub is_admin: bool,

    /// Pending e-mail verification token; cleared once verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,

    /// Whether the e-mail address has been verified
    #[serde(default)]
    pub is_verified: bool,

    /// Registration time
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Model for User {
    const COLLECTION: &'static str = "users";
}

/// Public view of a user, without credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: DocId,
    pub full_name: String,
    pub email: String,
    pub project_size: i64,
    pub is_admin: bool,
    pub is_verified: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            project_size: user.project_size,
            is_admin: user.is_admin,
            is_verified: user.is_verified,
        }
    }
}

impl User {
    /// Builds a new unverified, non-admin user
    pub fn new(full_name: String, email: String, password_hash: String, verification_token: String) -> Self {
        Self {
            id: DocId::new(),
            full_name,
            email,
            password_hash,
            project_size: 0,
            is_admin: false,
            verification_token: Some(verification_token),
            is_verified: false,
            created_at: Utc::now(),
        }
    }

    /// Public profile of this user
    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }

    pub async fn find_by_id(db: &Database, id: DocId) -> Result<Option<Self>, StoreError> {
        db.collection::<Self>().find_by_id(id).await
    }

    pub async fn find_by_email(db: &Database, email: &str) -> Result<Option<Self>, StoreError> {
        db.collection::<Self>()
            .find_one(&Filter::eq("email", email))
            .await
    }

    pub async fn find_by_full_name(db: &Database, full_name: &str) -> Result<Option<Self>, StoreError> {
        db.collection::<Self>()
            .find_one(&Filter::eq("full_name", full_name))
            .await
    }

    pub async fn find_by_verification_token(
        db: &Database,
        token: &str,
    ) -> Result<Option<Self>, StoreError> {
        db.collection::<Self>()
            .find_one(&Filter::eq("verification_token", token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_stored_under_password_key() {
        let user = User::new("Ada".into(), "ada@x.com".into(), "$argon2id$hash".into(), "tok".into());
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["password"], "$argon2id$hash");
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["project_size"], 0);
        assert_eq!(json["verification_token"], "tok");
    }

    #[test]
    fn test_profile_hides_credentials() {
        let user = User::new("Ada".into(), "ada@x.com".into(), "hash".into(), "tok".into());
        let json = serde_json::to_value(user.profile()).unwrap();

        assert!(json.get("password").is_none());
        assert!(json.get("verification_token").is_none());
        assert_eq!(json["email"], "ada@x.com");
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let db = Database::memory();
        let user = User::new("Ada".into(), "ada@x.com".into(), "hash".into(), "tok".into());
        db.collection::<User>().insert_one(&user).await.unwrap();

        let found = User::find_by_email(&db, "ada@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(User::find_by_email(&db, "nobody@x.com").await.unwrap().is_none());
        assert!(User::find_by_verification_token(&db, "tok").await.unwrap().is_some());
    }
}
