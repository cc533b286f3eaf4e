/// User accounts
///
/// Registration, login, e-mail verification and profile lookup.
///
/// # Registration
///
/// 1. Validate e-mail format and password complexity
/// 2. Reject a taken e-mail or full name
/// 3. Hash the password (Argon2id, on the blocking pool)
/// 4. Insert the user with a fresh verification token
/// 5. Create a valid BASIC subscription
/// 6. Queue the verification e-mail (fire-and-forget)
///
/// # Example
///
/// ```no_run
/// use managify_shared::services::account::{AccountService, NewAccount};
///
/// # async fn example(accounts: AccountService) -> Result<(), Box<dyn std::error::Error>> {
/// let registration = accounts
///     .register(NewAccount {
///         full_name: "Ada Lovelace".into(),
///         email: "ada@example.com".into(),
///         password: "Secr3t!pw".into(),
///     })
///     .await?;
///
/// println!("token: {}", registration.token);
/// # Ok(())
/// # }
/// ```

use crate::auth::jwt::{create_token, Claims};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::db::document::{Filter, Update};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{DocId, Project, Subscription, User, UserProfile};
use crate::notify::Notifier;
use chrono::Duration;
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Lowercase e-mail address pattern
const EMAIL_PATTERN: &str = r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$";

const INVALID_CREDENTIALS: &str = "invalid email or password";

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("valid email regex"))
}

/// Whether `email` is a well-formed lowercase address
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// 32 random bytes, hex encoded
fn verification_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Token signing settings
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: Arc<str>,
    pub ttl: Duration,
}

/// Registration input
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

/// Result of a successful registration
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub token: String,
    pub user: UserProfile,
    pub subscription: Subscription,
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub email: String,
    pub name: String,
}

/// A user with their owned projects and subscription
#[derive(Debug, Clone, Serialize)]
pub struct UserDetails {
    pub user: UserProfile,
    pub projects: Vec<Project>,
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Clone)]
pub struct AccountService {
    db: Database,
    tokens: TokenSettings,
    notifier: Notifier,
}

impl AccountService {
    pub fn new(db: Database, tokens: TokenSettings, notifier: Notifier) -> Self {
        Self { db, tokens, notifier }
    }

    /// Registers a new user on the BASIC plan
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a malformed e-mail, weak password or blank name
    /// - `Conflict` when the e-mail or full name is taken
    pub async fn register(&self, account: NewAccount) -> ServiceResult<Registration> {
        let full_name = account.full_name.trim().to_string();
        let email = account.email.trim().to_lowercase();

        if full_name.is_empty() {
            return Err(ServiceError::invalid("full name is required"));
        }
        if !is_valid_email(&email) {
            return Err(ServiceError::invalid("invalid email format"));
        }
        validate_password_strength(&account.password).map_err(ServiceError::InvalidInput)?;

        let (by_email, by_name) = futures::try_join!(
            User::find_by_email(&self.db, &email),
            User::find_by_full_name(&self.db, &full_name),
        )?;
        if by_email.is_some() {
            return Err(ServiceError::Conflict("email already registered".into()));
        }
        if by_name.is_some() {
            return Err(ServiceError::Conflict("full name already taken".into()));
        }

        let password_hash = hash_blocking(account.password).await?;
        let token = verification_token();

        let user = User::new(full_name, email, password_hash, token.clone());
        self.db.collection::<User>().insert_one(&user).await?;

        let access_token = self.issue_token(&user)?;

        let subscription = Subscription::basic_for(user.id);
        self.db
            .collection::<Subscription>()
            .insert_one(&subscription)
            .await?;

        self.notifier.send_verification(&user.email, &token);

        tracing::info!(user_id = %user.id, "User registered");

        Ok(Registration {
            token: access_token,
            user: user.profile(),
            subscription,
        })
    }

    /// Checks credentials and issues an access token
    ///
    /// Unverified users get their verification e-mail queued again.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let email = email.trim().to_lowercase();

        let user = User::find_by_email(&self.db, &email)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated(INVALID_CREDENTIALS.into()))?;

        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Err(ServiceError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }

        if !user.is_verified {
            if let Some(token) = &user.verification_token {
                self.notifier.send_verification(&user.email, token);
            }
        }

        let token = self.issue_token(&user)?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(Session {
            token,
            email: user.email,
            name: user.full_name,
        })
    }

    /// Marks the owner of `token` as verified and clears the token
    pub async fn verify_email(&self, token: &str) -> ServiceResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::invalid("Token missing"));
        }

        let result = self
            .db
            .collection::<User>()
            .update_one(
                &Filter::eq("verification_token", token),
                &Update::new()
                    .set("is_verified", true)
                    .set("verification_token", Value::Null),
            )
            .await?;

        if result.matched == 0 {
            return Err(ServiceError::invalid("Invalid or expired token"));
        }

        Ok(())
    }

    /// Profile, owned projects and subscription, fetched concurrently
    pub async fn get_user(&self, user_id: DocId) -> ServiceResult<UserDetails> {
        let owned = Filter::eq("owner_id", user_id);
        let project_collection = self.db.collection::<Project>();

        let (user, projects, subscription) = futures::try_join!(
            User::find_by_id(&self.db, user_id),
            project_collection.find_all(&owned),
            Subscription::find_valid_for_user(&self.db, user_id),
        )?;

        let user = user.ok_or_else(|| ServiceError::not_found("user"))?;

        Ok(UserDetails {
            user: user.profile(),
            projects,
            subscription,
        })
    }

    fn issue_token(&self, user: &User) -> ServiceResult<String> {
        let claims = Claims::with_expiration(
            user.id,
            &user.full_name,
            &user.email,
            user.is_admin,
            self.tokens.ttl,
        );

        create_token(&claims, &self.tokens.secret)
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }
}

async fn hash_blocking(password: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

async fn verify_blocking(password: String, hash: String) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(format!("verification task failed: {}", e)))?
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::validate_token;
    use crate::error::ErrorKind;
    use crate::models::PlanType;
    use crate::notify::{LogEmailSender, NotificationPool, NotifierConfig};

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn service(db: &Database) -> (AccountService, NotificationPool) {
        let pool = NotificationPool::start(Arc::new(LogEmailSender), NotifierConfig::default());
        let tokens = TokenSettings {
            secret: Arc::from(SECRET),
            ttl: Duration::hours(1),
        };
        (AccountService::new(db.clone(), tokens, pool.notifier()), pool)
    }

    fn account(name: &str, email: &str) -> NewAccount {
        NewAccount {
            full_name: name.into(),
            email: email.into(),
            password: "Secr3t!pw".into(),
        }
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.io"));
        assert!(!is_valid_email("Ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada.example.com"));
    }

    #[test]
    fn test_verification_token_shape() {
        let token = verification_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, verification_token());
    }

    #[tokio::test]
    async fn test_register_creates_user_and_basic_subscription() {
        let db = Database::memory();
        let (accounts, _pool) = service(&db);

        let registration = accounts.register(account("Ada", " ADA@x.com")).await.unwrap();
        assert_eq!(registration.user.email, "ada@x.com");
        assert_eq!(registration.subscription.plan_type, PlanType::Basic);
        assert!(registration.subscription.is_valid);

        let claims = validate_token(&registration.token, SECRET).unwrap();
        assert_eq!(claims.sub, registration.user.id);
        assert_eq!(claims.name, "Ada");

        let stored = User::find_by_email(&db, "ada@x.com").await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("$argon2id$"));
        assert!(!stored.is_verified);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input_and_duplicates() {
        let db = Database::memory();
        let (accounts, _pool) = service(&db);

        let mut weak = account("Ada", "ada@x.com");
        weak.password = "password".into();
        assert_eq!(accounts.register(weak).await.unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(
            accounts.register(account("Ada", "not-an-email")).await.unwrap_err().kind(),
            ErrorKind::InvalidInput
        );

        accounts.register(account("Ada", "ada@x.com")).await.unwrap();
        assert_eq!(
            accounts.register(account("Other", "ada@x.com")).await.unwrap_err().kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            accounts.register(account("Ada", "other@x.com")).await.unwrap_err().kind(),
            ErrorKind::Conflict
        );
    }

    #[tokio::test]
    async fn test_login_and_verify() {
        let db = Database::memory();
        let (accounts, _pool) = service(&db);
        accounts.register(account("Ada", "ada@x.com")).await.unwrap();

        let session = accounts.login("ada@x.com", "Secr3t!pw").await.unwrap();
        assert_eq!(session.name, "Ada");

        let err = accounts.login("ada@x.com", "Wr0ng!pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        let err = accounts.login("nobody@x.com", "Secr3t!pw").await.unwrap_err();
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);

        let token = User::find_by_email(&db, "ada@x.com")
            .await
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();

        accounts.verify_email(&token).await.unwrap();
        let stored = User::find_by_email(&db, "ada@x.com").await.unwrap().unwrap();
        assert!(stored.is_verified);
        assert!(stored.verification_token.is_none());

        assert_eq!(
            accounts.verify_email(&token).await.unwrap_err().to_string(),
            "Invalid or expired token"
        );
        assert_eq!(accounts.verify_email("").await.unwrap_err().to_string(), "Token missing");
    }

    #[tokio::test]
    async fn test_get_user_details() {
        let db = Database::memory();
        let (accounts, _pool) = service(&db);
        let registration = accounts.register(account("Ada", "ada@x.com")).await.unwrap();

        let details = accounts.get_user(registration.user.id).await.unwrap();
        assert_eq!(details.user.full_name, "Ada");
        assert!(details.projects.is_empty());
        assert_eq!(details.subscription.unwrap().id, registration.subscription.id);

        assert_eq!(
            accounts.get_user(DocId::new()).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
