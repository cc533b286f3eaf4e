/// Project quota enforcement
///
/// A user's valid subscription decides how many projects they may own:
///
/// | Plan | Owned projects |
/// |---|---|
/// | BASIC | 3 |
/// | PREMIUM | unlimited |
/// | PRO | unlimited |
///
/// The owned-project counter lives on the user document (`project_size`).
/// A grant increments it through one conditional update whose filter
/// re-checks the cap, so concurrent requests from the same user can never
/// push the counter past the limit even when they all read the same
/// pre-update value.
///
/// # Example
///
/// ```no_run
/// use managify_shared::db::Database;
/// use managify_shared::models::DocId;
/// use managify_shared::quota::QuotaPolicy;
///
/// # async fn example(db: Database, user_id: DocId) -> Result<(), Box<dyn std::error::Error>> {
/// let quota = QuotaPolicy::new(db);
///
/// let grant = quota.authorize_project_creation(user_id).await?;
/// println!("{} now owns {} projects", user_id, grant.project_size);
///
/// // Creation failed later on: give the slot back
/// quota.release(user_id).await?;
/// # Ok(())
/// # }
/// ```

use crate::db::document::{Filter, FindOneAndUpdateOptions, StoreError, Update};
use crate::db::Database;
use crate::error::ServiceError;
use crate::models::{DocId, PlanType, Subscription, User};
use std::fmt;

/// Field holding the owned-project counter
const PROJECT_SIZE: &str = "project_size";

/// Quota enforcement error
#[derive(Debug)]
pub enum QuotaError {
    /// The user has no valid subscription
    NoActiveSubscription,

    /// Plan cap reached
    PlanLimitReached { plan: PlanType, limit: i64 },

    /// The user document no longer exists
    UserNotFound(DocId),

    /// Store failure
    Store(StoreError),
}

impl fmt::Display for QuotaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaError::NoActiveSubscription => write!(f, "no active subscription"),
            QuotaError::PlanLimitReached { plan, limit } => write!(
                f,
                "plan limit reached ({} allows {} projects)",
                plan.as_str(),
                limit
            ),
            QuotaError::UserNotFound(id) => write!(f, "user not found: {}", id),
            QuotaError::Store(err) => write!(f, "store error: {}", err),
        }
    }
}

impl std::error::Error for QuotaError {}

impl From<StoreError> for QuotaError {
    fn from(err: StoreError) -> Self {
        QuotaError::Store(err)
    }
}

impl From<QuotaError> for ServiceError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::NoActiveSubscription => ServiceError::NoActiveSubscription,
            QuotaError::PlanLimitReached { .. } => ServiceError::PlanLimitReached,
            QuotaError::UserNotFound(_) => ServiceError::not_found("user"),
            QuotaError::Store(err) => ServiceError::Store(err),
        }
    }
}

/// A granted project slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaGrant {
    pub plan: PlanType,

    /// Owned-project counter after the increment
    pub project_size: i64,

    /// Cap of the plan, `None` when uncapped
    pub limit: Option<i64>,
}

/// Decides and charges project creation against the user's plan
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    db: Database,
}

impl QuotaPolicy {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Authorizes one more owned project and charges it
    ///
    /// On success the user's `project_size` has already been incremented;
    /// callers that fail to create the project must [`release`](Self::release)
    /// the slot.
    ///
    /// # Errors
    ///
    /// - `QuotaError::NoActiveSubscription` when no valid subscription exists
    /// - `QuotaError::PlanLimitReached` when the capped plan is full, including
    ///   when a concurrent request took the last slot between read and write
    /// - `QuotaError::UserNotFound` when the user document is gone
    pub async fn authorize_project_creation(&self, user_id: DocId) -> Result<QuotaGrant, QuotaError> {
        let subscription = Subscription::find_valid_for_user(&self.db, user_id)
            .await?
            .ok_or(QuotaError::NoActiveSubscription)?;

        let plan = subscription.plan_type;
        let limit = plan.project_limit();

        let mut filter = Filter::id(user_id);
        if let Some(limit) = limit {
            let user = User::find_by_id(&self.db, user_id)
                .await?
                .ok_or(QuotaError::UserNotFound(user_id))?;

            if user.project_size >= limit {
                return Err(QuotaError::PlanLimitReached { plan, limit });
            }

            filter = filter.and(Filter::lt(PROJECT_SIZE, limit));
        }

        let charged = self
            .db
            .collection::<User>()
            .find_one_and_update(
                &filter,
                &Update::new().inc(PROJECT_SIZE, 1),
                FindOneAndUpdateOptions {
                    upsert: false,
                    return_after: true,
                },
            )
            .await?;

        match (charged, limit) {
            (Some(found), _) => {
                tracing::debug!(
                    user_id = %user_id,
                    plan = plan.as_str(),
                    project_size = found.value.project_size,
                    "Project quota granted"
                );
                Ok(QuotaGrant {
                    plan,
                    project_size: found.value.project_size,
                    limit,
                })
            }
            // The cap filter lost a race with a concurrent grant
            (None, Some(limit)) => Err(QuotaError::PlanLimitReached { plan, limit }),
            (None, None) => Err(QuotaError::UserNotFound(user_id)),
        }
    }

    /// Gives back one owned-project slot
    pub async fn release(&self, user_id: DocId) -> Result<(), QuotaError> {
        let result = self
            .db
            .collection::<User>()
            .update_one(&Filter::id(user_id), &Update::new().inc(PROJECT_SIZE, -1))
            .await?;

        if result.matched == 0 {
            return Err(QuotaError::UserNotFound(user_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn user_with_plan(db: &Database, plan: Option<PlanType>) -> DocId {
        let user = User::new("Ada".into(), "ada@x.com".into(), "hash".into(), "tok".into());
        db.collection::<User>().insert_one(&user).await.unwrap();

        if let Some(plan) = plan {
            let mut subscription = Subscription::basic_for(user.id);
            subscription.plan_type = plan;
            db.collection::<Subscription>().insert_one(&subscription).await.unwrap();
        }

        user.id
    }

    async fn project_size(db: &Database, user_id: DocId) -> i64 {
        User::find_by_id(db, user_id).await.unwrap().unwrap().project_size
    }

    #[tokio::test]
    async fn test_basic_plan_caps_at_three() {
        let db = Database::memory();
        let user_id = user_with_plan(&db, Some(PlanType::Basic)).await;
        let quota = QuotaPolicy::new(db.clone());

        for expected in 1..=3 {
            let grant = quota.authorize_project_creation(user_id).await.unwrap();
            assert_eq!(grant.project_size, expected);
            assert_eq!(grant.limit, Some(3));
        }

        let err = quota.authorize_project_creation(user_id).await.unwrap_err();
        assert!(matches!(err, QuotaError::PlanLimitReached { limit: 3, .. }));
        assert_eq!(project_size(&db, user_id).await, 3);
    }

    #[tokio::test]
    async fn test_concurrent_grants_never_exceed_cap() {
        let db = Database::memory();
        let user_id = user_with_plan(&db, Some(PlanType::Basic)).await;
        let quota = Arc::new(QuotaPolicy::new(db.clone()));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let quota = quota.clone();
                tokio::spawn(async move { quota.authorize_project_creation(user_id).await })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }

        assert_eq!(granted, 3);
        assert_eq!(project_size(&db, user_id).await, 3);
    }

    #[tokio::test]
    async fn test_paid_plans_are_uncapped() {
        let db = Database::memory();
        let user_id = user_with_plan(&db, Some(PlanType::Premium)).await;
        let quota = QuotaPolicy::new(db.clone());

        for _ in 0..5 {
            let grant = quota.authorize_project_creation(user_id).await.unwrap();
            assert_eq!(grant.limit, None);
        }
        assert_eq!(project_size(&db, user_id).await, 5);
    }

    #[tokio::test]
    async fn test_no_subscription_is_denied_without_writes() {
        let db = Database::memory();
        let user_id = user_with_plan(&db, None).await;
        let quota = QuotaPolicy::new(db.clone());

        assert!(matches!(
            quota.authorize_project_creation(user_id).await,
            Err(QuotaError::NoActiveSubscription)
        ));
        assert_eq!(project_size(&db, user_id).await, 0);
    }

    #[tokio::test]
    async fn test_earliest_valid_subscription_wins() {
        let db = Database::memory();
        let user_id = user_with_plan(&db, Some(PlanType::Basic)).await;

        let mut pro = Subscription::basic_for(user_id);
        pro.plan_type = PlanType::Pro;
        db.collection::<Subscription>().insert_one(&pro).await.unwrap();

        let grant = QuotaPolicy::new(db).authorize_project_creation(user_id).await.unwrap();
        assert_eq!(grant.plan, PlanType::Basic);
    }

    #[tokio::test]
    async fn test_release_decrements() {
        let db = Database::memory();
        let user_id = user_with_plan(&db, Some(PlanType::Basic)).await;
        let quota = QuotaPolicy::new(db.clone());

        quota.authorize_project_creation(user_id).await.unwrap();
        quota.authorize_project_creation(user_id).await.unwrap();
        quota.release(user_id).await.unwrap();

        assert_eq!(project_size(&db, user_id).await, 1);
        assert!(matches!(
            quota.release(DocId::new()).await,
            Err(QuotaError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_quota_error_maps_to_service_error() {
        let err: ServiceError = QuotaError::PlanLimitReached {
            plan: PlanType::Basic,
            limit: 3,
        }
        .into();
        assert_eq!(err.to_string(), "plan limit reached");

        let err: ServiceError = QuotaError::NoActiveSubscription.into();
        assert!(matches!(err, ServiceError::NoActiveSubscription));
    }
}
