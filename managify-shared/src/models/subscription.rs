/// Subscription model
///
/// Every user receives a valid BASIC subscription at registration. The
/// plan tier decides the owned-project cap enforced by
/// [`QuotaPolicy`](crate::quota::QuotaPolicy).
///
/// Nothing prevents a user from holding several valid subscriptions; the
/// quota policy consults the earliest-inserted valid one.

use super::id::DocId;
use crate::db::document::{Filter, StoreError};
use crate::db::{Database, Model};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanType {
    Basic,
    Premium,
    Pro,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Basic => "BASIC",
            PlanType::Premium => "PREMIUM",
            PlanType::Pro => "PRO",
        }
    }

    /// Maximum owned projects, `None` when uncapped
    pub fn project_limit(&self) -> Option<i64> {
        match self {
            PlanType::Basic => Some(3),
            PlanType::Premium | PlanType::Pro => None,
        }
    }
}

/// Stored subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: DocId,

    /// Owning user
    pub user_id: DocId,

    pub plan_type: PlanType,

    /// Only valid subscriptions are considered for quota decisions
    pub is_valid: bool,

    #[serde(with = "super::timestamp")]
    pub start_date: DateTime<Utc>,

    #[serde(with = "super::timestamp")]
    pub end_date: DateTime<Utc>,
}

impl Model for Subscription {
    const COLLECTION: &'static str = "subscriptions";
}

impl Subscription {
    /// A valid 30-day BASIC subscription starting now
    pub fn basic_for(user_id: DocId) -> Self {
        let now = Utc::now();
        Self {
            id: DocId::new(),
            user_id,
            plan_type: PlanType::Basic,
            is_valid: true,
            start_date: now,
            end_date: now + Duration::days(30),
        }
    }

    /// Earliest-inserted valid subscription of a user
    pub async fn find_valid_for_user(
        db: &Database,
        user_id: DocId,
    ) -> Result<Option<Self>, StoreError> {
        db.collection::<Self>()
            .find_one(&Filter::eq("user_id", user_id).and(Filter::eq("is_valid", true)))
            .await
    }
}
