/// Domain services
///
/// Each aggregate is constructed once at startup and shared by reference.
/// [`Services`] wires them together over one [`Database`] so the HTTP
/// layer and tests can swap the store backend.
///
/// # Dependencies
///
/// ```text
/// ActivityLog  QuotaPolicy
///      ▲            ▲
///      └─── ProjectService ◄── InviteService
///                 ▲
///          StatusService ◄── IssueService
///                 ▲
///            RoleService
/// ```
///
/// # Example
///
/// ```no_run
/// use managify_shared::db::Database;
/// use managify_shared::notify::{LogEmailSender, NotificationPool, NotifierConfig};
/// use managify_shared::services::{account::TokenSettings, Services};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let pool = NotificationPool::start(Arc::new(LogEmailSender), NotifierConfig::default());
/// let services = Services::new(
///     Database::memory(),
///     TokenSettings {
///         secret: Arc::from("secret-key-at-least-32-bytes-long"),
///         ttl: chrono::Duration::hours(1),
///     },
///     pool.notifier(),
/// );
/// # }
/// ```

pub mod account;
pub mod activity;
pub mod admin;
pub mod invite;
pub mod issue;
pub mod project;
pub mod role;
pub mod status;

use crate::db::Database;
use crate::notify::Notifier;
use crate::quota::QuotaPolicy;
use account::{AccountService, TokenSettings};
use activity::ActivityLog;
use admin::AdminService;
use invite::InviteService;
use issue::IssueService;
use project::ProjectService;
use role::RoleService;
use status::StatusService;

/// All domain services over one store
#[derive(Debug, Clone)]
pub struct Services {
    pub db: Database,
    pub accounts: AccountService,
    pub admin: AdminService,
    pub logs: ActivityLog,
    pub projects: ProjectService,
    pub invites: InviteService,
    pub statuses: StatusService,
    pub issues: IssueService,
    pub roles: RoleService,
}

impl Services {
    pub fn new(db: Database, tokens: TokenSettings, notifier: Notifier) -> Self {
        let logs = ActivityLog::new(db.clone());
        let quota = QuotaPolicy::new(db.clone());
        let projects = ProjectService::new(db.clone(), quota, logs.clone());
        let statuses = StatusService::new(db.clone(), projects.clone(), logs.clone());

        Self {
            accounts: AccountService::new(db.clone(), tokens, notifier),
            admin: AdminService::new(db.clone()),
            invites: InviteService::new(db.clone(), projects.clone(), logs.clone()),
            issues: IssueService::new(db.clone(), projects.clone(), statuses.clone(), logs.clone()),
            roles: RoleService::new(db.clone(), projects.clone(), logs.clone()),
            statuses,
            projects,
            logs,
            db,
        }
    }
}
