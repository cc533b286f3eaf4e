//! # Managify Shared Library
//!
//! Domain library behind the Managify project-management API.
//!
//! ## Module Organization
//!
//! - `db`: document store abstraction, in-memory and PostgreSQL backends
//! - `models`: stored documents and identifiers
//! - `auth`: password hashing, JWT, request authentication and authorization
//! - `quota`: plan-based project quota
//! - `services`: project, invite, activity log, status, issue, role, account
//!   and admin aggregates
//! - `notify`: background e-mail worker pool
//! - `error`: domain error taxonomy

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod quota;
pub mod services;

/// Current version of the Managify shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
