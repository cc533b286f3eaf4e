//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Full router over an in-memory store (no external services)
//! - A store wrapper that fails chosen writes on demand
//! - User registration and request helpers

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use managify_api::app::{build_router, AppState};
use managify_api::config::Config;
use managify_api::middleware::metrics::InMemoryMetrics;
use managify_api::middleware::rate_limit::{RateLimit, RateLimiter};
use managify_shared::db::document::{
    Document, DocumentStore, Filter, FindOneAndUpdateOptions, FindOptions, FoundDocument,
    StoreError, Update, UpdateResult,
};
use managify_shared::db::memory::MemoryStore;
use managify_shared::db::Database;
use managify_shared::models::{DocId, Project, User};
use managify_shared::notify::{LogEmailSender, NotificationPool, NotifierConfig};
use managify_shared::services::{account::TokenSettings, Services};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "Secure#1";

/// A registered user and their token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: DocId,
    pub email: String,
    pub token: String,
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: Router,
    pub db: Database,
    pub services: Services,
    pub config: Config,
    notifications: NotificationPool,
}

impl TestContext {
    /// Router over a fresh in-memory store
    pub fn new() -> Self {
        Self::build(Arc::new(MemoryStore::new()), &[])
    }

    /// Router with extra configuration variables
    pub fn with_vars(vars: &[(&str, &str)]) -> Self {
        Self::build(Arc::new(MemoryStore::new()), vars)
    }

    /// Router over a caller-supplied store
    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self::build(store, &[])
    }

    fn build(store: Arc<dyn DocumentStore>, vars: &[(&str, &str)]) -> Self {
        let mut map: HashMap<String, String> = HashMap::from([
            ("JWT_SECRET".to_string(), JWT_SECRET.to_string()),
            ("API_MAX_LIMITER".to_string(), "10000".to_string()),
        ]);
        for (key, value) in vars {
            map.insert(key.to_string(), value.to_string());
        }
        let config = Config::from_lookup(|key| map.get(key).cloned()).unwrap();

        let db = Database::new(store);
        let notifications =
            NotificationPool::start(Arc::new(LogEmailSender), NotifierConfig::default());

        let services = Services::new(
            db.clone(),
            TokenSettings {
                secret: Arc::from(JWT_SECRET),
                ttl: chrono::Duration::seconds(config.jwt.ttl_seconds),
            },
            notifications.notifier(),
        );

        let limiter = RateLimiter::local(RateLimit::per_window(
            config.rate_limit.max_requests,
            config.rate_limit.window_seconds,
        ));

        let state = AppState::new(
            services.clone(),
            config.clone(),
            Arc::new(InMemoryMetrics::new()),
            limiter,
        );

        TestContext {
            app: build_router(state),
            db,
            services,
            config,
            notifications,
        }
    }

    /// Sends a request and returns the status and JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", auth_header(token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, json)
    }

    /// Registers a BASIC user through the API
    pub async fn register(&self, full_name: &str, email: &str) -> TestUser {
        let (status, body) = self
            .send(
                "POST",
                "/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "full_name": full_name,
                    "email": email,
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        let user = User::find_by_email(&self.db, email).await.unwrap().unwrap();

        TestUser {
            id: user.id,
            email: email.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Logs in again, e.g. after claims changed
    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/v1/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        body["token"].as_str().unwrap().to_string()
    }

    /// Creates a project and returns its id
    pub async fn create_project(&self, user: &TestUser, name: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/v1/projects",
            Some(&user.token),
            Some(serde_json::json!({
                "name": name,
                "description": "Integration test project",
                "category": "testing",
                "tags": ["test"],
            })),
        )
        .await
    }

    pub async fn project_size(&self, user_id: DocId) -> i64 {
        User::find_by_id(&self.db, user_id)
            .await
            .unwrap()
            .unwrap()
            .project_size
    }

    pub async fn project_count(&self) -> u64 {
        self.db
            .collection::<Project>()
            .count(&Filter::All)
            .await
            .unwrap()
    }

    pub async fn shutdown(self) {
        self.notifications.shutdown().await;
    }
}

/// Returns authorization header value
pub fn auth_header(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Extracts `body[key]["id"]` as a string
pub fn id_of(body: &Value, key: &str) -> String {
    body[key]["id"].as_str().unwrap().to_string()
}

/// Store operations that [`FlakyStore`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Insert,
    Update,
}

/// Memory store with injectable per-collection failures
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failures: Mutex<HashSet<(StoreOp, String)>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `op` on `collection` fail until [`heal`](Self::heal) is called
    pub fn fail_on(&self, op: StoreOp, collection: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert((op, collection.to_string()));
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    fn check(&self, op: StoreOp, collection: &str) -> Result<(), StoreError> {
        if self
            .failures
            .lock()
            .unwrap()
            .contains(&(op, collection.to_string()))
        {
            return Err(StoreError::Backend(format!(
                "injected {:?} failure on {}",
                op, collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.find(collection, filter, options).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.find_one(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        self.check(StoreOp::Insert, collection)?;
        self.inner.insert_one(collection, document).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        self.check(StoreOp::Update, collection)?;
        self.inner.update_one(collection, filter, update).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        self.check(StoreOp::Update, collection)?;
        self.inner.update_many(collection, filter, update).await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: FindOneAndUpdateOptions,
    ) -> Result<Option<FoundDocument>, StoreError> {
        self.inner
            .find_one_and_update(collection, filter, update, options)
            .await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.inner.delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.inner.delete_many(collection, filter).await
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.inner.count_documents(collection, filter).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
