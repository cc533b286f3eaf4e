/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`, `metrics`: operational endpoints
/// - `auth`: registration, login, e-mail verification
/// - `users`, `projects`, `invites`, `statuses`, `issues`, `roles`, `logs`
/// - `admin`: admin-only listings and user deletion
///
/// Successful responses share one envelope: a `message` from the fixed set
/// below plus the payload keys of the endpoint.

pub mod admin;
pub mod auth;
pub mod health;
pub mod invites;
pub mod issues;
pub mod logs;
pub mod metrics;
pub mod projects;
pub mod roles;
pub mod statuses;
pub mod users;

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub const CREATED: &str = "Resource created successfully";
pub const UPDATED: &str = "Resource updated successfully";
pub const DELETED: &str = "Resource deleted successfully";
pub const FETCHED: &str = "Resource fetched successfully";
pub const COMPLETED: &str = "Operation completed successfully";

/// Builds `{ "message": message, ...payload }`
///
/// Object payloads are merged into the envelope; anything else is placed
/// under `data`.
pub fn envelope(message: &str, payload: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert("message".to_string(), Value::String(message.to_string()));

    match payload {
        Value::Object(fields) => body.extend(fields),
        Value::Null => {}
        other => {
            body.insert("data".to_string(), other);
        }
    }

    Json(Value::Object(body))
}

/// JSON body extractor whose rejections use the API error envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
