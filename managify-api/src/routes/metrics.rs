/// Route timing report
///
/// ```text
/// GET /metrics
/// ```
///
/// ```json
/// {
///   "message": "Resource fetched successfully",
///   "metrics": {
///     "POST /v1/projects": { "count": 3, "avg_ms": 4.1, "min_ms": 2.0, "max_ms": 7.3 }
///   }
/// }
/// ```

use super::{envelope, FETCHED};
use crate::app::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

pub async fn metrics_report(State(state): State<AppState>) -> Json<Value> {
    envelope(FETCHED, json!({ "metrics": state.metrics.snapshot() }))
}
