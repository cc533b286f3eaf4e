/// Request latency metrics
///
/// Every request is recorded under `"METHOD /matched/path"` so that path
/// parameters do not split one route into many keys. Unmatched requests are
/// recorded under the raw path.

use crate::app::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Destination for per-route request timings
pub trait MetricsSink: Send + Sync + 'static {
    fn record(&self, route: &str, elapsed: Duration);

    /// Aggregates keyed by route
    fn snapshot(&self) -> BTreeMap<String, RouteSummary>;
}

/// Aggregate timings of one route
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteSummary {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Copy)]
struct RouteStats {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl RouteStats {
    fn new(elapsed: Duration) -> Self {
        RouteStats {
            count: 1,
            total: elapsed,
            min: elapsed,
            max: elapsed,
        }
    }

    fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    fn summary(&self) -> RouteSummary {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        RouteSummary {
            count: self.count,
            avg_ms: ms(self.total) / self.count as f64,
            min_ms: ms(self.min),
            max_ms: ms(self.max),
        }
    }
}

/// Process-lifetime metrics held in memory
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    routes: Mutex<BTreeMap<String, RouteStats>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record(&self, route: &str, elapsed: Duration) {
        let Ok(mut routes) = self.routes.lock() else {
            tracing::warn!(route, "Metrics lock poisoned, sample dropped");
            return;
        };

        match routes.get_mut(route) {
            Some(stats) => stats.add(elapsed),
            None => {
                routes.insert(route.to_string(), RouteStats::new(elapsed));
            }
        }
    }

    fn snapshot(&self) -> BTreeMap<String, RouteSummary> {
        match self.routes.lock() {
            Ok(routes) => routes
                .iter()
                .map(|(route, stats)| (route.clone(), stats.summary()))
                .collect(),
            Err(_) => BTreeMap::new(),
        }
    }
}

/// Records the latency of every request
pub async fn metrics_layer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let route = format!("{} {}", request.method(), path);

    let started = Instant::now();
    let response = next.run(request).await;
    state.metrics.record(&route, started.elapsed());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_aggregates() {
        let metrics = InMemoryMetrics::new();
        metrics.record("GET /v1/projects/:project_id", Duration::from_millis(10));
        metrics.record("GET /v1/projects/:project_id", Duration::from_millis(30));
        metrics.record("POST /v1/projects", Duration::from_millis(5));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 2);

        let get = snapshot["GET /v1/projects/:project_id"];
        assert_eq!(get.count, 2);
        assert!((get.avg_ms - 20.0).abs() < 0.001);
        assert!((get.min_ms - 10.0).abs() < 0.001);
        assert!((get.max_ms - 30.0).abs() < 0.001);

        assert_eq!(snapshot["POST /v1/projects"].count, 1);
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(InMemoryMetrics::new().snapshot().is_empty());
    }
}
