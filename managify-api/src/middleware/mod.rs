/// Middleware modules for the API server
///
/// - `security`: security response headers
/// - `rate_limit`: per-client token buckets
/// - `metrics`: per-route latency recording

pub mod metrics;
pub mod rate_limit;
pub mod security;
