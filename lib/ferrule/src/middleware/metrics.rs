//! Metrics middleware using the metrics crate facade.
//!
//! This middleware records request metrics using the `metrics` crate,
//! which allows integration with various metrics backends (Prometheus, `StatsD`, etc.).

use std::time::Instant;

use ferrule_core::Result;
use futures_util::future::BoxFuture;

use crate::Context;
use crate::compose::{Middleware, Next};

/// Labels used for metrics.
const LABEL_METHOD: &str = "method";
const LABEL_STATUS: &str = "status";
const LABEL_CACHE: &str = "cache";

/// Metric names.
const METRIC_REQUESTS_TOTAL: &str = "http_client_requests_total";
const METRIC_REQUEST_DURATION: &str = "http_client_request_duration_seconds";
const METRIC_REQUESTS_IN_FLIGHT: &str = "http_client_requests_in_flight";

/// In-flight gauge slot, released on drop.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        metrics::gauge!(METRIC_REQUESTS_IN_FLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::gauge!(METRIC_REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

/// Middleware that records request metrics.
///
/// Records the following metrics:
/// - `http_client_requests_total` (counter): Total number of calls, labeled by method, status and cache
/// - `http_client_request_duration_seconds` (histogram): Call duration in seconds
/// - `http_client_requests_in_flight` (gauge): Number of calls currently in flight
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsMiddleware {
    _private: (),
}

impl MetricsMiddleware {
    /// Create a new metrics middleware.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        let method = ctx.config().method.to_string();

        Box::pin(async move {
            let start = Instant::now();
            let in_flight = InFlight::enter();
            let result = next.run(ctx).await;
            drop(in_flight);

            let duration = start.elapsed().as_secs_f64();
            metrics::histogram!(METRIC_REQUEST_DURATION, LABEL_METHOD => method.clone())
                .record(duration);

            let (status, cache) = match (&result, &ctx.res) {
                (Ok(()), Some(response)) => (
                    response.status().to_string(),
                    if response.from_cache() { "hit" } else { "miss" },
                ),
                _ => ("error".to_string(), "miss"),
            };

            metrics::counter!(
                METRIC_REQUESTS_TOTAL,
                LABEL_METHOD => method,
                LABEL_STATUS => status,
                LABEL_CACHE => cache
            )
            .increment(1);

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ferrule_core::{Error, RequestConfig, Response};
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use super::*;
    use crate::cache::CacheStore;
    use crate::compose::{compose, from_fn};

    fn context() -> Context {
        Context::new(
            "https://example.com/test".to_string(),
            Arc::new(RequestConfig::default()),
            Arc::new(CacheStore::default()),
            Arc::from(Vec::new()),
            true,
        )
    }

    #[tokio::test]
    async fn metrics_middleware_passes_response_through() {
        let pipeline = compose(vec![
            Arc::new(MetricsMiddleware::new()),
            Arc::new(from_fn(|ctx, _next| {
                Box::pin(async move {
                    ctx.res = Some(Response::from_data(200, serde_json::Value::Null));
                    Ok(())
                })
            })),
        ]);

        let mut ctx = context();
        pipeline.run(&mut ctx, None).await.expect("run");
        assert_eq!(ctx.res.expect("response").status(), 200);
    }

    #[test]
    fn abandoned_call_releases_in_flight_gauge() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            rt.block_on(async {
                let pipeline = compose(vec![
                    Arc::new(MetricsMiddleware::new()),
                    Arc::new(from_fn(|_ctx, _next| Box::pin(std::future::pending()))),
                ]);
                let mut ctx = context();
                let abandoned =
                    tokio::time::timeout(Duration::from_millis(10), pipeline.run(&mut ctx, None))
                        .await;
                assert!(abandoned.is_err());
            });
        });

        let in_flight = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Gauge(gauge) if key.key().name() == METRIC_REQUESTS_IN_FLIGHT => {
                    Some(gauge.into_inner())
                }
                _ => None,
            })
            .expect("in-flight gauge");
        assert!(in_flight.abs() < f64::EPSILON, "in-flight gauge is {in_flight}");
    }

    #[tokio::test]
    async fn metrics_middleware_passes_errors_through() {
        let pipeline = compose(vec![
            Arc::new(MetricsMiddleware::new()),
            Arc::new(from_fn(|_ctx, _next| {
                Box::pin(async move { Err(Error::network("mock error")) })
            })),
        ]);

        let mut ctx = context();
        let result = pipeline.run(&mut ctx, None).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
