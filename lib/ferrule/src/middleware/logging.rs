//! Request/response logging middleware.
//!
//! This middleware logs calls going through the pipeline using the `tracing` crate.

use std::time::Instant;

use ferrule_core::Result;
use futures_util::future::BoxFuture;
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::Context;
use crate::compose::{Middleware, Next};

/// Log level for the logging middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level (request/response details).
    Debug,
    /// Log at info level (summary only).
    #[default]
    Info,
}

/// Middleware that logs each call and its outcome.
///
/// # Example
///
/// ```ignore
/// use ferrule::Client;
///
/// let client = Client::builder().with_logging().build();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware {
    level: LogLevel,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging middleware that logs at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// Configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        let method = ctx.config().method;
        let url = ctx.req.url.clone();
        let level = self.level;

        let span = span!(Level::INFO, "http_request", %method, %url);

        Box::pin(
            async move {
                let start = Instant::now();

                match level {
                    LogLevel::Debug => {
                        debug!(
                            method = %method,
                            url = %url,
                            headers = ?ctx.config().headers,
                            "sending request"
                        );
                    }
                    LogLevel::Info => {
                        info!(method = %method, url = %url, "sending request");
                    }
                }

                let result = next.run(ctx).await;

                // Saturating conversion to u64 (truncates after ~584 million years)
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match (&result, &ctx.res) {
                    (Ok(()), Some(response)) => {
                        let status = response.status();
                        let from_cache = response.from_cache();
                        if response.is_success() {
                            info!(status, from_cache, elapsed_ms, "request completed");
                        } else {
                            warn!(status, from_cache, elapsed_ms, "request completed with HTTP error");
                        }
                    }
                    (Ok(()), None) => {
                        debug!(elapsed_ms, "request completed without response");
                    }
                    (Err(err), _) => {
                        warn!(error = %err, elapsed_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
