//! Middleware shipped with ferrule.
//!
//! | Middleware | Scope | Description |
//! |------------|-------|-------------|
//! | [`DispatchMiddleware`] | core (built-in) | Cache lookup, transport race, cache write, response interceptors |
//! | [`ParseResponse`] | global (built-in) | Decodes the body per the response type |
//! | [`LoggingMiddleware`] | instance | Logs calls using `tracing` |
//! | [`MetricsMiddleware`] | instance | Records metrics (feature `middleware-metrics`) |
//!
//! Write your own with [`crate::compose::from_fn`] or by implementing
//! [`crate::Middleware`].

mod dispatch;
mod logging;
#[cfg(feature = "middleware-metrics")]
mod metrics;
mod parse_response;

pub use dispatch::DispatchMiddleware;
pub use logging::{LogLevel, LoggingMiddleware};
#[cfg(feature = "middleware-metrics")]
pub use metrics::MetricsMiddleware;
pub use parse_response::ParseResponse;
