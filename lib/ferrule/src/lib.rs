//! Middleware-driven HTTP client for Rust.
//!
//! Every call flows through request interceptors, an onion of middleware
//! and a pluggable transport, with optional response caching:
//!
//! ```text
//! request interceptors (reverse order)
//!   -> instance -> default -> global -> parse_response
//!     -> core -> dispatch (cache, cancellation, timeout, transport)
//!        -> response interceptors (registration order)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ferrule::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! pub struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .with_logging()
//!     .build();
//!
//! let user: User = client
//!     .get("/users/42", RequestOptions::new().use_cache(true))
//!     .await?
//!     .json()?;
//! ```

mod cache;
mod client;
pub mod compose;
mod config;
mod context;
pub mod interceptor;
pub mod middleware;
pub mod prelude;
mod registry;
pub mod transport;

pub use cache::{CacheKey, CacheStore};
pub use client::{Client, ClientBuilder, InterceptorScope, MiddlewareSnapshot};
pub use compose::{Middleware, Next, Pipeline, compose};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use context::{Context, RequestParts};
pub use interceptor::{RequestInterceptor, RequestUpdate, ResponseInterceptor};
pub use registry::{MiddlewareScope, Registry, UseOptions};
#[cfg(feature = "hyper-transport")]
pub use transport::HyperTransport;
pub use transport::{ServiceTransport, default_transport};

// Re-export core types
pub use ferrule_core::{
    Body, CachePolicy, CancelSource, CancelToken, ContentType, Error, HeaderMap, Method,
    RequestConfig, RequestOptions, Response, ResponseType, Result, StatusCode, Subscription,
    header, from_json, to_form, to_json,
};
pub use ferrule_core::transport::{Dispatch, Transport};

// Re-export tower for service transports
pub use tower;
