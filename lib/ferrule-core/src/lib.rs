//! Core types for the ferrule HTTP request pipeline.
//!
//! This crate provides the value types shared by the pipeline and its
//! transports:
//! - [`Method`] - HTTP method enum
//! - [`RequestOptions`] and [`RequestConfig`] - layered and resolved call configuration
//! - [`Response`] - buffered HTTP response
//! - [`Error`] and [`Result`] - Error handling
//! - [`CancelSource`] and [`CancelToken`] - cooperative cancellation
//! - [`Transport`] and [`Dispatch`] - the network adapter seam
//! - [`StatusCode`] - HTTP status codes (re-exported from `http` crate)
//! - [`header`] - HTTP header names (re-exported from `http` crate)

mod body;
mod cancel;
mod config;
mod error;
mod method;
pub mod prelude;
mod response;
pub mod transport;

pub use body::{Body, ContentType, from_json, to_form, to_json};
pub use cancel::{CancelSource, CancelToken, Subscription};
pub use config::{
    CachePolicy, CachePredicate, DEFAULT_ACCEPT, DEFAULT_CACHE_TTL, ErrorHandler, RequestConfig,
    RequestOptions, ResponseType, StatusValidator,
};
pub use error::{Error, Result};
pub use method::Method;
pub use response::Response;
pub use transport::{Dispatch, Transport};

// Re-export http crate types for status codes and headers
pub use http::{HeaderMap, StatusCode, header};
