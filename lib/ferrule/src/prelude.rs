//! Prelude module for convenient imports.
//!
//! ```ignore
//! use ferrule::prelude::*;
//! ```

pub use crate::{
    CancelSource, CancelToken, Client, ClientBuilder, Context, Error, InterceptorScope, Method,
    Middleware, Next, RequestInterceptor, RequestOptions, RequestUpdate, Response,
    ResponseInterceptor, ResponseType, Result, StatusCode, Transport, UseOptions,
};
pub use serde::{Deserialize, Serialize};
