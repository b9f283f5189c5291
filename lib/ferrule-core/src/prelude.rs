//! Prelude module for convenient imports.
//!
//! ```ignore
//! use ferrule_core::prelude::*;
//! ```

pub use crate::{
    Body, CancelSource, CancelToken, Error, Method, RequestConfig, RequestOptions, Response,
    ResponseType, Result, Transport,
};
