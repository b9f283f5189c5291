//! Per-call execution context threaded through the middleware pipeline.

use std::sync::Arc;

use ferrule_core::{RequestConfig, Response};

use crate::cache::CacheStore;
use crate::interceptor::ResponseInterceptor;

/// The request half of a [`Context`].
#[derive(Debug, Clone)]
pub struct RequestParts {
    /// URL of the call, possibly rewritten by request interceptors.
    pub url: String,
    /// Resolved configuration of the call.
    pub config: Arc<RequestConfig>,
}

/// State shared by every middleware of one call.
///
/// Middleware read `req` before delegating and find the produced response
/// in `res` afterwards. A middleware that short-circuits must fill `res`
/// itself.
pub struct Context {
    /// Request being executed.
    pub req: RequestParts,
    /// Response, once produced by an inner middleware.
    pub res: Option<Response>,
    cache: Arc<CacheStore>,
    response_interceptors: Arc<[Arc<ResponseInterceptor>]>,
    cache_supported: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("req", &self.req)
            .field("res", &self.res)
            .field("response_interceptors", &self.response_interceptors.len())
            .field("cache_supported", &self.cache_supported)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub(crate) fn new(
        url: String,
        config: Arc<RequestConfig>,
        cache: Arc<CacheStore>,
        response_interceptors: Arc<[Arc<ResponseInterceptor>]>,
        cache_supported: bool,
    ) -> Self {
        Self {
            req: RequestParts { url, config },
            res: None,
            cache,
            response_interceptors,
            cache_supported,
        }
    }

    /// Configuration of the call.
    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        &self.req.config
    }

    /// Mutable configuration of this call only.
    ///
    /// The configuration is copied on first write, so the value the caller
    /// handed in is never modified.
    pub fn config_mut(&mut self) -> &mut RequestConfig {
        Arc::make_mut(&mut self.req.config)
    }

    /// Response cache shared with the client.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Whether the environment supports response caching.
    #[must_use]
    pub const fn cache_supported(&self) -> bool {
        self.cache_supported
    }

    /// Response interceptors snapshotted when the call started.
    #[must_use]
    pub fn response_interceptors(&self) -> &[Arc<ResponseInterceptor>] {
        &self.response_interceptors
    }

    /// Configuration with its URL aligned on `req.url`.
    pub(crate) fn effective_config(&self) -> Arc<RequestConfig> {
        if self.req.config.url == self.req.url {
            return Arc::clone(&self.req.config);
        }
        let mut config = RequestConfig::clone(&self.req.config);
        config.url.clone_from(&self.req.url);
        Arc::new(config)
    }
}
