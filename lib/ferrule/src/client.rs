//! Request engine.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ferrule_core::{Error, Method, RequestConfig, RequestOptions, Response, Result, Transport};
use tracing::debug;

use crate::cache::CacheStore;
use crate::compose::{Middleware, Pipeline, compose};
use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::interceptor::{self, RequestInterceptor, ResponseInterceptor};
use crate::middleware::LoggingMiddleware;
use crate::registry::{MiddlewareScope, Registry, UseOptions};
use crate::Context;

#[cfg(feature = "middleware-metrics")]
use crate::middleware::MetricsMiddleware;

// ============================================================================
// Scopes and snapshots
// ============================================================================

/// Where an interceptor is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterceptorScope {
    /// Private to one client.
    #[default]
    Instance,
    /// Shared through the registry; runs for every client using it.
    Global,
}

/// The four middleware lists of a client, in composition order.
#[derive(Clone, Default)]
pub struct MiddlewareSnapshot {
    /// Instance middleware, outermost.
    pub instance: Vec<Arc<dyn Middleware>>,
    /// Default middleware.
    pub default: Vec<Arc<dyn Middleware>>,
    /// Global middleware, built-in response parsing last.
    pub global: Vec<Arc<dyn Middleware>>,
    /// Core middleware, built-in dispatch last.
    pub core: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for MiddlewareSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |list: &[Arc<dyn Middleware>]| list.iter().map(|m| m.name()).collect::<Vec<_>>();
        f.debug_struct("MiddlewareSnapshot")
            .field("instance", &names(&self.instance))
            .field("default", &names(&self.default))
            .field("global", &names(&self.global))
            .field("core", &names(&self.core))
            .finish()
    }
}

impl MiddlewareSnapshot {
    /// Middleware names in composition order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|middleware| middleware.name()).collect()
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<dyn Middleware>> {
        self.instance
            .iter()
            .chain(&self.default)
            .chain(&self.global)
            .chain(&self.core)
    }

    /// Compose the snapshot into a pipeline.
    #[must_use]
    pub fn compose(&self) -> Pipeline {
        compose(self.iter().cloned().collect())
    }
}

#[derive(Clone, Default)]
struct Instance {
    options: RequestOptions,
    middleware: Vec<Arc<dyn Middleware>>,
    default_middleware: Vec<Arc<dyn Middleware>>,
    request_interceptors: Vec<Arc<RequestInterceptor>>,
    response_interceptors: Vec<Arc<ResponseInterceptor>>,
}

struct CallPlan {
    options: RequestOptions,
    pipeline: Pipeline,
    request_interceptors: Vec<Arc<RequestInterceptor>>,
    response_interceptors: Arc<[Arc<ResponseInterceptor>]>,
}

struct Shared {
    registry: Arc<Registry>,
    cache: Arc<CacheStore>,
    config: ClientConfig,
    instance: RwLock<Instance>,
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, Instance> {
        self.instance.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Instance> {
        self.instance.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client running every call through interceptors and the middleware
/// pipeline.
///
/// Cloning is cheap; clones share all state.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use ferrule::{Client, RequestOptions};
///
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .timeout(Duration::from_secs(5))
///     .with_logging()
///     .build();
///
/// let response = client
///     .get("/users/42", RequestOptions::new().use_cache(true))
///     .await?;
/// let user: User = response.json()?;
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let options = self.inner.read().options.clone();
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("options", &options)
            .field("middleware", &self.middlewares())
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Response cache of this client and its siblings.
    #[must_use]
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.inner.cache
    }

    /// Registry of shared middleware and interceptors.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Execute a call.
    ///
    /// `options` are merged over the client's instance options. When the
    /// call fails and an error handler is configured, its outcome replaces
    /// the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty URL, and otherwise
    /// whatever the interceptors, middleware or transport fail with.
    pub async fn request(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::invalid_argument("url must be a non-empty string"));
        }

        let plan = self.plan();
        let config = plan.options.clone().merge(options).resolve(url.clone())?;
        let error_handler = config.error_handler.clone();

        match (Self::execute(&self.inner, url, config, plan).await, error_handler) {
            (Err(err), Some(handler)) => {
                debug!(error = %err, "handing failed call to the error handler");
                handler(err)
            }
            (result, _) => result,
        }
    }

    async fn execute(
        shared: &Shared,
        url: String,
        config: RequestConfig,
        plan: CallPlan,
    ) -> Result<Response> {
        debug!(
            request_interceptors = plan.request_interceptors.len(),
            response_interceptors = plan.response_interceptors.len(),
            middleware = plan.pipeline.len(),
            "starting call"
        );
        let (url, config) =
            interceptor::apply_request(&plan.request_interceptors, url, Arc::new(config)).await?;

        let mut ctx = Context::new(
            url,
            config,
            Arc::clone(&shared.cache),
            plan.response_interceptors,
            shared.config.cache_supported,
        );
        plan.pipeline.run(&mut ctx, None).await?;

        ctx.res
            .take()
            .ok_or_else(|| Error::invariant("pipeline completed without a response"))
    }

    fn plan(&self) -> CallPlan {
        let registry = &self.inner.registry;
        let instance = self.inner.read();

        let snapshot = MiddlewareSnapshot {
            instance: instance.middleware.clone(),
            default: instance.default_middleware.clone(),
            global: registry.global_middleware(),
            core: registry.core_middleware(),
        };

        let mut request_interceptors = registry.request_interceptors();
        request_interceptors.extend(instance.request_interceptors.iter().cloned());
        let mut response_interceptors = registry.response_interceptors();
        response_interceptors.extend(instance.response_interceptors.iter().cloned());

        CallPlan {
            options: instance.options.clone(),
            pipeline: snapshot.compose(),
            request_interceptors,
            response_interceptors: response_interceptors.into(),
        }
    }

    /// `GET` the URL.
    pub async fn get(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Get)).await
    }

    /// `POST` to the URL.
    pub async fn post(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Post)).await
    }

    /// `PUT` to the URL.
    pub async fn put(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Put)).await
    }

    /// `PATCH` the URL.
    pub async fn patch(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Patch)).await
    }

    /// `DELETE` the URL.
    pub async fn delete(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Delete)).await
    }

    /// `HEAD` the URL.
    pub async fn head(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Head)).await
    }

    /// `OPTIONS` the URL.
    pub async fn options(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Options)).await
    }

    /// Sibling client with `options` merged over this client's options.
    ///
    /// The sibling shares the registry and the cache, and starts with a
    /// copy of this client's middleware and interceptors.
    #[must_use]
    pub fn extend(&self, options: RequestOptions) -> Self {
        let mut instance = self.inner.read().clone();
        instance.options = instance.options.merge(options);

        Self {
            inner: Arc::new(Shared {
                registry: Arc::clone(&self.inner.registry),
                cache: Arc::clone(&self.inner.cache),
                config: self.inner.config.clone(),
                instance: RwLock::new(instance),
            }),
        }
    }

    /// Merge `options` into this client's options for later calls.
    pub fn extend_options(&self, options: RequestOptions) {
        let mut instance = self.inner.write();
        instance.options = std::mem::take(&mut instance.options).merge(options);
    }

    /// Register a middleware.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the options name more than one
    /// scope.
    pub fn use_middleware<M: Middleware>(
        &self,
        middleware: M,
        options: impl Into<UseOptions>,
    ) -> Result<()> {
        let middleware: Arc<dyn Middleware> = Arc::new(middleware);
        match options.into().scope()? {
            MiddlewareScope::Instance => self.inner.write().middleware.push(middleware),
            MiddlewareScope::Default => self.inner.write().default_middleware.push(middleware),
            MiddlewareScope::Global => self.inner.registry.use_global(middleware),
            MiddlewareScope::Core => self.inner.registry.use_core(middleware),
        }
        Ok(())
    }

    /// Register a request interceptor.
    pub fn intercept_request(&self, interceptor: RequestInterceptor, scope: InterceptorScope) {
        match scope {
            InterceptorScope::Instance => self
                .inner
                .write()
                .request_interceptors
                .push(Arc::new(interceptor)),
            InterceptorScope::Global => self.inner.registry.intercept_request(interceptor),
        }
    }

    /// Register a response interceptor.
    pub fn intercept_response(&self, interceptor: ResponseInterceptor, scope: InterceptorScope) {
        match scope {
            InterceptorScope::Instance => self
                .inner
                .write()
                .response_interceptors
                .push(Arc::new(interceptor)),
            InterceptorScope::Global => self.inner.registry.intercept_response(interceptor),
        }
    }

    /// Current middleware lists, in composition order.
    #[must_use]
    pub fn middlewares(&self) -> MiddlewareSnapshot {
        let instance = self.inner.read();
        MiddlewareSnapshot {
            instance: instance.middleware.clone(),
            default: instance.default_middleware.clone(),
            global: self.inner.registry.global_middleware(),
            core: self.inner.registry.core_middleware(),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Client`].
///
/// # Example
///
/// ```ignore
/// use ferrule::{Client, Registry};
///
/// let registry = Arc::new(Registry::new());
/// let client = Client::builder()
///     .registry(registry)
///     .max_cache(100)
///     .with_logging()
///     .build();
/// ```
#[derive(Default)]
#[must_use]
pub struct ClientBuilder {
    config: ClientConfigBuilder,
    registry: Option<Arc<Registry>>,
    cache: Option<Arc<CacheStore>>,
    options: RequestOptions,
    middleware: Vec<Arc<dyn Middleware>>,
    default_middleware: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("middleware_count", &self.middleware.len())
            .field("default_middleware_count", &self.default_middleware.len())
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Share `registry` instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing cache store.
    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the cache capacity; zero means unbounded.
    pub fn max_cache(mut self, max_cache: usize) -> Self {
        self.config = self.config.max_cache(max_cache);
        self
    }

    /// Set whether response caching is supported.
    pub fn cache_supported(mut self, supported: bool) -> Self {
        self.config = self.config.cache_supported(supported);
        self
    }

    /// Merge instance options.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = self.options.merge(options);
        self
    }

    /// Set the prefix for relative URLs.
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        self.options(RequestOptions::new().base_url(base_url))
    }

    /// Set the default timeout.
    pub fn timeout(self, timeout: std::time::Duration) -> Self {
        self.options(RequestOptions::new().timeout(timeout))
    }

    /// Set a default header.
    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options(RequestOptions::new().header(name, value))
    }

    /// Set the transport used by every call that does not override it.
    pub fn adapter(self, adapter: impl Transport) -> Self {
        self.options(RequestOptions::new().adapter(Arc::new(adapter)))
    }

    /// Append an instance middleware.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append a default middleware.
    pub fn default_middleware(mut self, middleware: impl Middleware) -> Self {
        self.default_middleware.push(Arc::new(middleware));
        self
    }

    /// Add request/response logging at info level.
    pub fn with_logging(self) -> Self {
        self.middleware(LoggingMiddleware::new())
    }

    /// Add request/response logging at debug level.
    pub fn with_debug_logging(self) -> Self {
        self.middleware(LoggingMiddleware::debug())
    }

    /// Add metrics recording.
    #[cfg(feature = "middleware-metrics")]
    pub fn with_metrics(self) -> Self {
        self.middleware(MetricsMiddleware::new())
    }

    /// Build the client.
    #[must_use]
    pub fn build(self) -> Client {
        let config = self.config.build();
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(CacheStore::new(config.max_cache)));
        let registry = self.registry.unwrap_or_else(Registry::shared);

        Client {
            inner: Arc::new(Shared {
                registry,
                cache,
                config,
                instance: RwLock::new(Instance {
                    options: RequestOptions::defaults().merge(self.options),
                    middleware: self.middleware,
                    default_middleware: self.default_middleware,
                    ..Instance::default()
                }),
            }),
        }
    }
}
