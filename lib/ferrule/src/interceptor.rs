//! Request and response interceptors.
//!
//! Request interceptors run before the middleware pipeline, last registered
//! first. Each may rewrite the URL and the configuration of the call, or
//! reject it. Response interceptors run after dispatch, in registration
//! order, as successive `then(fulfilled, rejected)` stages over the call
//! result.

use std::future::Future;
use std::sync::Arc;

use ferrule_core::{Error, RequestConfig, Response, Result};
use futures_util::future::BoxFuture;

// ============================================================================
// Request interceptors
// ============================================================================

/// Partial rewrite returned by a request interceptor.
///
/// Unset fields keep their prior value.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct RequestUpdate {
    url: Option<String>,
    config: Option<RequestConfig>,
}

impl RequestUpdate {
    /// Keep the URL and configuration as they are.
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Replace the URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::default().with_url(url)
    }

    /// Replace the configuration.
    pub fn config(config: RequestConfig) -> Self {
        Self::default().with_config(config)
    }

    /// Also replace the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Also replace the configuration.
    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn apply(self, url: &mut String, config: &mut Arc<RequestConfig>) {
        if let Some(new_url) = self.url {
            *url = new_url;
        }
        if let Some(new_config) = self.config {
            *config = Arc::new(new_config);
        }
    }
}

type SyncRequestFn = dyn Fn(&str, &RequestConfig) -> Result<RequestUpdate> + Send + Sync;
type AsyncRequestFn =
    dyn Fn(String, Arc<RequestConfig>) -> BoxFuture<'static, Result<RequestUpdate>> + Send + Sync;
type RejectedFn = dyn Fn(&Error) + Send + Sync;
type RunWhenFn = dyn Fn(&RequestConfig) -> bool + Send + Sync;

#[derive(Clone)]
enum RequestHandler {
    Sync(Arc<SyncRequestFn>),
    Async(Arc<AsyncRequestFn>),
}

/// Pre-dispatch hook.
///
/// # Example
///
/// ```
/// use ferrule::interceptor::{RequestInterceptor, RequestUpdate};
///
/// let add_version = RequestInterceptor::sync(|_url, config| {
///     let mut config = config.clone();
///     config.params.push(("v".to_string(), "2".to_string()));
///     Ok(RequestUpdate::config(config))
/// })
/// .run_when(|config| config.method.is_safe());
/// # let _ = add_version;
/// ```
#[derive(Clone)]
pub struct RequestInterceptor {
    fulfilled: RequestHandler,
    rejected: Option<Arc<RejectedFn>>,
    run_when: Option<Arc<RunWhenFn>>,
}

impl std::fmt::Debug for RequestInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("synchronous", &self.is_synchronous())
            .field("rejected", &self.rejected.is_some())
            .field("run_when", &self.run_when.is_some())
            .finish()
    }
}

impl RequestInterceptor {
    /// Interceptor with a synchronous handler.
    #[must_use]
    pub fn sync<F>(fulfilled: F) -> Self
    where
        F: Fn(&str, &RequestConfig) -> Result<RequestUpdate> + Send + Sync + 'static,
    {
        Self {
            fulfilled: RequestHandler::Sync(Arc::new(fulfilled)),
            rejected: None,
            run_when: None,
        }
    }

    /// Interceptor with an asynchronous handler.
    #[must_use]
    pub fn new<F, Fut>(fulfilled: F) -> Self
    where
        F: Fn(String, Arc<RequestConfig>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RequestUpdate>> + Send + 'static,
    {
        Self {
            fulfilled: RequestHandler::Async(Arc::new(
                move |url: String, config: Arc<RequestConfig>| -> BoxFuture<'static, Result<RequestUpdate>> {
                    Box::pin(fulfilled(url, config))
                },
            )),
            rejected: None,
            run_when: None,
        }
    }

    /// Observe the error when the fulfilled handler rejects.
    #[must_use]
    pub fn on_rejected<F>(mut self, rejected: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.rejected = Some(Arc::new(rejected));
        self
    }

    /// Only run when `predicate` accepts the current configuration.
    #[must_use]
    pub fn run_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestConfig) -> bool + Send + Sync + 'static,
    {
        self.run_when = Some(Arc::new(predicate));
        self
    }

    /// Returns `true` if the handler is synchronous.
    #[must_use]
    pub const fn is_synchronous(&self) -> bool {
        matches!(self.fulfilled, RequestHandler::Sync(_))
    }

    fn should_run(&self, config: &RequestConfig) -> bool {
        self.run_when.as_ref().is_none_or(|predicate| predicate(config))
    }

    fn reject(&self, err: Error) -> Error {
        if let Some(rejected) = &self.rejected {
            rejected(&err);
        }
        err
    }
}

/// Run `interceptors` in reverse registration order.
///
/// Synchronous handlers are invoked inline, so a chain made only of them
/// completes without suspending. The first rejection stops the chain.
pub(crate) async fn apply_request(
    interceptors: &[Arc<RequestInterceptor>],
    mut url: String,
    mut config: Arc<RequestConfig>,
) -> Result<(String, Arc<RequestConfig>)> {
    for interceptor in interceptors.iter().rev() {
        if !interceptor.should_run(&config) {
            continue;
        }
        let update = match &interceptor.fulfilled {
            RequestHandler::Sync(handler) => handler(&url, &config),
            RequestHandler::Async(handler) => handler(url.clone(), Arc::clone(&config)).await,
        };
        update
            .map_err(|err| interceptor.reject(err))?
            .apply(&mut url, &mut config);
    }
    Ok((url, config))
}

// ============================================================================
// Response interceptors
// ============================================================================

type FulfilledFn = dyn Fn(Response) -> BoxFuture<'static, Result<Response>> + Send + Sync;
type RecoverFn = dyn Fn(Error) -> BoxFuture<'static, Result<Response>> + Send + Sync;

/// Post-dispatch hook pair.
///
/// Either handler may turn a success into a failure or the reverse; the
/// outcome is what the next interceptor sees.
#[derive(Clone, Default)]
pub struct ResponseInterceptor {
    fulfilled: Option<Arc<FulfilledFn>>,
    rejected: Option<Arc<RecoverFn>>,
}

impl std::fmt::Debug for ResponseInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseInterceptor")
            .field("fulfilled", &self.fulfilled.is_some())
            .field("rejected", &self.rejected.is_some())
            .finish()
    }
}

impl ResponseInterceptor {
    /// Interceptor that passes everything through.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle successful responses.
    #[must_use]
    pub fn on_fulfilled<F, Fut>(mut self, fulfilled: F) -> Self
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        self.fulfilled = Some(Arc::new(
            move |response: Response| -> BoxFuture<'static, Result<Response>> {
                Box::pin(fulfilled(response))
            },
        ));
        self
    }

    /// Handle failures, possibly recovering them into a response.
    #[must_use]
    pub fn on_rejected<F, Fut>(mut self, rejected: F) -> Self
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        self.rejected = Some(Arc::new(
            move |err: Error| -> BoxFuture<'static, Result<Response>> { Box::pin(rejected(err)) },
        ));
        self
    }

    async fn then(&self, result: Result<Response>) -> Result<Response> {
        match (result, &self.fulfilled, &self.rejected) {
            (Ok(response), Some(fulfilled), _) => fulfilled(response).await,
            (Err(err), _, Some(rejected)) => rejected(err).await,
            (result, _, _) => result,
        }
    }
}

/// Fold `result` through `interceptors` in registration order.
pub(crate) async fn apply_response(
    interceptors: &[Arc<ResponseInterceptor>],
    mut result: Result<Response>,
) -> Result<Response> {
    for interceptor in interceptors {
        result = interceptor.then(result).await;
    }
    result
}
