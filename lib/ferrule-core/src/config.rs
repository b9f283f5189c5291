//! Request configuration.
//!
//! [`RequestOptions`] is a partial, layerable description of a call. Layers
//! are combined with [`RequestOptions::merge`] (higher layer wins) and then
//! resolved into an immutable [`RequestConfig`]:
//!
//! ```
//! use std::time::Duration;
//! use ferrule_core::{Method, RequestOptions};
//!
//! let instance = RequestOptions::new()
//!     .base_url("https://api.example.com")
//!     .timeout(Duration::from_secs(5));
//! let call = RequestOptions::new().method(Method::Post).param("page", "2");
//!
//! let config = RequestOptions::defaults()
//!     .merge(instance)
//!     .merge(call)
//!     .resolve("/users")
//!     .expect("valid options");
//!
//! assert_eq!(config.method, Method::Post);
//! assert_eq!(config.timeout, Duration::from_secs(5));
//! assert_eq!(
//!     config.full_url().expect("url").as_str(),
//!     "https://api.example.com/users?page=2"
//! );
//! ```

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::{Body, CancelToken, Error, Method, Response, Result, Transport};

/// Default time-to-live of cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default `Accept` header.
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Recovers a failed call into a response.
pub type ErrorHandler = Arc<dyn Fn(Error) -> Result<Response> + Send + Sync>;

/// Decides whether a call may use the response cache.
pub type CachePredicate = Arc<dyn Fn(&str, &RequestConfig) -> bool + Send + Sync>;

/// Decides whether a status code counts as success.
pub type StatusValidator = Arc<dyn Fn(u16) -> bool + Send + Sync>;

/// How the response body should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseType {
    /// Parse a non-empty body as JSON into [`Response::data`].
    #[default]
    Json,
    /// Require a UTF-8 body, exposed as a JSON string in [`Response::data`].
    Text,
    /// Keep the raw bytes only.
    Bytes,
}

/// Per-call cache policy.
#[derive(Clone, Default)]
pub struct CachePolicy {
    /// Whether the call may read and populate the cache.
    pub use_cache: bool,
    /// Entry lifetime; zero keeps the entry until evicted or deleted.
    pub ttl: Duration,
    /// Custom eligibility predicate; defaults to "method is GET".
    pub validate: Option<CachePredicate>,
}

impl std::fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePolicy")
            .field("use_cache", &self.use_cache)
            .field("ttl", &self.ttl)
            .field("custom_validate", &self.validate.is_some())
            .finish()
    }
}

impl CachePolicy {
    /// Returns `true` if the call is cache-eligible.
    #[must_use]
    pub fn is_eligible(&self, config: &RequestConfig) -> bool {
        let allowed = match &self.validate {
            Some(validate) => validate(&config.url, config),
            None => config.method == Method::Get,
        };
        allowed && self.use_cache
    }
}

/// Resolved, immutable configuration of one call.
#[derive(Clone)]
pub struct RequestConfig {
    /// HTTP method.
    pub method: Method,
    /// URL as given by the caller, absolute or relative to `base_url`.
    pub url: String,
    /// Prefix for relative URLs.
    pub base_url: Option<String>,
    /// Request headers (case-insensitive names).
    pub headers: HeaderMap,
    /// Request payload.
    pub body: Option<Body>,
    /// Query parameters, in insertion order.
    pub params: Vec<(String, String)>,
    /// Overall timeout; zero disables it.
    pub timeout: Duration,
    /// Response decoding hint.
    pub response_type: ResponseType,
    /// Keep undecodable bodies instead of failing.
    pub lenient_parsing: bool,
    /// Custom status validator; defaults to 2xx.
    pub validate_status: Option<StatusValidator>,
    /// Cancellation handle.
    pub cancel_token: Option<CancelToken>,
    /// Cache policy.
    pub cache: CachePolicy,
    /// Transport override.
    pub adapter: Option<Arc<dyn Transport>>,
    /// Error-to-success recovery.
    pub error_handler: Option<ErrorHandler>,
}

impl std::fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestConfig")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("timeout", &self.timeout)
            .field("response_type", &self.response_type)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: Method::Get,
            url: String::new(),
            base_url: None,
            headers: HeaderMap::new(),
            body: None,
            params: Vec::new(),
            timeout: Duration::ZERO,
            response_type: ResponseType::Json,
            lenient_parsing: false,
            validate_status: None,
            cancel_token: None,
            cache: CachePolicy {
                ttl: DEFAULT_CACHE_TTL,
                ..CachePolicy::default()
            },
            adapter: None,
            error_handler: None,
        }
    }
}

impl RequestConfig {
    /// Returns `true` if a status passes the configured validator.
    #[must_use]
    pub fn accepts_status(&self, status: u16) -> bool {
        match &self.validate_status {
            Some(validate) => validate(status),
            None => (200..300).contains(&status),
        }
    }

    /// Returns `true` if this call may use the response cache.
    #[must_use]
    pub fn is_cache_eligible(&self) -> bool {
        self.cache.is_eligible(self)
    }

    /// `url` prefixed with `base_url` when relative, without `params`.
    pub fn joined_url(&self) -> Result<Url> {
        match (&self.base_url, Url::parse(&self.url)) {
            (_, Ok(absolute)) => Ok(absolute),
            (Some(base), Err(url::ParseError::RelativeUrlWithoutBase)) => Ok(Url::parse(&format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.url.trim_start_matches('/')
            ))?),
            (_, Err(err)) => Err(err.into()),
        }
    }

    /// Final URL: `base_url` joined with `url`, plus query parameters.
    pub fn full_url(&self) -> Result<Url> {
        let mut url = self.joined_url()?;

        if !self.params.is_empty() {
            url.set_fragment(None);
            let mut query = url.query_pairs_mut();
            for (name, value) in &self.params {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Partial request configuration, layered with [`RequestOptions::merge`].
#[derive(Clone, Default)]
pub struct RequestOptions {
    method: Option<Method>,
    base_url: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Body>,
    params: Vec<(String, String)>,
    timeout: Option<Duration>,
    response_type: Option<ResponseType>,
    lenient_parsing: Option<bool>,
    validate_status: Option<StatusValidator>,
    cancel_token: Option<CancelToken>,
    use_cache: Option<bool>,
    ttl: Option<Duration>,
    validate_cache: Option<CachePredicate>,
    adapter: Option<Arc<dyn Transport>>,
    error_handler: Option<ErrorHandler>,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("timeout", &self.timeout)
            .field("use_cache", &self.use_cache)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl RequestOptions {
    /// Empty options: every field inherits from lower layers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library defaults, the lowest layer.
    #[must_use]
    pub fn defaults() -> Self {
        Self::new()
            .method(Method::Get)
            .header(http::header::ACCEPT.as_str(), DEFAULT_ACCEPT)
            .timeout(Duration::ZERO)
            .response_type(ResponseType::Json)
            .use_cache(false)
            .ttl(DEFAULT_CACHE_TTL)
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the prefix for relative URLs.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set a header, replacing any earlier value with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: serde::Serialize>(self, value: &T) -> Result<Self> {
        Ok(self.body(Body::json(value)?))
    }

    /// Append a query parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Set the timeout; zero disables it.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the response decoding hint.
    #[must_use]
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Keep undecodable bodies instead of failing with a parse error.
    #[must_use]
    pub fn lenient_parsing(mut self, lenient: bool) -> Self {
        self.lenient_parsing = Some(lenient);
        self
    }

    /// Set a custom status validator.
    #[must_use]
    pub fn validate_status<F>(mut self, validate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Some(Arc::new(validate));
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Enable or disable the response cache for the call.
    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    /// Set the cache entry lifetime; zero keeps entries indefinitely.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set a custom cache eligibility predicate.
    #[must_use]
    pub fn validate_cache<F>(mut self, validate: F) -> Self
    where
        F: Fn(&str, &RequestConfig) -> bool + Send + Sync + 'static,
    {
        self.validate_cache = Some(Arc::new(validate));
        self
    }

    /// Override the transport.
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn Transport>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Recover failures of the call into a response.
    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Error) -> Result<Response> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Merge a higher-precedence layer over this one.
    ///
    /// Scalar fields take `higher`'s value when set. Headers and query
    /// parameters are unioned, `higher` winning per name.
    #[must_use]
    pub fn merge(self, higher: Self) -> Self {
        let mut headers = self.headers;
        headers.retain(|(name, _)| {
            !higher
                .headers
                .iter()
                .any(|(other, _)| other.eq_ignore_ascii_case(name))
        });
        headers.extend(higher.headers);

        let mut params = self.params;
        params.retain(|(name, _)| !higher.params.iter().any(|(other, _)| other == name));
        params.extend(higher.params);

        Self {
            method: higher.method.or(self.method),
            base_url: higher.base_url.or(self.base_url),
            headers,
            body: higher.body.or(self.body),
            params,
            timeout: higher.timeout.or(self.timeout),
            response_type: higher.response_type.or(self.response_type),
            lenient_parsing: higher.lenient_parsing.or(self.lenient_parsing),
            validate_status: higher.validate_status.or(self.validate_status),
            cancel_token: higher.cancel_token.or(self.cancel_token),
            use_cache: higher.use_cache.or(self.use_cache),
            ttl: higher.ttl.or(self.ttl),
            validate_cache: higher.validate_cache.or(self.validate_cache),
            adapter: higher.adapter.or(self.adapter),
            error_handler: higher.error_handler.or(self.error_handler),
        }
    }

    /// Resolve into a [`RequestConfig`] for `url`.
    ///
    /// Unset fields fall back to the library defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid header name or value.
    pub fn resolve(self, url: impl Into<String>) -> Result<RequestConfig> {
        let defaults = RequestConfig::default();

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let header_name = HeaderName::try_from(name.as_str())
                .map_err(|e| Error::configuration(format!("header name '{name}': {e}")))?;
            let header_value = HeaderValue::try_from(value.as_str())
                .map_err(|e| Error::configuration(format!("header '{name}' value: {e}")))?;
            headers.insert(header_name, header_value);
        }

        Ok(RequestConfig {
            method: self.method.unwrap_or(defaults.method),
            url: url.into(),
            base_url: self.base_url,
            headers,
            body: self.body,
            params: self.params,
            timeout: self.timeout.unwrap_or(defaults.timeout),
            response_type: self.response_type.unwrap_or(defaults.response_type),
            lenient_parsing: self.lenient_parsing.unwrap_or(defaults.lenient_parsing),
            validate_status: self.validate_status,
            cancel_token: self.cancel_token,
            cache: CachePolicy {
                use_cache: self.use_cache.unwrap_or(defaults.cache.use_cache),
                ttl: self.ttl.unwrap_or(defaults.cache.ttl),
                validate: self.validate_cache,
            },
            adapter: self.adapter,
            error_handler: self.error_handler,
        })
    }
}

impl From<&RequestConfig> for RequestOptions {
    fn from(config: &RequestConfig) -> Self {
        let headers = config
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        Self {
            method: Some(config.method),
            base_url: config.base_url.clone(),
            headers,
            body: config.body.clone(),
            params: config.params.clone(),
            timeout: Some(config.timeout),
            response_type: Some(config.response_type),
            lenient_parsing: Some(config.lenient_parsing),
            validate_status: config.validate_status.clone(),
            cancel_token: config.cancel_token.clone(),
            use_cache: Some(config.cache.use_cache),
            ttl: Some(config.cache.ttl),
            validate_cache: config.cache.validate.clone(),
            adapter: config.adapter.clone(),
            error_handler: config.error_handler.clone(),
        }
    }
}
