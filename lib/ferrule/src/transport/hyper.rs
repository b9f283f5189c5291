//! Network transport using hyper-util.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use ferrule_core::transport::Dispatch;
use ferrule_core::{Error, RequestConfig, Response, Result, Transport};
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower_service::Service;

use super::connector::https_connector;

/// Future type of the [`Service`] implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// Transport over a pooled hyper-util client with rustls TLS.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use ferrule::{Client, HyperTransport};
///
/// let transport = HyperTransport::builder()
///     .connect_timeout(Duration::from_secs(5))
///     .build();
/// let client = Client::builder().adapter(transport).build();
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    /// Create a transport with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new transport builder.
    #[must_use]
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::default()
    }

    /// Build a hyper request from a resolved configuration.
    fn build_hyper_request(config: &RequestConfig) -> Result<http::Request<Full<Bytes>>> {
        let url = config.full_url()?;
        let body = config
            .body
            .as_ref()
            .map(ferrule_core::Body::to_bytes)
            .transpose()?
            .unwrap_or_default();

        let mut request = http::Request::builder()
            .method(http::Method::from(config.method))
            .uri(url.as_str())
            .body(Full::new(body))
            .map_err(|e| Error::invalid_argument(e.to_string()))?;

        *request.headers_mut() = config.headers.clone();
        if let Some(body) = &config.body
            && !request.headers().contains_key(CONTENT_TYPE)
        {
            request.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static(body.content_type().as_str()),
            );
        }

        Ok(request)
    }

    async fn execute(&self, config: Arc<RequestConfig>) -> Result<Response> {
        let hyper_request = Self::build_hyper_request(&config)?;

        let response = self
            .inner
            .request(hyper_request)
            .await
            .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::network(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, headers, body))
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        if err.is_connect() {
            return Error::network(format!("connection failed: {err}"));
        }
        Error::network(err.to_string())
    }
}

impl Transport for HyperTransport {
    fn name(&self) -> &'static str {
        "hyper"
    }

    fn dispatch(&self, config: Arc<RequestConfig>) -> Dispatch {
        let client = self.clone();
        let url = config.url.clone();
        Dispatch::new(async move { client.execute(config).await }).with_abort(move || {
            tracing::debug!(%url, "hyper request aborted");
        })
    }
}

// ============================================================================
// Tower Service Implementation
// ============================================================================

impl Service<Arc<RequestConfig>> for HyperTransport {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, config: Arc<RequestConfig>) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.execute(config).await })
    }
}

/// Builder for [`HyperTransport`].
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct HyperTransportBuilder {
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
}

impl HyperTransportBuilder {
    /// Default connection timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default maximum idle connections per host.
    pub const DEFAULT_POOL_IDLE_PER_HOST: usize = 32;
    /// Default idle connection timeout.
    pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Set the connection timeout.
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Build the transport.
    #[must_use]
    pub fn build(self) -> HyperTransport {
        let connector = https_connector(Some(
            self.connect_timeout
                .unwrap_or(Self::DEFAULT_CONNECT_TIMEOUT),
        ));

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(
                self.pool_idle_timeout
                    .unwrap_or(Self::DEFAULT_POOL_IDLE_TIMEOUT),
            )
            .pool_max_idle_per_host(
                self.pool_idle_per_host
                    .unwrap_or(Self::DEFAULT_POOL_IDLE_PER_HOST),
            )
            .build(connector);

        HyperTransport { inner }
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use ferrule_core::{Body, Method, RequestOptions};

    use super::*;

    #[test]
    fn builds_request_with_params_and_content_type() {
        let config = RequestOptions::new()
            .method(Method::Post)
            .base_url("https://api.example.com")
            .param("dry_run", "true")
            .body(Body::Json(serde_json::json!({"name": "ferrule"})))
            .resolve("/crates")
            .expect("resolve");

        let request = HyperTransport::build_hyper_request(&config).expect("request");
        check!(request.method() == http::Method::POST);
        check!(request.uri() == "https://api.example.com/crates?dry_run=true");
        check!(request.headers()[CONTENT_TYPE] == "application/json");
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let config = RequestOptions::new()
            .method(Method::Put)
            .header("Content-Type", "application/merge-patch+json")
            .body("{}")
            .resolve("https://api.example.com/crates/1")
            .expect("resolve");

        let request = HyperTransport::build_hyper_request(&config).expect("request");
        check!(request.headers()[CONTENT_TYPE] == "application/merge-patch+json");
    }

    #[test]
    fn relative_url_without_base_is_rejected() {
        let config = RequestOptions::new().resolve("/crates").expect("resolve");
        let_assert!(Err(Error::InvalidUrl(_)) = HyperTransport::build_hyper_request(&config));
    }
}
