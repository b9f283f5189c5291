//! Adapter turning any tower service into a [`Transport`].

use std::sync::{Arc, Mutex, PoisonError};

use ferrule_core::transport::Dispatch;
use ferrule_core::{Error, RequestConfig, Response, Transport};
use tower::ServiceExt;
use tower_service::Service;

/// [`Transport`] backed by a `tower::Service<Arc<RequestConfig>>`.
///
/// The service is cloned for each call, so layered stacks built with
/// `tower::ServiceBuilder` work as transports.
///
/// ```
/// use std::sync::Arc;
/// use ferrule::ServiceTransport;
/// use ferrule_core::{Error, RequestConfig, Response};
///
/// let transport = ServiceTransport::new(tower::service_fn(|_config: Arc<RequestConfig>| async {
///     Ok::<_, Error>(Response::from_data(200, serde_json::json!({"stub": true})))
/// }));
/// # let _ = transport;
/// ```
pub struct ServiceTransport<S> {
    inner: Mutex<S>,
}

impl<S> std::fmt::Debug for ServiceTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTransport").finish_non_exhaustive()
    }
}

impl<S> ServiceTransport<S> {
    /// Wrap `service`.
    pub fn new(service: S) -> Self {
        Self {
            inner: Mutex::new(service),
        }
    }
}

impl<S> Transport for ServiceTransport<S>
where
    S: Service<Arc<RequestConfig>, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    fn name(&self) -> &'static str {
        "service"
    }

    fn dispatch(&self, config: Arc<RequestConfig>) -> Dispatch {
        // Clone out of the lock; calls run without holding it.
        let service = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Dispatch::new(service.oneshot(config))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert2::check;

    use super::*;

    #[tokio::test]
    async fn service_transport_calls_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let transport = ServiceTransport::new(tower::service_fn(move |config: Arc<RequestConfig>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, Error>(Response::from_data(200, serde_json::json!(config.url.clone())))
            }
        }));

        let config = Arc::new(RequestConfig {
            url: "https://example.com/a".to_string(),
            ..RequestConfig::default()
        });
        let response = transport.dispatch(config).await.expect("response");

        check!(response.data() == Some(&serde_json::json!("https://example.com/a")));
        check!(calls.load(Ordering::SeqCst) == 1);
    }
}
