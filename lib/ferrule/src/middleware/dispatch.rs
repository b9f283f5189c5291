//! Built-in core middleware performing the transport call.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use ferrule_core::{CancelToken, Error, RequestConfig, Response, Result};
use futures_util::future::BoxFuture;
use tracing::debug;

use crate::cache::CacheKey;
use crate::compose::{Middleware, Next};
use crate::transport::default_transport;
use crate::{Context, interceptor};

/// Innermost middleware: cache lookup, transport race, cache write and
/// response interceptors.
///
/// The transport call races the cancellation token and, when the timeout
/// is non-zero, a timer. The first to settle wins; a losing transport call
/// is aborted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchMiddleware;

impl Middleware for DispatchMiddleware {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let config = ctx.effective_config();
            let cache_key = if ctx.cache_supported() && config.is_cache_eligible() {
                Some(CacheKey::from_config(&config)?)
            } else {
                None
            };

            let cached = cache_key.as_ref().and_then(|key| ctx.cache().get(key));
            let result = if let Some(hit) = cached {
                debug!(url = %config.url, "served from cache");
                Ok(hit.with_config(Arc::clone(&config)))
            } else {
                let result = fetch(&config).await;
                if let (Ok(response), Some(key)) = (&result, cache_key)
                    && response.status() == 200
                {
                    ctx.cache().set(key, response.clone(), config.cache.ttl);
                }
                result
            };

            let settled = result.and_then(|response| settle(response, &config));
            let response = interceptor::apply_response(ctx.response_interceptors(), settled).await?;
            ctx.res = Some(response);
            next.run(ctx).await
        })
    }
}

async fn fetch(config: &Arc<RequestConfig>) -> Result<Response> {
    let transport = match &config.adapter {
        Some(adapter) => Arc::clone(adapter),
        None => default_transport()?,
    };
    if let Some(token) = &config.cancel_token {
        token.throw_if_requested()?;
    }

    debug!(
        transport = transport.name(),
        method = %config.method,
        url = %config.url,
        timeout = ?config.timeout,
        "dispatching request"
    );
    let mut dispatch = transport.dispatch(Arc::clone(config));
    let cancelled = cancellation(config.cancel_token.clone());
    let timer = deadline(config.timeout);

    let lost = tokio::select! {
        biased;
        reason = cancelled => Error::cancelled(reason),
        () = timer => Error::timeout(config.timeout),
        result = &mut dispatch => {
            return result.map(|response| response.with_config(Arc::clone(config)));
        }
    };

    debug!(error = %lost, "aborting transport call");
    dispatch.abort();
    Err(lost)
}

async fn cancellation(token: Option<CancelToken>) -> String {
    match token {
        Some(token) => token.cancelled().await,
        None => future::pending().await,
    }
}

async fn deadline(timeout: Duration) {
    if timeout.is_zero() {
        future::pending::<()>().await;
    } else {
        tokio::time::sleep(timeout).await;
    }
}

fn settle(response: Response, config: &RequestConfig) -> Result<Response> {
    let status = response.status();
    if config.accepts_status(status) {
        return Ok(response);
    }
    Err(Error::http(
        status,
        format!("request failed with status code {status}"),
        Some(response.body().clone()),
    ))
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use ferrule_core::RequestOptions;
    use http::HeaderMap;

    use super::*;

    #[test]
    fn settle_rejects_invalid_status() {
        let config = RequestConfig::default();
        let response = Response::new(404, HeaderMap::new(), "missing");

        let_assert!(Err(err) = settle(response, &config));
        check!(err.status() == Some(404));
        check!(err.body().map(|body| body.as_ref()) == Some(&b"missing"[..]));
    }

    #[test]
    fn settle_honours_custom_validator() {
        let config = RequestOptions::new()
            .validate_status(|status| status < 500)
            .resolve("https://example.com")
            .expect("resolve");
        let response = Response::new(404, HeaderMap::new(), "missing");
        check!(settle(response, &config).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_never_fires() {
        let result = tokio::time::timeout(Duration::from_secs(3600), deadline(Duration::ZERO)).await;
        check!(result.is_err());
    }
}
