//! Transport adapter seam.
//!
//! A [`Transport`] executes one resolved request against the network. The
//! pipeline races the returned [`Dispatch`] against cancellation and the
//! timeout; when the transport loses, [`Dispatch::abort`] drops the
//! in-flight future and runs the transport's abort hook.
//!
//! Implement [`Transport`] directly, or wrap a closure with [`from_fn`]:
//!
//! ```
//! use ferrule_core::{Response, transport};
//!
//! let echo = transport::from_fn(|config| async move {
//!     Ok(Response::new(200, http::HeaderMap::new(), config.url.clone()))
//! });
//! # let _ = echo;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;

use crate::{RequestConfig, Response, Result};

/// Hook run when an in-flight dispatch is abandoned.
pub type AbortHook = Box<dyn FnOnce() + Send>;

/// Executes resolved requests.
pub trait Transport: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Start executing `config`.
    ///
    /// The returned future fails with [`crate::Error::Network`] on
    /// transport-level failure.
    fn dispatch(&self, config: Arc<RequestConfig>) -> Dispatch;
}

/// One in-flight transport call.
#[must_use = "a dispatch does nothing unless polled"]
pub struct Dispatch {
    future: BoxFuture<'static, Result<Response>>,
    on_abort: Option<AbortHook>,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("abortable", &self.on_abort.is_some())
            .finish_non_exhaustive()
    }
}

impl Dispatch {
    /// Wrap a response future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Response>> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
            on_abort: None,
        }
    }

    /// Register the hook releasing transport resources on abort.
    pub fn with_abort<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_abort = Some(Box::new(hook));
        self
    }

    /// Abandon the call: drop the future, then run the abort hook.
    pub fn abort(self) {
        let Self { future, on_abort } = self;
        drop(future);
        if let Some(hook) = on_abort {
            hook();
        }
    }
}

impl Future for Dispatch {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

/// Transport backed by a closure.
#[derive(Clone)]
pub struct FnTransport<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransport").finish_non_exhaustive()
    }
}

/// Build a [`Transport`] from an async closure.
pub fn from_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(Arc<RequestConfig>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    FnTransport { f }
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(Arc<RequestConfig>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        "fn"
    }

    fn dispatch(&self, config: Arc<RequestConfig>) -> Dispatch {
        Dispatch::new((self.f)(config))
    }
}
