//! Cooperative cancellation.
//!
//! A [`CancelSource`] is created by the caller; its [`CancelToken`] travels
//! with the request configuration and is observed by the pipeline. A token
//! goes from pending to cancelled exactly once, and every subscriber is
//! notified at that moment.
//!
//! ```
//! use ferrule_core::CancelSource;
//!
//! let source = CancelSource::new();
//! let token = source.token();
//! assert!(!token.is_cancelled());
//!
//! source.cancel("user navigated away");
//! assert_eq!(token.reason().as_deref(), Some("user navigated away"));
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::{Error, Result};

type Listener = Box<dyn FnOnce(&str) + Send>;

#[derive(Default)]
struct TokenState {
    reason: Option<String>,
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<TokenState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle the caller keeps to cancel in-flight requests.
#[derive(Debug, Clone, Default)]
pub struct CancelSource {
    token: CancelToken,
}

impl CancelSource {
    /// Create a new, pending source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to attach to request configurations.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Cancel the token, notifying every subscriber.
    ///
    /// Returns `false` if the token was already cancelled; the first reason
    /// is kept.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.token.cancel(reason.into())
    }
}

/// Shared, clonable view of a cancellation state.
#[derive(Clone, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("CancelToken")
            .field("reason", &state.reason)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl CancelToken {
    fn cancel(&self, reason: String) -> bool {
        let listeners = {
            let mut state = self.shared.lock();
            if state.reason.is_some() {
                return false;
            }
            state.reason = Some(reason.clone());
            std::mem::take(&mut state.listeners)
        };

        tracing::debug!(%reason, listeners = listeners.len(), "cancel token fired");
        for (_, listener) in listeners {
            listener(&reason);
        }
        true
    }

    /// Returns `true` once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.lock().reason.is_some()
    }

    /// Cancellation reason, if cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.shared.lock().reason.clone()
    }

    /// Fail with [`Error::Cancelled`] if the token is already cancelled.
    pub fn throw_if_requested(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(Error::cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.shared.lock().listeners.len()
    }

    /// Register a one-shot listener.
    ///
    /// If the token is already cancelled the listener runs immediately.
    /// Dropping the returned [`Subscription`] unregisters a listener that
    /// has not fired yet.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let mut state = self.shared.lock();
        if let Some(reason) = state.reason.clone() {
            drop(state);
            listener(&reason);
            return Subscription { registration: None };
        }

        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, Box::new(listener)));

        Subscription {
            registration: Some((Arc::clone(&self.shared), id)),
        }
    }

    /// Future resolving with the reason once the token is cancelled.
    ///
    /// Resolves immediately when the token is already cancelled. The
    /// underlying subscription is released when the future is dropped.
    pub fn cancelled(&self) -> impl Future<Output = String> + Send + 'static {
        let (sender, receiver) = oneshot::channel();
        let subscription = self.subscribe(move |reason| {
            let _ = sender.send(reason.to_string());
        });

        async move {
            let _subscription = subscription;
            match receiver.await {
                Ok(reason) => reason,
                Err(_) => std::future::pending().await,
            }
        }
    }
}

/// Guard for a listener registered with [`CancelToken::subscribe`].
#[must_use = "dropping a subscription unregisters its listener"]
pub struct Subscription {
    registration: Option<(Arc<Shared>, u64)>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.registration.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some((shared, id)) = self.registration.take() {
            shared.lock().listeners.retain(|(other, _)| *other != id);
        }
    }
}
