//! Shared middleware and interceptor registry.
//!
//! A [`Registry`] owns the `global` and `core` middleware lists and the
//! global interceptors. Clients built from the same registry share them.
//! Lists are append-only; each call snapshots them when it starts, so a
//! registration never affects a call already in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ferrule_core::{Error, Result};

use crate::compose::Middleware;
use crate::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::middleware::{DispatchMiddleware, ParseResponse};

/// Where a middleware is registered.
///
/// Composition order is instance, default, global, core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MiddlewareScope {
    /// Private to one client, outermost.
    #[default]
    Instance,
    /// Client fallback list, after the instance list.
    Default,
    /// Shared through the registry.
    Global,
    /// Shared through the registry, innermost.
    Core,
}

static LEGACY_WARNED: AtomicBool = AtomicBool::new(false);

/// Registration options of `use_middleware`.
///
/// At most one flag may be set; none means [`MiddlewareScope::Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct UseOptions {
    /// Register in the shared global list.
    pub global: bool,
    /// Register in the shared core list.
    pub core: bool,
    /// Register in the client's default list.
    pub default_instance: bool,
}

impl UseOptions {
    /// Instance scope.
    pub const fn instance() -> Self {
        Self {
            global: false,
            core: false,
            default_instance: false,
        }
    }

    /// Global scope.
    pub const fn global() -> Self {
        Self {
            global: true,
            ..Self::instance()
        }
    }

    /// Core scope.
    pub const fn core() -> Self {
        Self {
            core: true,
            ..Self::instance()
        }
    }

    /// Default-instance scope.
    pub const fn default_instance() -> Self {
        Self {
            default_instance: true,
            ..Self::instance()
        }
    }

    /// Scope selected by the flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when more than one flag is set.
    pub fn scope(self) -> Result<MiddlewareScope> {
        match (self.global, self.core, self.default_instance) {
            (false, false, false) => Ok(MiddlewareScope::Instance),
            (true, false, false) => Ok(MiddlewareScope::Global),
            (false, true, false) => Ok(MiddlewareScope::Core),
            (false, false, true) => Ok(MiddlewareScope::Default),
            _ => Err(Error::configuration(format!(
                "middleware scope flags are exclusive, got {self:?}"
            ))),
        }
    }
}

/// Legacy numeric options: always the core scope.
impl From<u32> for UseOptions {
    fn from(legacy: u32) -> Self {
        if !LEGACY_WARNED.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                legacy,
                "numeric middleware options are deprecated, use UseOptions::core() instead"
            );
        }
        Self::core()
    }
}

impl From<MiddlewareScope> for UseOptions {
    fn from(scope: MiddlewareScope) -> Self {
        match scope {
            MiddlewareScope::Instance => Self::instance(),
            MiddlewareScope::Default => Self::default_instance(),
            MiddlewareScope::Global => Self::global(),
            MiddlewareScope::Core => Self::core(),
        }
    }
}

#[derive(Default)]
struct Lists {
    global: Vec<Arc<dyn Middleware>>,
    core: Vec<Arc<dyn Middleware>>,
    request_interceptors: Vec<Arc<RequestInterceptor>>,
    response_interceptors: Vec<Arc<ResponseInterceptor>>,
}

/// Shared, append-only middleware and interceptor lists.
pub struct Registry {
    lists: RwLock<Lists>,
    parse_response: Arc<dyn Middleware>,
    dispatch: Arc<dyn Middleware>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lists = self.read();
        f.debug_struct("Registry")
            .field("global", &lists.global.len())
            .field("core", &lists.core.len())
            .field("request_interceptors", &lists.request_interceptors.len())
            .field("response_interceptors", &lists.response_interceptors.len())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry holding only the built-in middleware.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lists: RwLock::default(),
            parse_response: Arc::new(ParseResponse),
            dispatch: Arc::new(DispatchMiddleware),
        }
    }

    /// Process-wide registry used by clients that were not given one.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    fn read(&self) -> RwLockReadGuard<'_, Lists> {
        self.lists.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Lists> {
        self.lists.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the global list, ahead of the built-in response parsing.
    pub fn use_global(&self, middleware: Arc<dyn Middleware>) {
        tracing::debug!(name = middleware.name(), "registering global middleware");
        self.write().global.push(middleware);
    }

    /// Append to the core list, ahead of the built-in dispatch.
    pub fn use_core(&self, middleware: Arc<dyn Middleware>) {
        tracing::debug!(name = middleware.name(), "registering core middleware");
        self.write().core.push(middleware);
    }

    /// Append a global request interceptor.
    pub fn intercept_request(&self, interceptor: RequestInterceptor) {
        self.write().request_interceptors.push(Arc::new(interceptor));
    }

    /// Append a global response interceptor.
    pub fn intercept_response(&self, interceptor: ResponseInterceptor) {
        self.write().response_interceptors.push(Arc::new(interceptor));
    }

    /// Snapshot of the global list, built-ins last.
    #[must_use]
    pub fn global_middleware(&self) -> Vec<Arc<dyn Middleware>> {
        let mut snapshot = self.read().global.clone();
        snapshot.push(Arc::clone(&self.parse_response));
        snapshot
    }

    /// Snapshot of the core list, built-ins last.
    #[must_use]
    pub fn core_middleware(&self) -> Vec<Arc<dyn Middleware>> {
        let mut snapshot = self.read().core.clone();
        snapshot.push(Arc::clone(&self.dispatch));
        snapshot
    }

    /// Snapshot of the global request interceptors.
    #[must_use]
    pub fn request_interceptors(&self) -> Vec<Arc<RequestInterceptor>> {
        self.read().request_interceptors.clone()
    }

    /// Snapshot of the global response interceptors.
    #[must_use]
    pub fn response_interceptors(&self) -> Vec<Arc<ResponseInterceptor>> {
        self.read().response_interceptors.clone()
    }
}
