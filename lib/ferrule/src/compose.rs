//! Onion composition of middleware.
//!
//! [`compose`] turns an ordered list of [`Middleware`] into a [`Pipeline`].
//! Each middleware receives the call [`Context`] and a [`Next`]
//! continuation; code before `next.run(ctx)` runs on the way in, code after
//! it on the way out, in mirror order:
//!
//! ```ignore
//! use ferrule::compose::{compose, from_fn};
//!
//! let pipeline = compose(vec![
//!     from_fn(|ctx, next| Box::pin(async move {
//!         tracing::info!(url = %ctx.req.url, "before");
//!         next.run(ctx).await?;
//!         tracing::info!("after");
//!         Ok(())
//!     })),
//! ]);
//! pipeline.run(&mut ctx, None).await?;
//! ```
//!
//! A continuation may be invoked at most once; a second invocation fails
//! with [`Error::InvariantViolation`] and runs nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ferrule_core::{Error, Result};
use futures_util::future::{self, BoxFuture};

use crate::Context;

/// A unit of behavior wrapping the rest of the pipeline.
pub trait Middleware: Send + Sync + 'static {
    /// Name shown in [`crate::MiddlewareSnapshot`] and logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Handle the call, delegating to the inner pipeline through `next`.
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>>;
}

/// Continuation into the inner part of the pipeline.
pub struct Next<'a> {
    chain: &'a Chain<'a>,
    index: usize,
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}

impl<'a> Next<'a> {
    /// Run the inner pipeline.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvariantViolation`] when this continuation was
    /// already invoked, otherwise propagates the inner pipeline's error.
    pub fn run<'b>(&self, ctx: &'b mut Context) -> BoxFuture<'b, Result<()>>
    where
        'a: 'b,
    {
        self.chain.dispatch(self.index, ctx)
    }
}

struct Chain<'a> {
    stack: &'a [Arc<dyn Middleware>],
    terminal: Option<&'a dyn Middleware>,
    // Highest entered position plus one; zero before the first dispatch.
    cursor: AtomicUsize,
}

impl<'a> Chain<'a> {
    fn dispatch(&'a self, index: usize, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        let position = index + 1;
        if self.cursor.fetch_max(position, Ordering::SeqCst) >= position {
            return Box::pin(future::ready(Err(Error::invariant(
                "next() called multiple times",
            ))));
        }

        let next = Next {
            chain: self,
            index: position,
        };
        match (self.stack.get(index), self.terminal) {
            (Some(middleware), _) => middleware.handle(ctx, next),
            (None, Some(terminal)) if index == self.stack.len() => terminal.handle(ctx, next),
            _ => Box::pin(future::ready(Ok(()))),
        }
    }
}

/// Composed middleware stack.
#[derive(Clone, Default)]
pub struct Pipeline {
    stack: Arc<[Arc<dyn Middleware>]>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stack.iter().map(|middleware| middleware.name()))
            .finish()
    }
}

impl Pipeline {
    /// Number of composed middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` if nothing was composed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Run the pipeline over `ctx`.
    ///
    /// Past the last middleware, `terminal` runs if given; otherwise the
    /// innermost `next` resolves immediately.
    pub async fn run(&self, ctx: &mut Context, terminal: Option<&dyn Middleware>) -> Result<()> {
        let chain = Chain {
            stack: &self.stack,
            terminal,
            cursor: AtomicUsize::new(0),
        };
        chain.dispatch(0, ctx).await
    }
}

/// Compose middleware, outermost first.
#[must_use]
pub fn compose(middleware: Vec<Arc<dyn Middleware>>) -> Pipeline {
    Pipeline {
        stack: middleware.into(),
    }
}

/// Middleware backed by a closure.
pub struct FnMiddleware<F> {
    name: &'static str,
    f: F,
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> FnMiddleware<F> {
    /// Set the name reported in snapshots.
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

/// Build a [`Middleware`] from a closure returning a boxed future.
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    FnMiddleware { name: "fn", f }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        (self.f)(ctx, next)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert2::{check, let_assert};
    use ferrule_core::{RequestConfig, Response};

    use super::*;
    use crate::cache::CacheStore;

    fn context() -> Context {
        Context::new(
            "https://example.com".to_string(),
            Arc::new(RequestConfig::default()),
            Arc::new(CacheStore::default()),
            Arc::from(Vec::new()),
            true,
        )
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn boxed(middleware: impl Middleware) -> Arc<dyn Middleware> {
        Arc::new(middleware)
    }

    fn marker(log: &Log, name: &'static str) -> Arc<dyn Middleware> {
        let log = Arc::clone(log);
        boxed(from_fn(move |ctx, next| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().expect("lock").push(format!("{name}-pre"));
                next.run(ctx).await?;
                log.lock().expect("lock").push(format!("{name}-post"));
                Ok(())
            })
        }))
    }

    #[tokio::test]
    async fn onion_ordering() {
        let log: Log = Arc::default();
        let pipeline = compose(vec![
            marker(&log, "A"),
            marker(&log, "B"),
            marker(&log, "C"),
        ]);

        let terminal_log = Arc::clone(&log);
        let terminal = from_fn(move |ctx, _next| {
            let log = Arc::clone(&terminal_log);
            Box::pin(async move {
                log.lock().expect("lock").push("terminal".to_string());
                ctx.res = Some(Response::from_data(200, serde_json::json!(null)));
                Ok(())
            })
        });

        let mut ctx = context();
        pipeline
            .run(&mut ctx, Some(&terminal as &dyn Middleware))
            .await
            .expect("run");

        let log = log.lock().expect("lock").join(",");
        check!(log == "A-pre,B-pre,C-pre,terminal,C-post,B-post,A-post");
        check!(ctx.res.is_some());
    }

    #[tokio::test]
    async fn next_twice_is_invariant_violation() {
        let inner_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&inner_calls);

        let pipeline = compose(vec![
            boxed(from_fn(|ctx, next| {
                Box::pin(async move {
                    next.run(ctx).await?;
                    next.run(ctx).await
                })
            })),
            boxed(from_fn(move |ctx, next| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    next.run(ctx).await
                })
            })),
        ]);

        let mut ctx = context();
        let result = pipeline.run(&mut ctx, None).await;
        let_assert!(Err(Error::InvariantViolation(message)) = result);
        check!(message == "next() called multiple times");
        check!(inner_calls.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn short_circuit_skips_inner_middleware() {
        let log: Log = Arc::default();
        let pipeline = compose(vec![
            boxed(from_fn(|ctx, _next| {
                Box::pin(async move {
                    ctx.res = Some(Response::from_data(200, serde_json::json!("cached")));
                    Ok(())
                })
            })),
            marker(&log, "inner"),
        ]);

        let mut ctx = context();
        pipeline.run(&mut ctx, None).await.expect("run");
        check!(log.lock().expect("lock").is_empty());
        check!(ctx.res.is_some());
    }

    #[tokio::test]
    async fn errors_stop_the_chain() {
        let log: Log = Arc::default();
        let pipeline = compose(vec![
            marker(&log, "outer"),
            boxed(from_fn(|_ctx, _next| {
                Box::pin(async move { Err(Error::network("connection reset")) })
            })),
            marker(&log, "inner"),
        ]);

        let mut ctx = context();
        let result = pipeline.run(&mut ctx, None).await;
        let_assert!(Err(Error::Network(_)) = result);
        check!(*log.lock().expect("lock") == vec!["outer-pre".to_string()]);
    }

    #[tokio::test]
    async fn empty_pipeline_resolves() {
        let pipeline = compose(Vec::new());
        check!(pipeline.is_empty());
        let mut ctx = context();
        pipeline.run(&mut ctx, None).await.expect("run");
        check!(ctx.res.is_none());
    }

    #[test]
    fn debug_lists_names() {
        let pipeline = compose(vec![boxed(
            from_fn(|ctx, next| next.run(ctx)).named("passthrough"),
        )]);
        check!(format!("{pipeline:?}") == r#"["passthrough"]"#);
    }
}
