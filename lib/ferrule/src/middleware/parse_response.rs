//! Built-in global middleware decoding response bodies.

use ferrule_core::Result;
use futures_util::future::BoxFuture;

use crate::Context;
use crate::compose::{Middleware, Next};

/// Decodes the produced response according to the call's response type.
///
/// Runs after the inner pipeline; responses recovered without a body pass
/// through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseResponse;

impl Middleware for ParseResponse {
    fn name(&self) -> &'static str {
        "parse_response"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            next.run(ctx).await?;

            let response_type = ctx.config().response_type;
            let lenient = ctx.config().lenient_parsing;
            if let Some(response) = ctx.res.take() {
                ctx.res = Some(response.decode(response_type, lenient)?);
            }
            Ok(())
        })
    }
}
