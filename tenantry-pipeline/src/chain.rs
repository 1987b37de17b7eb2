//! Handler and interceptor contracts, and the continuation that links them.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tenantry_core::{RequestScope, TenancyError, TenancyResult};

use crate::request::Request;

/// The operation at the end of the pipeline.
#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: &R, scope: &RequestScope) -> TenancyResult<R::Response>;
}

#[async_trait]
impl<R, H> Handler<R> for Arc<H>
where
    R: Request,
    H: Handler<R> + ?Sized,
{
    async fn handle(&self, request: &R, scope: &RequestScope) -> TenancyResult<R::Response> {
        (**self).handle(request, scope).await
    }
}

/// Handler built from a closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Adapt a closure into a [`Handler`].
///
/// The closure receives owned clones of the request and scope so the
/// returned future does not borrow from the pipeline.
///
/// ```ignore
/// let handler = handler_fn(|req: GetOrder, _scope| async move {
///     Ok(format!("order {}", req.id))
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

#[async_trait]
impl<R, F, Fut> Handler<R> for HandlerFn<F>
where
    R: Request + Clone,
    F: Fn(R, RequestScope) -> Fut + Send + Sync,
    Fut: Future<Output = TenancyResult<R::Response>> + Send + 'static,
{
    async fn handle(&self, request: &R, scope: &RequestScope) -> TenancyResult<R::Response> {
        (self.f)(request.clone(), scope.clone()).await
    }
}

/// A stage wrapped around the rest of the pipeline.
///
/// An interceptor either returns on its own (short-circuit) or calls
/// [`Next::run`] and passes the result through.
#[async_trait]
pub trait Interceptor<R: Request>: Send + Sync {
    async fn intercept(
        &self,
        request: &R,
        scope: &RequestScope,
        next: Next<'_, R>,
    ) -> TenancyResult<R::Response>;
}

/// The remainder of the pipeline after the current interceptor.
pub struct Next<'a, R: Request> {
    chain: &'a [Arc<dyn Interceptor<R>>],
    handler: &'a dyn Handler<R>,
}

impl<'a, R: Request> Next<'a, R> {
    pub(crate) fn new(chain: &'a [Arc<dyn Interceptor<R>>], handler: &'a dyn Handler<R>) -> Self {
        Self { chain, handler }
    }

    /// Run the next interceptor, or the handler when none are left.
    pub async fn run(self, request: &R, scope: &RequestScope) -> TenancyResult<R::Response> {
        match self.chain.split_first() {
            Some((first, rest)) => {
                first
                    .intercept(request, scope, Next::new(rest, self.handler))
                    .await
            }
            None => self.handler.handle(request, scope).await,
        }
    }

    /// Number of interceptors still to run before the handler.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// Fail with [`TenancyError::Cancelled`] once the host has cancelled.
pub fn ensure_not_cancelled(scope: &RequestScope) -> TenancyResult<()> {
    if scope.is_cancelled() {
        return Err(TenancyError::Cancelled);
    }
    Ok(())
}
