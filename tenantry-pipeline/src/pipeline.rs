//! Pipeline composition.
//!
//! # Stage order
//!
//! ```text
//! Enforcement -> Validation -> [custom interceptors] -> Cache -> handler
//! ```
//!
//! The order of the built-in stages is fixed no matter in which order the
//! builder methods are called. Enforcement rejects a missing tenant before
//! validation compares anything, and the cache sits next to the handler so a
//! hit is only ever returned after the tenant checks have passed for the
//! current request.

use std::sync::Arc;

use tenantry_cache::CacheStore;
use tenantry_core::{PipelineConfig, RequestScope, TenancyResult, TenantId};
use tracing::Instrument;

use crate::cache::CacheInterceptor;
use crate::chain::{Handler, Interceptor, Next};
use crate::enforcement::EnforcementInterceptor;
use crate::request::Request;
use crate::validation::ValidationInterceptor;

/// Interceptors composed around a handler.
///
/// A pipeline holds no per-request state; share it behind an `Arc` and call
/// [`send`](Self::send) from as many tasks as needed.
pub struct Pipeline<R: Request> {
    chain: Vec<Arc<dyn Interceptor<R>>>,
    handler: Arc<dyn Handler<R>>,
}

impl<R: Request> Pipeline<R> {
    /// Start building a pipeline around `handler`.
    pub fn builder<H>(handler: H) -> PipelineBuilder<R>
    where
        H: Handler<R> + 'static,
    {
        PipelineBuilder::new(handler)
    }

    /// Enforcement, validation and caching around `handler`.
    pub fn standard<H, S>(handler: H, store: S) -> Self
    where
        H: Handler<R> + 'static,
        S: CacheStore + 'static,
    {
        Self::builder(handler)
            .with_enforcement()
            .with_validation()
            .with_cache(store)
            .build()
    }

    /// Assemble the stages switched on in `config`.
    pub fn from_config<H, S>(handler: H, config: &PipelineConfig, store: S) -> Self
    where
        H: Handler<R> + 'static,
        S: CacheStore + 'static,
    {
        let mut builder = Self::builder(handler);
        if config.enforcement {
            builder = builder.with_enforcement();
        }
        if config.validation {
            builder = builder.with_validation();
        }
        if config.caching {
            builder = builder.with_cache(store);
        }
        builder.build()
    }

    /// Run `request` through every stage and the handler.
    ///
    /// Errors from any stage or from the handler are returned unchanged.
    pub async fn send(&self, request: &R, scope: &RequestScope) -> TenancyResult<R::Response> {
        let span = tracing::debug_span!(
            "tenant_pipeline",
            request = std::any::type_name::<R>(),
            tenant_id = scope.tenant().id().map(TenantId::as_str),
        );

        Next::new(&self.chain, self.handler.as_ref())
            .run(request, scope)
            .instrument(span)
            .await
    }

    /// Number of interceptors in front of the handler.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl<R: Request> Clone for Pipeline<R> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<R: Request> std::fmt::Debug for Pipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("request", &std::any::type_name::<R>())
            .field("interceptors", &self.chain.len())
            .finish()
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder<R: Request> {
    handler: Arc<dyn Handler<R>>,
    enforcement: bool,
    validation: bool,
    custom: Vec<Arc<dyn Interceptor<R>>>,
    cache: Option<Arc<dyn Interceptor<R>>>,
}

impl<R: Request> PipelineBuilder<R> {
    pub fn new<H>(handler: H) -> Self
    where
        H: Handler<R> + 'static,
    {
        Self {
            handler: Arc::new(handler),
            enforcement: false,
            validation: false,
            custom: Vec::new(),
            cache: None,
        }
    }

    pub fn with_enforcement(mut self) -> Self {
        self.enforcement = true;
        self
    }

    pub fn with_validation(mut self) -> Self {
        self.validation = true;
        self
    }

    /// Cache responses in `store`. Replaces any store set earlier.
    pub fn with_cache<S>(mut self, store: S) -> Self
    where
        S: CacheStore + 'static,
    {
        self.cache = Some(Arc::new(CacheInterceptor::new(store)));
        self
    }

    /// Add a custom stage. Custom stages run after validation and before the
    /// cache, in the order they were added.
    pub fn with_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: Interceptor<R> + 'static,
    {
        self.custom.push(Arc::new(interceptor));
        self
    }

    pub fn build(self) -> Pipeline<R> {
        let mut chain: Vec<Arc<dyn Interceptor<R>>> = Vec::with_capacity(self.custom.len() + 3);
        if self.enforcement {
            chain.push(Arc::new(EnforcementInterceptor));
        }
        if self.validation {
            chain.push(Arc::new(ValidationInterceptor));
        }
        chain.extend(self.custom);
        if let Some(cache) = self.cache {
            chain.push(cache);
        }

        Pipeline {
            chain,
            handler: self.handler,
        }
    }
}
