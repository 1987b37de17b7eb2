//! tenantry pipeline - tenant enforcement, validation and caching
//!
//! Requests travel through a fixed chain of interceptors before they reach
//! the handler:
//!
//! ```text
//! EnforcementInterceptor  -> TenantError::NotSet when a tenant-required request has no tenant
//! ValidationInterceptor   -> TenantError::Access when the request targets another tenant
//! [custom interceptors]
//! CacheInterceptor        -> serves and stores responses under "Tenant:<id>:<key>"
//! handler
//! ```
//!
//! Request types declare what they need through [`Request`]: the
//! `REQUIRES_TENANT` marker, the [`TenantBound`] capability and the
//! [`Cacheable`] capability. Nothing is discovered at runtime.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = Pipeline::standard(
//!     handler_fn(|req: TenantScoped<GetOrders>, _scope| async move { load(&req).await }),
//!     InMemoryCacheStore::with_defaults(),
//! );
//!
//! let scope = RequestScope::for_tenant(tenant_id.clone());
//! let orders = pipeline.send(&TenantScoped::new(tenant_id, GetOrders), &scope).await?;
//! ```

pub mod cache;
pub mod chain;
pub mod enforcement;
pub mod pipeline;
pub mod request;
pub mod validation;

pub use cache::CacheInterceptor;
pub use chain::{ensure_not_cancelled, handler_fn, Handler, HandlerFn, Interceptor, Next};
pub use enforcement::EnforcementInterceptor;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use request::{Cacheable, Request, TenantBound, TenantScoped};
pub use validation::ValidationInterceptor;
