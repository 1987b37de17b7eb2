//! Request capabilities.
//!
//! A request opts into tenant handling through the [`Request`] trait alone:
//!
//! - `REQUIRES_TENANT` marks it as unusable without an active tenant,
//! - [`Request::tenant_bound`] exposes the tenant it targets,
//! - [`Request::cacheable`] exposes its cache key and expiration hints.
//!
//! All three are resolved statically from the request type. Wrapping a
//! request in [`TenantScoped`], a reference, `Box` or `Arc` keeps (or adds) the
//! capabilities, so a composed request can never silently lose them.

use std::borrow::Cow;
use std::ops::Deref;
use std::sync::Arc;

use tenantry_core::{HasTenant, TenantId};

/// A value sent through the pipeline.
pub trait Request: Send + Sync {
    /// What the handler produces. Cloned out of the cache on a hit.
    type Response: Clone + Send + Sync + 'static;

    /// Whether the request must not run without an active tenant.
    const REQUIRES_TENANT: bool = false;

    /// The target-tenant capability, if this request declares one.
    fn tenant_bound(&self) -> Option<&dyn TenantBound> {
        None
    }

    /// The caching capability, if this request opts into caching.
    fn cacheable(&self) -> Option<&dyn Cacheable> {
        None
    }
}

/// A request that names the tenant it is meant for.
pub trait TenantBound: Send + Sync {
    /// The declared target tenant. `None` means the request carries the
    /// capability but no value, which is not treated as a mismatch.
    fn target_tenant(&self) -> Option<&TenantId>;
}

/// A request whose response may be served from the tenant-scoped cache.
pub trait Cacheable: Send + Sync {
    /// Key identifying the response within a tenant.
    fn cache_key(&self) -> Cow<'_, str>;

    /// Skip the cache entirely (no read, no write) for this request.
    fn bypass_cache(&self) -> bool {
        false
    }

    fn absolute_expiration_seconds(&self) -> Option<u64> {
        None
    }

    fn sliding_expiration_seconds(&self) -> Option<u64> {
        None
    }
}

impl<R: Request> Request for &R {
    type Response = R::Response;
    const REQUIRES_TENANT: bool = R::REQUIRES_TENANT;

    fn tenant_bound(&self) -> Option<&dyn TenantBound> {
        (**self).tenant_bound()
    }

    fn cacheable(&self) -> Option<&dyn Cacheable> {
        (**self).cacheable()
    }
}

impl<R: Request> Request for Box<R> {
    type Response = R::Response;
    const REQUIRES_TENANT: bool = R::REQUIRES_TENANT;

    fn tenant_bound(&self) -> Option<&dyn TenantBound> {
        (**self).tenant_bound()
    }

    fn cacheable(&self) -> Option<&dyn Cacheable> {
        (**self).cacheable()
    }
}

impl<R: Request> Request for Arc<R> {
    type Response = R::Response;
    const REQUIRES_TENANT: bool = R::REQUIRES_TENANT;

    fn tenant_bound(&self) -> Option<&dyn TenantBound> {
        (**self).tenant_bound()
    }

    fn cacheable(&self) -> Option<&dyn Cacheable> {
        (**self).cacheable()
    }
}

/// Base for tenant-scoped requests.
///
/// Wrapping any request in `TenantScoped` makes it tenant-required and
/// bound to `tenant_id`, while keeping the inner request's caching
/// capability. Handlers reach the inner request through `Deref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScoped<R> {
    tenant_id: TenantId,
    inner: R,
}

impl<R> TenantScoped<R> {
    pub fn new(tenant_id: TenantId, inner: R) -> Self {
        Self { tenant_id, inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> Deref for TenantScoped<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.inner
    }
}

impl<R> HasTenant for TenantScoped<R> {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

impl<R: Send + Sync> TenantBound for TenantScoped<R> {
    fn target_tenant(&self) -> Option<&TenantId> {
        Some(&self.tenant_id)
    }
}

impl<R: Request> Request for TenantScoped<R> {
    type Response = R::Response;
    const REQUIRES_TENANT: bool = true;

    fn tenant_bound(&self) -> Option<&dyn TenantBound> {
        Some(self)
    }

    fn cacheable(&self) -> Option<&dyn Cacheable> {
        self.inner.cacheable()
    }
}
