//! Tenant enforcement: tenant-required requests never run without a tenant.

use async_trait::async_trait;
use tenantry_core::{RequestScope, TenancyResult, TenantError};

use crate::chain::{ensure_not_cancelled, Interceptor, Next};
use crate::request::Request;

/// Rejects requests marked `REQUIRES_TENANT` when the scope has no active
/// tenant. Everything else passes straight through.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnforcementInterceptor;

impl EnforcementInterceptor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<R: Request> Interceptor<R> for EnforcementInterceptor {
    async fn intercept(
        &self,
        request: &R,
        scope: &RequestScope,
        next: Next<'_, R>,
    ) -> TenancyResult<R::Response> {
        ensure_not_cancelled(scope)?;

        if R::REQUIRES_TENANT && !scope.tenant().has_tenant() {
            return Err(TenantError::NotSet.into());
        }

        next.run(request, scope).await
    }
}
