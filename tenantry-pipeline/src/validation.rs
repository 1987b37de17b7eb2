//! Tenant validation: a request bound to one tenant cannot run under another.

use async_trait::async_trait;
use tenantry_core::{RequestScope, TenancyResult, TenantContext, TenantError};

use crate::chain::{ensure_not_cancelled, Interceptor, Next};
use crate::request::Request;

/// Rejects requests whose declared target tenant differs from the active
/// tenant.
///
/// Validation only applies when a tenant is active and the request both
/// exposes [`TenantBound`](crate::TenantBound) and carries a value. A bound
/// request with no target passes; enforcement is what guards against a
/// missing tenant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationInterceptor;

impl ValidationInterceptor {
    pub fn new() -> Self {
        Self
    }
}

/// Compare the request's declared tenant with the active one.
fn check_target<R: Request>(request: &R, tenant: &TenantContext) -> Result<(), TenantError> {
    let Some(active) = tenant.id() else {
        return Ok(());
    };

    match request.tenant_bound().and_then(|bound| bound.target_tenant()) {
        Some(target) if target != active => Err(TenantError::Access {
            expected: active.clone(),
            actual: target.clone(),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl<R: Request> Interceptor<R> for ValidationInterceptor {
    async fn intercept(
        &self,
        request: &R,
        scope: &RequestScope,
        next: Next<'_, R>,
    ) -> TenancyResult<R::Response> {
        ensure_not_cancelled(scope)?;
        check_target(request, scope.tenant())?;
        next.run(request, scope).await
    }
}
