//! Per-request tenant context
//!
//! The host builds a [`RequestScope`] for every unit of work and hands it to
//! the pipeline explicitly. Nothing here is global or shared between
//! requests; the only shared piece is the [`CancellationFlag`], which the
//! host keeps a clone of so it can abort the request.

use crate::{TenantId, TenantInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The tenant attached to the current unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTenant {
    id: TenantId,
    identifier: String,
    name: String,
}

impl CurrentTenant {
    /// Identifier and name both default to the id value.
    pub fn new(id: TenantId) -> Self {
        let value = id.as_str().to_string();
        Self {
            id,
            identifier: value.clone(),
            name: value,
        }
    }

    /// Set the human-readable or slug identifier.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn id(&self) -> &TenantId {
        &self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<TenantInfo> for CurrentTenant {
    fn from(info: TenantInfo) -> Self {
        let name = info.name().to_string();
        Self::new(info.id().clone()).with_name(name)
    }
}

/// Read-only snapshot of the active tenant for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    current: Option<CurrentTenant>,
}

impl TenantContext {
    /// A context with no active tenant.
    pub fn none() -> Self {
        Self { current: None }
    }

    /// A context with `tenant` active.
    pub fn active(tenant: impl Into<CurrentTenant>) -> Self {
        Self {
            current: Some(tenant.into()),
        }
    }

    pub fn has_tenant(&self) -> bool {
        self.current.is_some()
    }

    /// Active tenant id, `None` when no tenant is set.
    pub fn id(&self) -> Option<&TenantId> {
        self.current.as_ref().map(CurrentTenant::id)
    }

    pub fn current(&self) -> Option<&CurrentTenant> {
        self.current.as_ref()
    }
}

impl From<TenantId> for CurrentTenant {
    fn from(id: TenantId) -> Self {
        Self::new(id)
    }
}

impl From<Option<TenantId>> for TenantContext {
    fn from(id: Option<TenantId>) -> Self {
        match id {
            Some(id) => Self::active(id),
            None => Self::none(),
        }
    }
}

/// Cooperative cancellation signal for one request.
///
/// Clones share the same flag. Interceptors check it on entry and stop with
/// `TenancyError::Cancelled` before doing any work of their own.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Everything the pipeline needs to know about the current request besides
/// the request value itself.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    tenant: TenantContext,
    cancellation: CancellationFlag,
}

impl RequestScope {
    pub fn new(tenant: TenantContext) -> Self {
        Self {
            tenant,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Scope without an active tenant.
    pub fn anonymous() -> Self {
        Self::new(TenantContext::none())
    }

    /// Scope with `tenant` active.
    pub fn for_tenant(tenant: impl Into<CurrentTenant>) -> Self {
        Self::new(TenantContext::active(tenant))
    }

    /// Attach a host-owned cancellation flag.
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
