//! Tenant metadata lookup.
//!
//! A directory answers "what do we know about this tenant" for a host that
//! already knows which tenant it is serving. Working out the tenant from a
//! token, header or subdomain is the host's job and does not live here.

use crate::{TenantId, TenantInfo};
use dashmap::DashMap;

/// Retrieves tenant metadata independent of infrastructure concerns.
pub trait TenantDirectory: Send + Sync {
    /// Metadata for the given tenant id, if known.
    fn tenant_info(&self, tenant_id: &TenantId) -> Option<TenantInfo>;

    /// Metadata for a human-readable identifier (e.g. a slug), if known.
    fn tenant_info_by_identifier(&self, identifier: &str) -> Option<TenantInfo>;
}

/// Directory held entirely in memory.
///
/// Identifiers are matched exactly; a tenant registered without an explicit
/// identifier is reachable by its id value.
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    by_id: DashMap<TenantId, TenantInfo>,
    by_identifier: DashMap<String, TenantId>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tenant under its id value.
    pub fn insert(&self, info: TenantInfo) {
        let identifier = info.id().as_str().to_string();
        self.insert_with_identifier(info, identifier);
    }

    /// Register a tenant under an explicit identifier.
    pub fn insert_with_identifier(&self, info: TenantInfo, identifier: impl Into<String>) {
        let id = info.id().clone();
        self.by_identifier.insert(identifier.into(), id.clone());
        self.by_id.insert(id, info);
    }

    /// Forget a tenant and every identifier pointing at it.
    pub fn remove(&self, tenant_id: &TenantId) -> Option<TenantInfo> {
        self.by_identifier.retain(|_, id| id != tenant_id);
        self.by_id.remove(tenant_id).map(|(_, info)| info)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl TenantDirectory for InMemoryTenantDirectory {
    fn tenant_info(&self, tenant_id: &TenantId) -> Option<TenantInfo> {
        self.by_id.get(tenant_id).map(|entry| entry.value().clone())
    }

    fn tenant_info_by_identifier(&self, identifier: &str) -> Option<TenantInfo> {
        let id = self.by_identifier.get(identifier)?.value().clone();
        self.tenant_info(&id)
    }
}
