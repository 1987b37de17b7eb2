//! Tenant-scoped cache key.
//!
//! `TenantScopedKey` cannot be built without a [`TenantId`], and a
//! `TenantId` is never empty, so every encoded key starts with a non-empty
//! tenant segment. Two tenants asking for the same request key land on
//! different encoded keys.
//!
//! The encoding is not injective across different request keys: tenant ids
//! may contain `:`, so tenant `a:b` with key `c` and tenant `a` with key
//! `b:c` both encode to `Tenant:a:b:c`. Stores keep tenants apart through
//! `CacheStore::get_scoped`/`set_scoped`, which pass the key itself and
//! not just its encoding.

use tenantry_core::TenantId;

/// Literal prefix shared by every tenant-scoped key.
pub const KEY_PREFIX: &str = "Tenant";

/// Segment separator inside an encoded key.
pub const SEPARATOR: char = ':';

/// A cache key that is scoped to a specific tenant.
///
/// # Format
///
/// `Tenant:<tenant_id>:<cache_key>`. The format is fixed so that entries
/// written by earlier deployments stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantScopedKey {
    /// Private inner data - cannot be constructed externally
    inner: TenantKeyInner,
}

/// Private inner struct - prevents external construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TenantKeyInner {
    tenant_id: TenantId,
    cache_key: String,
}

impl TenantScopedKey {
    /// Create a new tenant-scoped cache key.
    ///
    /// This is the ONLY way to construct a `TenantScopedKey`.
    pub fn new(tenant_id: &TenantId, cache_key: impl Into<String>) -> Self {
        Self {
            inner: TenantKeyInner {
                tenant_id: tenant_id.clone(),
                cache_key: cache_key.into(),
            },
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.inner.tenant_id
    }

    /// The request-supplied part of the key.
    pub fn cache_key(&self) -> &str {
        &self.inner.cache_key
    }

    /// Encode to the string used as the store key.
    pub fn encode(&self) -> String {
        let mut key = Self::tenant_prefix(&self.inner.tenant_id);
        key.push_str(&self.inner.cache_key);
        key
    }

    /// Prefix shared by every key belonging to `tenant_id`.
    ///
    /// Keys of a tenant whose id extends `tenant_id` with `:` share it too,
    /// so use `CacheStore::invalidate_tenant` to drop exactly one tenant's
    /// entries.
    pub fn tenant_prefix(tenant_id: &TenantId) -> String {
        let id = tenant_id.as_str();
        let mut prefix = String::with_capacity(KEY_PREFIX.len() + id.len() + 2);
        prefix.push_str(KEY_PREFIX);
        prefix.push(SEPARATOR);
        prefix.push_str(id);
        prefix.push(SEPARATOR);
        prefix
    }
}

impl std::fmt::Display for TenantScopedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{KEY_PREFIX}{SEPARATOR}{}{SEPARATOR}{}",
            self.inner.tenant_id, self.inner.cache_key
        )
    }
}
