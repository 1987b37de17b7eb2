//! Cache store trait and the value/option types it trades in.
//!
//! Stores are type-erased: values go in as [`CacheValue`] and callers get
//! their concrete type back with [`downcast_value`]. A value stored under a
//! key with one type and read back as another is simply not a hit.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tenantry_core::TenantId;

use crate::tenant_key::TenantScopedKey;

/// A type-erased cached value.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Wrap a value for storage.
pub fn cache_value<T>(value: T) -> CacheValue
where
    T: Send + Sync + 'static,
{
    Arc::new(value)
}

/// Recover a typed clone of a cached value, `None` if the type differs.
pub fn downcast_value<T>(value: &CacheValue) -> Option<T>
where
    T: Clone + 'static,
{
    value.downcast_ref::<T>().cloned()
}

/// Expiration hints supplied when an entry is written.
///
/// Absent hints mean "no expiration of that kind". When both are set the
/// entry lives until whichever deadline comes first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheEntryOptions {
    /// Lifetime measured from the moment the entry was written.
    pub absolute_expiration: Option<Duration>,
    /// Idle lifetime, renewed on every read.
    pub sliding_expiration: Option<Duration>,
}

impl CacheEntryOptions {
    /// Options with no expiration at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from second-granularity hints.
    pub fn from_seconds(absolute: Option<u64>, sliding: Option<u64>) -> Self {
        Self {
            absolute_expiration: absolute.map(Duration::from_secs),
            sliding_expiration: sliding.map(Duration::from_secs),
        }
    }

    pub fn with_absolute(mut self, duration: Duration) -> Self {
        self.absolute_expiration = Some(duration);
        self
    }

    pub fn with_sliding(mut self, duration: Duration) -> Self {
        self.sliding_expiration = Some(duration);
        self
    }
}

/// Key/value cache with optional expirations.
///
/// Implementations must be safe to share across tasks; callers never lock
/// around them.
///
/// Encoded tenant keys are not unique on their own: `TenantId` may contain
/// the `:` separator, so tenant `a:b` with key `c` and tenant `a` with key
/// `b:c` both encode to `Tenant:a:b:c`. The `*_scoped` methods and
/// [`invalidate_tenant`](Self::invalidate_tenant) carry the owning tenant
/// so a store can keep tenants apart regardless of the encoding.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a live entry.
    async fn get(&self, key: &str) -> Option<CacheValue>;

    /// Insert or overwrite an entry.
    async fn set(&self, key: &str, value: CacheValue, options: CacheEntryOptions);

    /// Remove an entry, returning whether one was present.
    async fn remove(&self, key: &str) -> bool;

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// This is a plain string match. A tenant prefix also matches tenants
    /// whose id extends it with `:`; use
    /// [`invalidate_tenant`](Self::invalidate_tenant) to drop exactly one
    /// tenant's entries.
    async fn invalidate_prefix(&self, prefix: &str) -> u64;

    /// Remove every entry owned by `tenant_id`, and no other tenant's.
    async fn invalidate_tenant(&self, tenant_id: &TenantId) -> u64;

    /// Get cache statistics.
    async fn stats(&self) -> CacheStats;

    /// Look up a live entry written for `key`'s tenant.
    ///
    /// Stores that track ownership treat an entry written by another tenant
    /// under the same encoded key as a miss.
    async fn get_scoped(&self, key: &TenantScopedKey) -> Option<CacheValue> {
        self.get(&key.encode()).await
    }

    /// Insert or overwrite an entry on behalf of `key`'s tenant.
    async fn set_scoped(&self, key: &TenantScopedKey, value: CacheValue, options: CacheEntryOptions) {
        self.set(&key.encode(), value, options).await
    }
}

#[async_trait]
impl<S> CacheStore for Arc<S>
where
    S: CacheStore + ?Sized,
{
    async fn get(&self, key: &str) -> Option<CacheValue> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: CacheValue, options: CacheEntryOptions) {
        (**self).set(key, value, options).await
    }

    async fn remove(&self, key: &str) -> bool {
        (**self).remove(key).await
    }

    async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        (**self).invalidate_prefix(prefix).await
    }

    async fn invalidate_tenant(&self, tenant_id: &TenantId) -> u64 {
        (**self).invalidate_tenant(tenant_id).await
    }

    async fn stats(&self) -> CacheStats {
        (**self).stats().await
    }

    async fn get_scoped(&self, key: &TenantScopedKey) -> Option<CacheValue> {
        (**self).get_scoped(key).await
    }

    async fn set_scoped(&self, key: &TenantScopedKey, value: CacheValue, options: CacheEntryOptions) {
        (**self).set_scoped(key, value, options).await
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (including expired entries).
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_options_from_seconds() {
        let options = CacheEntryOptions::from_seconds(Some(60), Some(30));
        assert_eq!(options.absolute_expiration, Some(Duration::from_secs(60)));
        assert_eq!(options.sliding_expiration, Some(Duration::from_secs(30)));

        let none = CacheEntryOptions::from_seconds(None, None);
        assert_eq!(none, CacheEntryOptions::new());
    }

    #[test]
    fn test_downcast_requires_matching_type() {
        let value = cache_value("cached".to_string());
        assert_eq!(downcast_value::<String>(&value), Some("cached".to_string()));
        assert_eq!(downcast_value::<u32>(&value), None);
    }
}
