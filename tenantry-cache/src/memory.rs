//! In-memory cache store.
//!
//! Reference [`CacheStore`] for single-process hosts and tests. Entries
//! honor both expiration kinds: the absolute deadline is fixed when the entry
//! is written, the sliding deadline moves forward on every hit. A deadline
//! too far away to represent means the entry never expires on that count.
//! Expired entries are dropped lazily on read and purged in bulk when the
//! store is full.
//!
//! Entries written through the `*_scoped` methods remember their owning
//! tenant. Reads by another tenant miss, and `invalidate_tenant` removes
//! exactly the owner's entries even when tenant ids contain `:`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::DashMap;
use tenantry_core::{CacheConfig, TenantId};
use tokio::time::Instant;

use crate::tenant_key::TenantScopedKey;
use crate::traits::{CacheEntryOptions, CacheStats, CacheStore, CacheValue};

#[derive(Clone)]
struct Entry {
    value: CacheValue,
    options: CacheEntryOptions,
    owner: Option<TenantId>,
    seq: u64,
    inserted_at: Instant,
    last_access: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        let absolute = self
            .options
            .absolute_expiration
            .and_then(|ttl| self.inserted_at.checked_add(ttl))
            .is_some_and(|deadline| now >= deadline);
        let sliding = self
            .options
            .sliding_expiration
            .and_then(|idle| self.last_access.checked_add(idle))
            .is_some_and(|deadline| now >= deadline);
        absolute || sliding
    }

    fn owned_by_other(&self, tenant_id: &TenantId) -> bool {
        self.owner.as_ref().is_some_and(|owner| owner != tenant_id)
    }
}

/// Write order of live keys, oldest first.
///
/// Overwritten and removed keys leave stale pairs behind; a pair is live
/// only while its sequence number matches the entry's.
#[derive(Default)]
struct InsertionOrder {
    queue: VecDeque<(String, u64)>,
    next_seq: u64,
}

/// Concurrent in-memory cache backed by a sharded map.
///
/// Reads never block each other. Writes are serialized so `max_entries` is
/// a hard cap.
pub struct InMemoryCacheStore {
    entries: DashMap<String, Entry>,
    order: Mutex<InsertionOrder>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryCacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(InsertionOrder::default()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a store with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of entries currently held, including any not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expiration options an entry was written with, if it is still held.
    pub fn entry_options(&self, key: &str) -> Option<CacheEntryOptions> {
        self.entries.get(key).map(|entry| entry.options)
    }

    /// Tenant an entry was written for, if it was written through `set_scoped`.
    pub fn entry_owner(&self, key: &str) -> Option<TenantId> {
        self.entries.get(key).and_then(|entry| entry.owner.clone())
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn lock_order(&self) -> MutexGuard<'_, InsertionOrder> {
        self.order
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lookup(&self, key: &str, tenant_id: Option<&TenantId>) -> Option<CacheValue> {
        let now = Instant::now();

        // The shard guard must be released before an expired entry is removed.
        let (found, expired) = match self.entries.get_mut(key) {
            Some(entry) if tenant_id.is_some_and(|id| entry.owned_by_other(id)) => (None, false),
            Some(mut entry) if !entry.is_expired(now) => {
                entry.last_access = now;
                (Some(entry.value.clone()), false)
            }
            Some(_) => (None, true),
            None => (None, false),
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn insert(
        &self,
        key: &str,
        value: CacheValue,
        options: CacheEntryOptions,
        owner: Option<TenantId>,
    ) {
        let mut order = self.lock_order();

        if !self.entries.contains_key(key) {
            self.make_room(&mut order);
        }

        let seq = order.next_seq;
        order.next_seq += 1;
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                options,
                owner,
                seq,
                inserted_at: now,
                last_access: now,
            },
        );
        order.queue.push_back((key.to_string(), seq));

        if order.queue.len() > self.config.max_entries.saturating_mul(2).max(64) {
            order
                .queue
                .retain(|(key, seq)| self.entries.get(key).is_some_and(|entry| entry.seq == *seq));
        }
    }

    /// Free one slot, oldest write first. Called with the order lock held.
    fn make_room(&self, order: &mut InsertionOrder) {
        if self.entries.len() < self.config.max_entries {
            return;
        }

        self.purge_expired();

        while self.entries.len() >= self.config.max_entries {
            let Some((oldest, seq)) = order.queue.pop_front() else { break };
            if self
                .entries
                .remove_if(&oldest, |_, entry| entry.seq == seq)
                .is_some()
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %oldest, "evicted oldest cache entry");
            }
        }
    }

    fn remove_where<F>(&self, matches: F) -> u64
    where
        F: Fn(&str, &Entry) -> bool,
    {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| matches(entry.key().as_str(), entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if self
                .entries
                .remove_if(&key, |key, entry| matches(key.as_str(), entry))
                .is_some()
            {
                removed += 1;
            }
        }
        removed
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for InMemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCacheStore")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        self.lookup(key, None)
    }

    async fn set(&self, key: &str, value: CacheValue, options: CacheEntryOptions) {
        self.insert(key, value, options, None);
    }

    async fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        self.remove_where(|key, _| key.starts_with(prefix))
    }

    /// Entries written through plain `set` have no owner and are left alone.
    async fn invalidate_tenant(&self, tenant_id: &TenantId) -> u64 {
        self.remove_where(|_, entry| entry.owner.as_ref() == Some(tenant_id))
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    async fn get_scoped(&self, key: &TenantScopedKey) -> Option<CacheValue> {
        self.lookup(&key.encode(), Some(key.tenant_id()))
    }

    async fn set_scoped(&self, key: &TenantScopedKey, value: CacheValue, options: CacheEntryOptions) {
        self.insert(&key.encode(), value, options, Some(key.tenant_id().clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{cache_value, downcast_value};
    use std::time::Duration;

    async fn get_string(store: &InMemoryCacheStore, key: &str) -> Option<String> {
        store.get(key).await.and_then(|v| downcast_value::<String>(&v))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = InMemoryCacheStore::with_defaults();
        store
            .set("Tenant:t:k", cache_value("v".to_string()), CacheEntryOptions::new())
            .await;

        assert_eq!(get_string(&store, "Tenant:t:k").await, Some("v".to_string()));
        assert_eq!(get_string(&store, "Tenant:t:missing").await, None);

        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absolute_expiration() {
        let store = InMemoryCacheStore::with_defaults();
        let options = CacheEntryOptions::from_seconds(Some(60), None);
        store.set("k", cache_value(1u32), options).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("k").await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").await.is_none());
        assert!(store.is_empty(), "expired entry dropped on read");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_expiration_renews_on_hit() {
        let store = InMemoryCacheStore::with_defaults();
        let options = CacheEntryOptions::from_seconds(None, Some(30));
        store.set("k", cache_value(1u32), options).await;

        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(20)).await;
            assert!(store.get("k").await.is_some(), "hit within idle window");
        }

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absolute_caps_sliding() {
        let store = InMemoryCacheStore::with_defaults();
        let options = CacheEntryOptions::from_seconds(Some(60), Some(30));
        store.set("k", cache_value(1u32), options).await;

        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(store.get("k").await.is_some());
        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(store.get("k").await.is_some());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(store.get("k").await.is_none(), "absolute deadline wins");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_expiration_lives_forever() {
        let store = InMemoryCacheStore::with_defaults();
        store.set("k", cache_value(1u32), CacheEntryOptions::new()).await;
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert!(store.get("k").await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let store = InMemoryCacheStore::with_defaults();
        store.set("k", cache_value("a".to_string()), CacheEntryOptions::new()).await;
        store.set("k", cache_value("b".to_string()), CacheEntryOptions::new()).await;
        assert_eq!(get_string(&store, "k").await, Some("b".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let store = InMemoryCacheStore::new(CacheConfig::default().with_max_entries(2));
        store.set("a", cache_value(1u32), CacheEntryOptions::new()).await;
        tokio::time::advance(Duration::from_millis(1)).await;
        store.set("b", cache_value(2u32), CacheEntryOptions::new()).await;
        tokio::time::advance(Duration::from_millis(1)).await;
        store.set("c", cache_value(3u32), CacheEntryOptions::new()).await;

        assert_eq!(store.len(), 2);
        assert!(store.get("a").await.is_none());
        assert!(store.get("b").await.is_some());
        assert!(store.get("c").await.is_some());
        assert_eq!(store.stats().await.evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_prefers_purging_expired() {
        let store = InMemoryCacheStore::new(CacheConfig::default().with_max_entries(2));
        store.set("old", cache_value(1u32), CacheEntryOptions::new()).await;
        store
            .set("short", cache_value(2u32), CacheEntryOptions::from_seconds(Some(1), None))
            .await;
        tokio::time::advance(Duration::from_secs(2)).await;
        store.set("new", cache_value(3u32), CacheEntryOptions::new()).await;

        assert!(store.get("old").await.is_some());
        assert!(store.get("new").await.is_some());
        assert_eq!(store.stats().await.evictions, 0);
    }

    #[tokio::test]
    async fn test_invalidate_prefix_only_touches_one_tenant() {
        let store = InMemoryCacheStore::with_defaults();
        for key in ["Tenant:a:1", "Tenant:a:2", "Tenant:ab:1", "Tenant:b:1"] {
            store.set(key, cache_value(0u8), CacheEntryOptions::new()).await;
        }

        let removed = store.invalidate_prefix("Tenant:a:").await;
        assert_eq!(removed, 2);
        assert!(store.get("Tenant:ab:1").await.is_some());
        assert!(store.get("Tenant:b:1").await.is_some());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryCacheStore::with_defaults();
        store.set("k", cache_value(0u8), CacheEntryOptions::new()).await;
        assert!(store.remove("k").await);
        assert!(!store.remove("k").await);
    }

    #[tokio::test]
    async fn test_entry_options_recorded() {
        let store = InMemoryCacheStore::with_defaults();
        let options = CacheEntryOptions::from_seconds(Some(60), Some(30));
        store.set("k", cache_value(0u8), options).await;
        assert_eq!(store.entry_options("k"), Some(options));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_deadline_never_expires() {
        let store = InMemoryCacheStore::with_defaults();
        let options = CacheEntryOptions::from_seconds(Some(u64::MAX), Some(u64::MAX));
        store.set("k", cache_value(1u32), options).await;

        assert!(store.get("k").await.is_some());
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert!(store.get("k").await.is_some());
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_survives_capacity_purge() {
        let store = InMemoryCacheStore::new(CacheConfig::default().with_max_entries(1));
        let options = CacheEntryOptions::from_seconds(None, Some(u64::MAX));
        store.set("a", cache_value(1u32), options).await;
        store.set("b", cache_value(2u32), options).await;

        assert_eq!(store.len(), 1);
        assert!(store.get("b").await.is_some());
    }

    fn tenant(value: &str) -> TenantId {
        TenantId::new(value).expect("valid tenant id")
    }

    #[tokio::test]
    async fn test_invalidate_tenant_ignores_extended_ids() {
        let store = InMemoryCacheStore::with_defaults();
        let acme = TenantScopedKey::new(&tenant("acme"), "orders");
        let acme_eu = TenantScopedKey::new(&tenant("acme:eu"), "orders");
        store.set_scoped(&acme, cache_value(1u32), CacheEntryOptions::new()).await;
        store.set_scoped(&acme_eu, cache_value(2u32), CacheEntryOptions::new()).await;

        let removed = store.invalidate_tenant(&tenant("acme")).await;

        assert_eq!(removed, 1);
        assert!(store.get_scoped(&acme).await.is_none());
        assert!(store.get_scoped(&acme_eu).await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_prefix_is_a_plain_string_match() {
        let store = InMemoryCacheStore::with_defaults();
        let acme_eu = TenantScopedKey::new(&tenant("acme:eu"), "orders");
        store.set_scoped(&acme_eu, cache_value(2u32), CacheEntryOptions::new()).await;

        let removed = store
            .invalidate_prefix(&TenantScopedKey::tenant_prefix(&tenant("acme")))
            .await;
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_colliding_encoding_does_not_cross_tenants() {
        let store = InMemoryCacheStore::with_defaults();
        let first = TenantScopedKey::new(&tenant("a:b"), "c");
        let second = TenantScopedKey::new(&tenant("a"), "b:c");
        assert_eq!(first.encode(), second.encode());

        store.set_scoped(&first, cache_value("for a:b".to_string()), CacheEntryOptions::new()).await;

        assert!(store.get_scoped(&second).await.is_none());
        assert_eq!(
            store
                .get_scoped(&first)
                .await
                .and_then(|v| downcast_value::<String>(&v))
                .as_deref(),
            Some("for a:b")
        );
        assert_eq!(store.entry_owner(&first.encode()), Some(tenant("a:b")));
    }

    #[tokio::test]
    async fn test_unowned_entries_readable_by_scoped_get() {
        let store = InMemoryCacheStore::with_defaults();
        store
            .set("Tenant:t:k", cache_value(1u32), CacheEntryOptions::new())
            .await;
        let key = TenantScopedKey::new(&tenant("t"), "k");

        assert!(store.get_scoped(&key).await.is_some());
        assert_eq!(store.invalidate_tenant(&tenant("t")).await, 0);
    }

    #[tokio::test]
    async fn test_overwrite_moves_key_to_back_of_eviction_order() {
        let store = InMemoryCacheStore::new(CacheConfig::default().with_max_entries(2));
        store.set("a", cache_value(1u32), CacheEntryOptions::new()).await;
        store.set("b", cache_value(2u32), CacheEntryOptions::new()).await;
        store.set("a", cache_value(3u32), CacheEntryOptions::new()).await;
        store.set("c", cache_value(4u32), CacheEntryOptions::new()).await;

        assert!(store.get("b").await.is_none(), "b is now the oldest write");
        assert!(store.get("a").await.is_some());
        assert!(store.get("c").await.is_some());
        assert_eq!(store.stats().await.evictions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_holds_under_concurrent_writes() {
        let store = std::sync::Arc::new(InMemoryCacheStore::new(
            CacheConfig::default().with_max_entries(16),
        ));

        let mut tasks = Vec::new();
        for worker in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..200 {
                    store
                        .set(&format!("w{worker}:{i}"), cache_value(i), CacheEntryOptions::new())
                        .await;
                }
            }));
        }
        for task in tasks {
            task.await.expect("writer completed");
        }

        assert_eq!(store.len(), 16);
        assert_eq!(store.stats().await.evictions, 8 * 200 - 16);
    }
}
