//! tenantry Test Utilities
//!
//! Shared test infrastructure for the tenantry workspace:
//! - Fake cache store and counting handler
//! - Proptest generators for tenant identifiers and cache keys
//! - Request fixtures covering every capability combination
//! - Assertions for the pipeline's error variants

pub use tenantry_cache::{
    cache_value, downcast_value, CacheEntryOptions, CacheStats, CacheStore, CacheValue,
    TenantScopedKey,
};
pub use tenantry_core::{
    RequestScope, TenancyError, TenancyResult, TenantContext, TenantError, TenantId,
};
pub use tenantry_pipeline::{Cacheable, Handler, Request, TenantBound, TenantScoped};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

// ============================================================================
// FAKES
// ============================================================================

struct FakeEntry {
    value: CacheValue,
    options: CacheEntryOptions,
    owner: Option<TenantId>,
}

type FakeEntries = HashMap<String, FakeEntry>;

#[derive(Default)]
struct FakeCacheInner {
    entries: Mutex<FakeEntries>,
    gets: AtomicU64,
    sets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache store that never expires anything and remembers the options and
/// owning tenant each entry was written with.
///
/// Clones share the same entries, so a test can keep one handle while the
/// pipeline owns another.
#[derive(Clone, Default)]
pub struct FakeCacheStore {
    inner: Arc<FakeCacheInner>,
}

impl FakeCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an entry without touching the counters.
    pub fn insert<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.entries().insert(
            key.into(),
            FakeEntry {
                value: cache_value(value),
                options: CacheEntryOptions::new(),
                owner: None,
            },
        );
    }

    /// The stored value under `key`, if it has type `T`.
    pub fn value<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.entries()
            .get(key)
            .and_then(|entry| downcast_value::<T>(&entry.value))
    }

    /// The options `key` was last written with.
    pub fn options(&self, key: &str) -> Option<CacheEntryOptions> {
        self.entries().get(key).map(|entry| entry.options)
    }

    /// The tenant `key` was written for through `set_scoped`.
    pub fn owner(&self, key: &str) -> Option<TenantId> {
        self.entries().get(key).and_then(|entry| entry.owner.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Number of `get` calls.
    pub fn get_count(&self) -> u64 {
        self.inner.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls.
    pub fn set_count(&self) -> u64 {
        self.inner.sets.load(Ordering::SeqCst)
    }

    fn lookup(&self, key: &str, tenant_id: Option<&TenantId>) -> Option<CacheValue> {
        self.inner.gets.fetch_add(1, Ordering::SeqCst);
        let found = self
            .entries()
            .get(key)
            .filter(|entry| match (tenant_id, &entry.owner) {
                (Some(requester), Some(owner)) => requester == owner,
                _ => true,
            })
            .map(|entry| entry.value.clone());
        match found {
            Some(_) => self.inner.hits.fetch_add(1, Ordering::SeqCst),
            None => self.inner.misses.fetch_add(1, Ordering::SeqCst),
        };
        found
    }

    fn store(&self, key: String, value: CacheValue, options: CacheEntryOptions, owner: Option<TenantId>) {
        self.inner.sets.fetch_add(1, Ordering::SeqCst);
        self.entries().insert(
            key,
            FakeEntry {
                value,
                options,
                owner,
            },
        );
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, FakeEntries> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for FakeCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeCacheStore")
            .field("keys", &self.keys())
            .field("gets", &self.get_count())
            .field("sets", &self.set_count())
            .finish()
    }
}

#[async_trait]
impl CacheStore for FakeCacheStore {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        self.lookup(key, None)
    }

    async fn set(&self, key: &str, value: CacheValue, options: CacheEntryOptions) {
        self.store(key.to_string(), value, options, None);
    }

    async fn remove(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        (before - entries.len()) as u64
    }

    async fn invalidate_tenant(&self, tenant_id: &TenantId) -> u64 {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.owner.as_ref() != Some(tenant_id));
        (before - entries.len()) as u64
    }

    async fn get_scoped(&self, key: &TenantScopedKey) -> Option<CacheValue> {
        self.lookup(&key.encode(), Some(key.tenant_id()))
    }

    async fn set_scoped(&self, key: &TenantScopedKey, value: CacheValue, options: CacheEntryOptions) {
        self.store(key.encode(), value, options, Some(key.tenant_id().clone()));
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::SeqCst),
            misses: self.inner.misses.load(Ordering::SeqCst),
            entry_count: self.len() as u64,
            evictions: 0,
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome<T> {
    Respond(T),
    Fail(String),
}

/// Handler that returns a fixed outcome and counts its invocations.
///
/// Clones share the counters.
#[derive(Debug, Clone)]
pub struct CountingHandler<T> {
    outcome: Outcome<T>,
    calls: Arc<AtomicUsize>,
    seen_tenants: Arc<Mutex<Vec<Option<TenantId>>>>,
}

impl<T: Clone + Send + Sync + 'static> CountingHandler<T> {
    /// Respond with `value` on every call.
    pub fn returning(value: T) -> Self {
        Self::with_outcome(Outcome::Respond(value))
    }

    /// Fail with a handler error carrying `message` on every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Fail(message.into()))
    }

    fn with_outcome(outcome: Outcome<T>) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_tenants: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The active tenant of each call, in call order.
    pub fn seen_tenants(&self) -> Vec<Option<TenantId>> {
        self.seen_tenants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl<R, T> Handler<R> for CountingHandler<T>
where
    R: Request<Response = T>,
    T: Clone + Send + Sync + 'static,
{
    async fn handle(&self, _request: &R, scope: &RequestScope) -> TenancyResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tenants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(scope.tenant().id().cloned());

        match &self.outcome {
            Outcome::Respond(value) => Ok(value.clone()),
            Outcome::Fail(message) => Err(TenancyError::handler(std::io::Error::new(
                std::io::ErrorKind::Other,
                message.clone(),
            ))),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for tenant identifiers and cache keys.

    use super::*;
    use proptest::prelude::*;

    /// Generate a valid tenant id. Ids may contain the `:` key separator.
    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        "[a-z][a-z0-9:-]{0,15}".prop_filter_map("valid tenant id", |s| TenantId::new(s).ok())
    }

    /// Generate two tenant ids that differ.
    pub fn arb_distinct_tenants() -> impl Strategy<Value = (TenantId, TenantId)> {
        (arb_tenant_id(), arb_tenant_id()).prop_filter("tenants must differ", |(a, b)| a != b)
    }

    /// Generate a cache key as a request would declare it.
    pub fn arb_cache_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9:_-]{1,24}"
    }

    /// Generate a string that is empty or whitespace only.
    pub fn arb_blank() -> impl Strategy<Value = String> {
        "[ \t\n]{0,8}"
    }

    /// Generate optional expiration hints in seconds.
    pub fn arb_expiration() -> impl Strategy<Value = Option<u64>> {
        prop::option::of(1u64..86_400)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Request types covering each capability combination.

    use super::*;
    use std::borrow::Cow;

    /// Build a tenant id from a literal known to be valid.
    #[track_caller]
    pub fn tenant(value: &str) -> TenantId {
        match TenantId::new(value) {
            Ok(id) => id,
            Err(err) => panic!("invalid fixture tenant id {:?}: {}", value, err),
        }
    }

    /// Scope with `value` as the active tenant.
    #[track_caller]
    pub fn scope_for(value: &str) -> RequestScope {
        RequestScope::for_tenant(tenant(value))
    }

    /// No capabilities at all.
    #[derive(Debug, Clone, Default)]
    pub struct PlainRequest;

    impl Request for PlainRequest {
        type Response = String;
    }

    /// Tenant-required, but declares no target.
    #[derive(Debug, Clone, Default)]
    pub struct TenantRequiredRequest;

    impl Request for TenantRequiredRequest {
        type Response = String;
        const REQUIRES_TENANT: bool = true;
    }

    /// Always targets `tenant_id`.
    #[derive(Debug, Clone)]
    pub struct BoundRequest {
        pub tenant_id: TenantId,
    }

    impl BoundRequest {
        pub fn new(tenant_id: TenantId) -> Self {
            Self { tenant_id }
        }
    }

    impl TenantBound for BoundRequest {
        fn target_tenant(&self) -> Option<&TenantId> {
            Some(&self.tenant_id)
        }
    }

    impl Request for BoundRequest {
        type Response = String;

        fn tenant_bound(&self) -> Option<&dyn TenantBound> {
            Some(self)
        }
    }

    /// Carries the target capability with a value that may be absent.
    #[derive(Debug, Clone, Default)]
    pub struct OptionalBoundRequest {
        pub tenant_id: Option<TenantId>,
    }

    impl TenantBound for OptionalBoundRequest {
        fn target_tenant(&self) -> Option<&TenantId> {
            self.tenant_id.as_ref()
        }
    }

    impl Request for OptionalBoundRequest {
        type Response = String;

        fn tenant_bound(&self) -> Option<&dyn TenantBound> {
            Some(self)
        }
    }

    /// Opts into caching under `cache_key`.
    #[derive(Debug, Clone)]
    pub struct CacheableRequest {
        pub cache_key: String,
        pub bypass_cache: bool,
        pub absolute_expiration_seconds: Option<u64>,
        pub sliding_expiration_seconds: Option<u64>,
    }

    impl CacheableRequest {
        pub fn new(cache_key: impl Into<String>) -> Self {
            Self {
                cache_key: cache_key.into(),
                bypass_cache: false,
                absolute_expiration_seconds: None,
                sliding_expiration_seconds: None,
            }
        }

        pub fn bypassing(mut self) -> Self {
            self.bypass_cache = true;
            self
        }

        pub fn with_expirations(mut self, absolute: Option<u64>, sliding: Option<u64>) -> Self {
            self.absolute_expiration_seconds = absolute;
            self.sliding_expiration_seconds = sliding;
            self
        }
    }

    impl Cacheable for CacheableRequest {
        fn cache_key(&self) -> Cow<'_, str> {
            Cow::Borrowed(&self.cache_key)
        }

        fn bypass_cache(&self) -> bool {
            self.bypass_cache
        }

        fn absolute_expiration_seconds(&self) -> Option<u64> {
            self.absolute_expiration_seconds
        }

        fn sliding_expiration_seconds(&self) -> Option<u64> {
            self.sliding_expiration_seconds
        }
    }

    impl Request for CacheableRequest {
        type Response = String;

        fn cacheable(&self) -> Option<&dyn Cacheable> {
            Some(self)
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for pipeline outcomes.

    use super::*;

    /// Assert that the pipeline rejected the request for lack of a tenant.
    #[track_caller]
    pub fn assert_tenant_not_set<T: std::fmt::Debug>(result: &TenancyResult<T>) {
        match result {
            Err(TenancyError::Tenant(TenantError::NotSet)) => {}
            other => panic!("Expected TenantError::NotSet, got: {:?}", other),
        }
    }

    /// Assert a tenant mismatch with the given active and target tenants.
    #[track_caller]
    pub fn assert_tenant_access<T: std::fmt::Debug>(
        result: &TenancyResult<T>,
        expected: &str,
        actual: &str,
    ) {
        match result {
            Err(TenancyError::Tenant(TenantError::Access {
                expected: e,
                actual: a,
            })) => {
                assert_eq!(e.as_str(), expected, "Wrong expected tenant");
                assert_eq!(a.as_str(), actual, "Wrong actual tenant");
            }
            other => panic!(
                "Expected TenantError::Access({}, {}), got: {:?}",
                expected, actual, other
            ),
        }
    }

    /// Assert that the request was cancelled.
    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &TenancyResult<T>) {
        match result {
            Err(TenancyError::Cancelled) => {}
            other => panic!("Expected Cancelled, got: {:?}", other),
        }
    }
}
