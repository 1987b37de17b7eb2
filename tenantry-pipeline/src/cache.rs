//! Tenant-scoped response caching.

use async_trait::async_trait;
use tenantry_cache::{cache_value, downcast_value, CacheEntryOptions, CacheStore, TenantScopedKey};
use tenantry_core::{RequestScope, TenancyResult};

use crate::chain::{ensure_not_cancelled, Interceptor, Next};
use crate::request::Request;

/// Serves cacheable requests from a [`CacheStore`], keyed per tenant.
///
/// The cache is consulted only when the request is cacheable, has not asked
/// to bypass the cache, and a tenant is active. Store keys have the form
/// `Tenant:<tenant_id>:<cache_key>`. Handler failures are never cached.
#[derive(Debug, Clone)]
pub struct CacheInterceptor<S> {
    store: S,
}

impl<S: CacheStore> CacheInterceptor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// What the interceptor will do with one request.
struct CachePlan {
    key: TenantScopedKey,
    options: CacheEntryOptions,
}

fn plan<R: Request>(request: &R, scope: &RequestScope) -> Option<CachePlan> {
    let cacheable = request.cacheable()?;
    if cacheable.bypass_cache() {
        return None;
    }
    let tenant_id = scope.tenant().id()?;

    Some(CachePlan {
        key: TenantScopedKey::new(tenant_id, cacheable.cache_key()),
        options: CacheEntryOptions::from_seconds(
            cacheable.absolute_expiration_seconds(),
            cacheable.sliding_expiration_seconds(),
        ),
    })
}

#[async_trait]
impl<R, S> Interceptor<R> for CacheInterceptor<S>
where
    R: Request,
    S: CacheStore,
{
    async fn intercept(
        &self,
        request: &R,
        scope: &RequestScope,
        next: Next<'_, R>,
    ) -> TenancyResult<R::Response> {
        ensure_not_cancelled(scope)?;

        let Some(CachePlan { key, options }) = plan(request, scope) else {
            tracing::trace!("request not cached");
            return next.run(request, scope).await;
        };
        let store_key = key.encode();

        if let Some(value) = self.store.get_scoped(&key).await {
            if let Some(response) = downcast_value::<R::Response>(&value) {
                tracing::debug!(tenant_id = %key.tenant_id(), key = %store_key, "cache hit");
                return Ok(response);
            }
            tracing::debug!(key = %store_key, "cached value has a different type, recomputing");
        } else {
            tracing::trace!(tenant_id = %key.tenant_id(), key = %store_key, "cache miss");
        }

        let response = next.run(request, scope).await?;
        self.store
            .set_scoped(&key, cache_value(response.clone()), options)
            .await;
        tracing::trace!(key = %store_key, "cached response");

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{handler_fn, Handler};
    use crate::request::Cacheable;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tenantry_cache::InMemoryCacheStore;
    use tenantry_core::{TenancyError, TenantId};

    #[derive(Clone)]
    struct CacheableRequest {
        cache_key: String,
        bypass_cache: bool,
        absolute: Option<u64>,
        sliding: Option<u64>,
    }

    impl CacheableRequest {
        fn new(cache_key: &str) -> Self {
            Self {
                cache_key: cache_key.to_string(),
                bypass_cache: false,
                absolute: None,
                sliding: None,
            }
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
            self.absolute
        }

        fn sliding_expiration_seconds(&self) -> Option<u64> {
            self.sliding
        }
    }

    impl Request for CacheableRequest {
        type Response = String;

        fn cacheable(&self) -> Option<&dyn Cacheable> {
            Some(self)
        }
    }

    #[derive(Clone)]
    struct NonCacheableRequest;

    impl Request for NonCacheableRequest {
        type Response = String;
    }

    fn tenant(value: &str) -> TenantId {
        TenantId::new(value).expect("valid tenant id")
    }

    struct Harness {
        store: Arc<InMemoryCacheStore>,
        calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(InMemoryCacheStore::with_defaults()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        async fn run<R>(&self, request: &R, scope: &RequestScope, fresh: &'static str) -> TenancyResult<String>
        where
            R: Request<Response = String> + Clone + 'static,
        {
            let counter = self.calls.clone();
            let handler = handler_fn(move |_req: R, _scope: RequestScope| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TenancyError>(fresh.to_string())
                }
            });
            let chain: Vec<Arc<dyn Interceptor<R>>> =
                vec![Arc::new(CacheInterceptor::new(self.store.clone()))];
            let handler: &dyn Handler<R> = &handler;
            Next::new(&chain, handler).run(request, scope).await
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_returns_cached_response_when_present() {
        let harness = Harness::new();
        harness
            .store
            .set(
                "Tenant:tenant-1:key",
                cache_value("cached-value".to_string()),
                CacheEntryOptions::new(),
            )
            .await;
        let scope = RequestScope::for_tenant(tenant("tenant-1"));

        let result = harness
            .run(&CacheableRequest::new("key"), &scope, "new-value")
            .await
            .expect("ok");

        assert_eq!(result, "cached-value");
        assert_eq!(harness.calls(), 0);
    }

    #[tokio::test]
    async fn test_caches_response_when_missing() {
        let harness = Harness::new();
        let scope = RequestScope::for_tenant(tenant("tenant-1"));
        let mut request = CacheableRequest::new("cache-key");
        request.absolute = Some(60);
        request.sliding = Some(30);

        let result = harness.run(&request, &scope, "fresh-value").await.expect("ok");
        assert_eq!(result, "fresh-value");

        let stored = harness
            .store
            .get("Tenant:tenant-1:cache-key")
            .await
            .and_then(|v| downcast_value::<String>(&v));
        assert_eq!(stored.as_deref(), Some("fresh-value"));

        let options = harness
            .store
            .entry_options("Tenant:tenant-1:cache-key")
            .expect("entry");
        assert_eq!(options.absolute_expiration, Some(Duration::from_secs(60)));
        assert_eq!(options.sliding_expiration, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let harness = Harness::new();
        let scope = RequestScope::for_tenant(tenant("tenant-1"));
        let request = CacheableRequest::new("key");

        let first = harness.run(&request, &scope, "first").await.expect("ok");
        let second = harness.run(&request, &scope, "second").await.expect("ok");

        assert_eq!(first, "first");
        assert_eq!(second, "first");
        assert_eq!(harness.calls(), 1);
    }

    #[tokio::test]
    async fn test_bypasses_when_requested() {
        let harness = Harness::new();
        let scope = RequestScope::for_tenant(tenant("tenant-1"));
        let mut request = CacheableRequest::new("cache-key");
        request.bypass_cache = true;

        let result = harness.run(&request, &scope, "fresh-value").await.expect("ok");

        assert_eq!(result, "fresh-value");
        assert!(harness.store.is_empty());
        assert_eq!(harness.store.stats().await.misses, 0, "store never read");
    }

    #[tokio::test]
    async fn test_skips_cache_when_tenant_not_set() {
        let harness = Harness::new();
        let result = harness
            .run(&CacheableRequest::new("cache-key"), &RequestScope::anonymous(), "fresh-value")
            .await
            .expect("ok");

        assert_eq!(result, "fresh-value");
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn test_skips_when_request_not_cacheable() {
        let harness = Harness::new();
        let scope = RequestScope::for_tenant(tenant("tenant-1"));
        let result = harness
            .run(&NonCacheableRequest, &scope, "fresh-value")
            .await
            .expect("ok");

        assert_eq!(result, "fresh-value");
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn test_tenants_do_not_share_entries() {
        let harness = Harness::new();
        let request = CacheableRequest::new("shared-key");

        let a = harness
            .run(&request, &RequestScope::for_tenant(tenant("tenant-a")), "value-a")
            .await
            .expect("ok");
        let b = harness
            .run(&request, &RequestScope::for_tenant(tenant("tenant-b")), "value-b")
            .await
            .expect("ok");

        assert_eq!(a, "value-a");
        assert_eq!(b, "value-b");
        assert_eq!(harness.calls(), 2);
        assert_eq!(harness.store.len(), 2);
    }

    #[tokio::test]
    async fn test_colliding_store_keys_stay_per_tenant() {
        let harness = Harness::new();
        // Both encode to "Tenant:a:b:c".
        let scope_ab = RequestScope::for_tenant(tenant("a:b"));
        let scope_a = RequestScope::for_tenant(tenant("a"));

        let first = harness
            .run(&CacheableRequest::new("c"), &scope_ab, "value-a:b")
            .await
            .expect("ok");
        let second = harness
            .run(&CacheableRequest::new("b:c"), &scope_a, "value-a")
            .await
            .expect("ok");

        assert_eq!(first, "value-a:b");
        assert_eq!(second, "value-a");
        assert_eq!(harness.calls(), 2);
        assert_eq!(harness.store.entry_owner("Tenant:a:b:c"), Some(tenant("a")));
    }

    #[tokio::test]
    async fn test_huge_expiration_hints_are_cached() {
        let harness = Harness::new();
        let scope = RequestScope::for_tenant(tenant("tenant-1"));
        let mut request = CacheableRequest::new("key");
        request.absolute = Some(u64::MAX);
        request.sliding = Some(u64::MAX);

        let first = harness.run(&request, &scope, "first").await.expect("ok");
        let second = harness.run(&request, &scope, "second").await.expect("ok");

        assert_eq!(first, "first");
        assert_eq!(second, "first");
        assert_eq!(harness.calls(), 1);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let harness = Harness::new();
        harness
            .store
            .set("Tenant:tenant-1:key", cache_value(42u64), CacheEntryOptions::new())
            .await;
        let scope = RequestScope::for_tenant(tenant("tenant-1"));

        let result = harness
            .run(&CacheableRequest::new("key"), &scope, "fresh")
            .await
            .expect("ok");

        assert_eq!(result, "fresh");
        assert_eq!(harness.calls(), 1);
    }

    #[tokio::test]
    async fn test_handler_error_not_cached() {
        let store = Arc::new(InMemoryCacheStore::with_defaults());
        let handler = handler_fn(|_req: CacheableRequest, _scope: RequestScope| async move {
            Err::<String, _>(TenancyError::handler(std::io::Error::new(
                std::io::ErrorKind::Other,
                "backend down",
            )))
        });
        let chain: Vec<Arc<dyn Interceptor<CacheableRequest>>> =
            vec![Arc::new(CacheInterceptor::new(store.clone()))];
        let scope = RequestScope::for_tenant(tenant("tenant-1"));

        let result = Next::new(&chain, &handler)
            .run(&CacheableRequest::new("key"), &scope)
            .await;

        assert!(matches!(result, Err(TenancyError::Handler(_))));
        assert!(store.is_empty());
    }
}
