//! tenantry cache - tenant-scoped cache keys and stores
//!
//! The pipeline never talks to a concrete cache. It composes a
//! [`TenantScopedKey`] and hands it to whatever [`CacheStore`] the host
//! wired in. [`InMemoryCacheStore`] is provided for single-process hosts and
//! tests.
//!
//! # Example
//!
//! ```ignore
//! let store = InMemoryCacheStore::with_defaults();
//! let key = TenantScopedKey::new(&tenant_id, "orders:open");
//! store.set(&key.encode(), cache_value(orders), CacheEntryOptions::from_seconds(Some(60), None)).await;
//!
//! // Drop everything cached for one tenant
//! store.invalidate_prefix(&TenantScopedKey::tenant_prefix(&tenant_id)).await;
//! ```

pub mod memory;
pub mod tenant_key;
pub mod traits;

pub use memory::InMemoryCacheStore;
pub use tenant_key::TenantScopedKey;
pub use traits::{cache_value, downcast_value, CacheEntryOptions, CacheStats, CacheStore, CacheValue};
