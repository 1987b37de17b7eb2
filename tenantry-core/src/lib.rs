//! tenantry core - tenant identity, context and errors
//!
//! Value objects shared by every other tenantry crate. This crate holds no
//! pipeline logic; it only describes who the tenant is, what the current
//! request knows about it, and how things fail.

pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod identity;

pub use config::{CacheConfig, PipelineConfig, TenancyConfig, DEFAULT_CACHE_MAX_ENTRIES};
pub use context::{CancellationFlag, CurrentTenant, RequestScope, TenantContext};
pub use directory::{InMemoryTenantDirectory, TenantDirectory};
pub use error::{ConfigError, TenancyError, TenancyResult, TenantError, ValidationError};
pub use identity::{HasTenant, TenantId, TenantInfo, TenantOwned};
