//! Error types for tenantry operations

use crate::TenantId;
use std::sync::Arc;
use thiserror::Error;

/// Precondition violations raised while constructing value objects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid argument {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

/// Tenant isolation failures raised while a request runs through the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("Tenant has not been set for the current context.")]
    NotSet,

    #[error("Tenant mismatch. Expected '{expected}', actual '{actual}'.")]
    Access { expected: TenantId, actual: TenantId },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all tenantry errors.
#[derive(Debug, Clone, Error)]
pub enum TenancyError {
    #[error("Tenant error: {0}")]
    Tenant(#[from] TenantError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[source] Arc<ConfigError>),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Handler failed: {0}")]
    Handler(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl From<ConfigError> for TenancyError {
    fn from(err: ConfigError) -> Self {
        Self::Config(Arc::new(err))
    }
}

impl TenancyError {
    /// Wrap a handler failure so it travels through the pipeline untouched.
    pub fn handler<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(err))
    }

    /// True when this is [`TenantError::NotSet`].
    pub fn is_tenant_not_set(&self) -> bool {
        matches!(self, Self::Tenant(TenantError::NotSet))
    }

    /// Returns `(expected, actual)` when this is a tenant mismatch.
    pub fn tenant_access(&self) -> Option<(&TenantId, &TenantId)> {
        match self {
            Self::Tenant(TenantError::Access { expected, actual }) => Some((expected, actual)),
            _ => None,
        }
    }
}

/// Result type alias for tenantry operations.
pub type TenancyResult<T> = Result<T, TenancyError>;

// =============================================================================
// TESTS
// =============================================================================
