//! Tenant identity types
//!
//! [`TenantId`] is the only way a tenant is named anywhere in tenantry. It
//! can never hold an empty or whitespace-only value, so "no tenant" is always
//! spelled as `Option::<TenantId>::None` rather than as a blank string.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strongly-typed tenant identifier.
///
/// Immutable wrapper around a non-empty string. Equality and hashing are
/// value based, and `Display` prints the raw value so it can be embedded in
/// cache keys and error messages verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant identifier.
    ///
    /// Fails with [`ValidationError::InvalidArgument`] when `value` is empty
    /// or consists only of whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::InvalidArgument {
                field: "tenant_id",
                reason: "Tenant id cannot be empty or whitespace".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Get the underlying identifier value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier and return the owned value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TenantId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::str::FromStr for TenantId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Minimal tenant metadata known to the domain layer.
///
/// Deserialization goes through [`TenantInfo::new`], so a blank name is
/// rejected there too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TenantInfoRaw")]
pub struct TenantInfo {
    id: TenantId,
    name: String,
    connection_string: Option<String>,
}

impl TenantInfo {
    /// Create tenant metadata.
    ///
    /// Fails with [`ValidationError::InvalidArgument`] when `name` is empty
    /// or whitespace.
    pub fn new(
        id: TenantId,
        name: impl Into<String>,
        connection_string: Option<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidArgument {
                field: "name",
                reason: "Tenant name cannot be empty or whitespace".to_string(),
            });
        }
        Ok(Self {
            id,
            name,
            connection_string,
        })
    }

    pub fn id(&self) -> &TenantId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection string for tenant-specific data stores, when known.
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }
}

/// Unvalidated wire form of [`TenantInfo`].
#[derive(Deserialize)]
struct TenantInfoRaw {
    id: TenantId,
    name: String,
    #[serde(default)]
    connection_string: Option<String>,
}

impl TryFrom<TenantInfoRaw> for TenantInfo {
    type Error = ValidationError;

    fn try_from(raw: TenantInfoRaw) -> Result<Self, Self::Error> {
        Self::new(raw.id, raw.name, raw.connection_string)
    }
}

/// Implemented by domain types that belong to exactly one tenant.
pub trait HasTenant {
    /// The tenant that owns this value.
    fn tenant_id(&self) -> &TenantId;
}

/// Composes any entity with an owning tenant.
///
/// Use this instead of threading a `tenant_id` field through every entity;
/// it composes with other wrappers (auditing, soft-delete) without needing
/// inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantOwned<T> {
    tenant_id: TenantId,
    entity: T,
}

impl<T> TenantOwned<T> {
    pub fn new(tenant_id: TenantId, entity: T) -> Self {
        Self { tenant_id, entity }
    }

    pub fn entity(&self) -> &T {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut T {
        &mut self.entity
    }

    pub fn into_parts(self) -> (TenantId, T) {
        (self.tenant_id, self.entity)
    }
}

impl<T> HasTenant for TenantOwned<T> {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

impl<T> std::ops::Deref for TenantOwned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}
