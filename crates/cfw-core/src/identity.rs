//! # Identifier Newtypes
//!
//! Newtype wrappers for every identifier namespace in the engine, so a
//! `ProjectId` can never be passed where a `FrameworkId` is expected.
//!
//! [`TenantId`] is the odd one out: it is a validated string because it is
//! spliced (quoted) into SQL as the tenant's schema name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;

/// Maximum length of a Postgres identifier.
const MAX_TENANT_LEN: usize = 63;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = IdentityError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| IdentityError::InvalidUuid(s.to_string()))
            }
        }
    };
}

uuid_id!(
    /// A framework within one tenant.
    FrameworkId
);
uuid_id!(
    /// A structural node (category, control, or sub-control).
    NodeId
);
uuid_id!(
    /// A host-platform project mirrored into the engine.
    ProjectId
);
uuid_id!(
    /// A project ↔ framework association (`project_framework_id`).
    AssociationId
);
uuid_id!(
    /// A per-project, per-leaf implementation record.
    ImplementationId
);

/// Tenant identifier, also the name of the tenant's Postgres schema.
///
/// 1–63 characters, ASCII alphanumeric or `_`, not starting with a digit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant id.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentityError> {
        let value = value.into();
        let trimmed = value.trim();
        let reject = |reason| IdentityError::InvalidTenant {
            value: value.clone(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(reject("must not be empty"));
        }
        if trimmed.len() > MAX_TENANT_LEN {
            return Err(reject("must not exceed 63 characters"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(reject("only ASCII letters, digits and '_' are allowed"));
        }
        if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(reject("must not start with a digit"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw tenant id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tenant's schema name as a quoted SQL identifier.
    pub fn quoted_schema(&self) -> String {
        // Validation rules out '"', so no escaping is needed.
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for TenantId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_accepts_schema_safe_names() {
        for ok in ["acme", "tenant_01", "A", "_internal"] {
            assert!(TenantId::new(ok).is_ok(), "{ok} should be accepted");
        }
    }

    #[test]
    fn tenant_rejects_unsafe_names() {
        for bad in ["", "   ", "1acme", "acme-corp", "a\"; drop schema x; --", "ümlaut"] {
            assert!(TenantId::new(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(TenantId::new("a".repeat(64)).is_err());
        assert!(TenantId::new("a".repeat(63)).is_ok());
    }

    #[test]
    fn tenant_is_trimmed_and_quoted() {
        let tenant = TenantId::new("  acme ").unwrap();
        assert_eq!(tenant.as_str(), "acme");
        assert_eq!(tenant.quoted_schema(), "\"acme\"");
    }

    #[test]
    fn tenant_deserialize_validates() {
        assert!(serde_json::from_str::<TenantId>("\"acme\"").is_ok());
        assert!(serde_json::from_str::<TenantId>("\"bad name\"").is_err());
    }

    #[test]
    fn uuid_ids_serialize_transparently() {
        let id = FrameworkId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: FrameworkId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn uuid_ids_parse_from_str() {
        let id = ProjectId::new();
        assert_eq!(id.to_string().parse::<ProjectId>().unwrap(), id);
        assert!("not-a-uuid".parse::<ProjectId>().is_err());
    }
}
