//! Newtype IDs for type-safe entity references.
//!
//! Shopify hands out the same numeric id in several shapes: a bare number in
//! REST webhook payloads, a string in form posts, and a GraphQL global id
//! (`gid://shopify/Customer/123`) in the Admin API. The `define_shopify_id!`
//! macro creates wrappers that accept all three and never mix resource types.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Prefix shared by all Shopify GraphQL global ids.
pub const GID_PREFIX: &str = "gid://shopify/";

/// Errors that can occur when parsing an id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("id cannot be empty")]
    Empty,
    /// The global id names a different resource type.
    #[error("expected a {expected} id, got a {found} id")]
    WrongResource {
        /// Resource type the caller asked for.
        expected: &'static str,
        /// Resource type found in the global id.
        found: String,
    },
    /// The input is not a number or a global id.
    #[error("invalid id: {0}")]
    Invalid(String),
}

/// Macro to define a type-safe Shopify resource ID.
///
/// Creates a newtype wrapper around `u64` with:
/// - `parse()` accepting `"123"` or `"gid://shopify/<Resource>/123"`
/// - `to_gid()` for Admin API calls
/// - `Serialize` as the bare numeric string, `Deserialize` from a number,
///   a numeric string, or a global id
/// - `Display` (bare number) and `FromStr`
///
/// # Example
///
/// ```rust
/// # use affidavit_core::define_shopify_id;
/// define_shopify_id!(LocationId, "Location");
///
/// let id = LocationId::parse("gid://shopify/Location/42").unwrap();
/// assert_eq!(id.as_u64(), 42);
/// assert_eq!(id.to_gid(), "gid://shopify/Location/42");
/// assert!(LocationId::parse("gid://shopify/Order/42").is_err());
/// ```
#[macro_export]
macro_rules! define_shopify_id {
    ($name:ident, $resource:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Shopify resource type used in global ids.
            pub const RESOURCE: &'static str = $resource;

            /// Create a new ID from a numeric value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the underlying numeric value.
            #[must_use]
            pub const fn as_u64(&self) -> u64 {
                self.0
            }

            /// Parse from a bare number or a global id.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty, not numeric, or a
            /// global id for another resource type.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                $crate::types::id::parse_legacy_id(s, $resource).map(Self)
            }

            /// Render as a GraphQL global id.
            #[must_use]
            pub fn to_gid(&self) -> String {
                format!("{}{}/{}", $crate::types::id::GID_PREFIX, $resource, self.0)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::core::result::Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::core::result::Result<Self, D::Error> {
                $crate::types::id::deserialize_legacy_id(deserializer, $resource).map(Self)
            }
        }
    };
}

define_shopify_id!(CustomerId, "Customer");
define_shopify_id!(OrderId, "Order");
define_shopify_id!(ProductId, "Product");

/// Parse a numeric id or a global id for `resource`.
///
/// Global ids may carry a query suffix (`gid://shopify/Order/1?foo=bar`),
/// which is ignored.
///
/// # Errors
///
/// See [`IdError`].
pub fn parse_legacy_id(s: &str, resource: &'static str) -> Result<u64, IdError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    let numeric = match s.strip_prefix(GID_PREFIX) {
        Some(rest) => {
            let rest = rest.split('?').next().unwrap_or(rest);
            let (found, id) = rest
                .split_once('/')
                .ok_or_else(|| IdError::Invalid(s.to_owned()))?;
            if found != resource {
                return Err(IdError::WrongResource {
                    expected: resource,
                    found: found.to_owned(),
                });
            }
            id
        }
        None => s,
    };

    numeric
        .parse::<u64>()
        .map_err(|_| IdError::Invalid(s.to_owned()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

/// Deserialize a Shopify id from a JSON number, numeric string, or global id.
///
/// # Errors
///
/// Returns the deserializer's custom error when the value is not a valid id.
#[doc(hidden)]
pub fn deserialize_legacy_id<'de, D: Deserializer<'de>>(
    deserializer: D,
    resource: &'static str,
) -> Result<u64, D::Error> {
    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => parse_legacy_id(&s, resource).map_err(serde::de::Error::custom),
    }
}

/// Identifier of one affidavit filing.
///
/// Generated once at submission and never changed. Values read back from the
/// store are opaque strings: records migrated from the per-product-code
/// schema may carry a `-2` style suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse an id received from a client.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Empty`] for blank input.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}-{n}", self.0))
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SubmissionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
