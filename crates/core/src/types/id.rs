//! Newtype IDs for type-safe entity references.
//!
//! Two flavours exist:
//! - `define_id!` wraps the backend's integer primary keys (items, users).
//! - `define_row_id!` wraps identifiers the remote store assigns to cart and
//!   wishlist rows. These are opaque: the backend may send them as JSON
//!   integers or strings, and they are kept as strings locally.

use core::fmt;

use serde::de::{self, Visitor};
use serde::Deserializer;

/// Macro to define a type-safe integer ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
///
/// # Example
///
/// ```rust
/// # use ecomall_core::define_id;
/// define_id!(ProductId);
/// define_id!(OrderId);
///
/// let product_id = ProductId::new(1);
/// let order_id = OrderId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Macro to define an opaque remote row identifier.
///
/// The generated type serializes as a string and deserializes from either a
/// JSON string or a JSON integer.
#[macro_export]
macro_rules! define_row_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a row ID from anything string-like.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the ID as a string slice (suitable for URL paths).
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id.to_string())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                $crate::types::id::deserialize_row_id(deserializer).map(Self)
            }
        }
    };
}

// Backend primary keys
define_id!(ItemId);
define_id!(UserId);
define_id!(OrderId);

// Remote row identifiers
define_row_id!(CartRowId);
define_row_id!(WishlistRowId);

/// Deserialize a row identifier sent either as a string or as an integer.
///
/// Used by types generated with [`define_row_id!`].
///
/// # Errors
///
/// Returns an error for any JSON value other than a non-empty string or an
/// integer.
pub fn deserialize_row_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct RowIdVisitor;

    impl Visitor<'_> for RowIdVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a row id as a string or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            if v.is_empty() {
                return Err(E::invalid_value(de::Unexpected::Str(v), &self));
            }
            Ok(v.to_owned())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(RowIdVisitor)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_from_str() {
        let id: ItemId = " 42 ".parse().unwrap();
        assert_eq!(id, ItemId::new(42));
        assert!("forty-two".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_row_id_accepts_integer_and_string() {
        let from_int: CartRowId = serde_json::from_str("17").unwrap();
        let from_str: CartRowId = serde_json::from_str("\"17\"").unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_int.as_str(), "17");
    }

    #[test]
    fn test_row_id_serializes_as_string() {
        let id = WishlistRowId::from(9_i64);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"9\"");
    }

    #[test]
    fn test_row_id_rejects_other_values() {
        assert!(serde_json::from_str::<CartRowId>("\"\"").is_err());
        assert!(serde_json::from_str::<CartRowId>("true").is_err());
        assert!(serde_json::from_str::<CartRowId>("1.5").is_err());
    }
}
