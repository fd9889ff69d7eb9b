//! Deterministic native type identifiers.
//!
//! [`NativeTypeId`] is a 64-bit hash of a native type name. Hashes are
//! computed with XXHash64 mixed with a domain constant, so the same name always
//! produces the same identifier on both sides of the bridge and identifiers can
//! be written down before the type is registered.
//!
//! # Examples
//!
//! ```
//! use objbridge_core::NativeTypeId;
//!
//! let a = NativeTypeId::from_name("Widget");
//! let b = NativeTypeId::from_name("Widget");
//! assert_eq!(a, b);
//! assert_ne!(a, NativeTypeId::from_name("Button"));
//! ```

use std::fmt;

use xxhash_rust::const_xxh64::xxh64;

/// Domain marker for native type hashes.
const TYPE_DOMAIN: u64 = 0x2fac10b63a6cc57c;

/// A deterministic 64-bit identifier of a native type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NativeTypeId(pub u64);

impl NativeTypeId {
    /// Invalid/absent type.
    pub const INVALID: NativeTypeId = NativeTypeId(0);

    /// Create a type identifier from a native type name.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        NativeTypeId(TYPE_DOMAIN ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is the invalid identifier.
    #[inline]
    pub const fn is_invalid(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NativeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeTypeId({:#018x})", self.0)
    }
}

impl fmt::Display for NativeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Identifiers of the built-in fundamental types.
///
/// These are the scalar types every bridge understands without registration
/// of a custom strategy.
pub mod fundamentals {
    use super::NativeTypeId;

    pub const BOOL: NativeTypeId = NativeTypeId::from_name("bool");
    pub const CHAR: NativeTypeId = NativeTypeId::from_name("char");
    pub const UCHAR: NativeTypeId = NativeTypeId::from_name("uchar");
    pub const INT: NativeTypeId = NativeTypeId::from_name("int");
    pub const UINT: NativeTypeId = NativeTypeId::from_name("uint");
    pub const LONG: NativeTypeId = NativeTypeId::from_name("long");
    pub const ULONG: NativeTypeId = NativeTypeId::from_name("ulong");
    pub const INT64: NativeTypeId = NativeTypeId::from_name("int64");
    pub const UINT64: NativeTypeId = NativeTypeId::from_name("uint64");
    pub const FLOAT: NativeTypeId = NativeTypeId::from_name("float");
    pub const DOUBLE: NativeTypeId = NativeTypeId::from_name("double");
    pub const STRING: NativeTypeId = NativeTypeId::from_name("string");

    /// All built-in fundamentals with their native names.
    pub const ALL: [(NativeTypeId, &str); 12] = [
        (BOOL, "bool"),
        (CHAR, "char"),
        (UCHAR, "uchar"),
        (INT, "int"),
        (UINT, "uint"),
        (LONG, "long"),
        (ULONG, "ulong"),
        (INT64, "int64"),
        (UINT64, "uint64"),
        (FLOAT, "float"),
        (DOUBLE, "double"),
        (STRING, "string"),
    ];
}
