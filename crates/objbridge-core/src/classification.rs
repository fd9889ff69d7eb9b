//! Classification of native types.

use std::fmt;

/// How a native type crosses the bridge.
///
/// Every registered type belongs to exactly one classification, and the
/// classification selects the conversion strategy the value converter
/// dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    /// Scalar types converted by value (integers, floats, strings).
    Fundamental,
    /// Opaque copy-by-value structures with a {wrap, unwrap, destroy} strategy.
    Boxed,
    /// Reference-counted instances with identity.
    Object,
    /// Enumerations converted through symbolic names.
    Enum,
    /// Bit sets converted through sets of symbolic names.
    Flags,
    /// Reference-counted property descriptors, wrapped like objects.
    ParamSpec,
    /// Immutable typed value trees.
    Variant,
}

impl Classification {
    /// Returns a human-readable name for this classification.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Fundamental => "fundamental",
            Classification::Boxed => "boxed",
            Classification::Object => "object",
            Classification::Enum => "enum",
            Classification::Flags => "flags",
            Classification::ParamSpec => "param-spec",
            Classification::Variant => "variant",
        }
    }

    /// Whether values of this classification have a "no value" representation.
    ///
    /// Only these classifications accept an undefined handle in `from_handle`.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            Classification::Boxed
                | Classification::Object
                | Classification::ParamSpec
                | Classification::Variant
        )
    }

    /// Whether instances are reference counted by the native object system.
    pub fn is_refcounted(&self) -> bool {
        matches!(self, Classification::Object | Classification::ParamSpec)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
