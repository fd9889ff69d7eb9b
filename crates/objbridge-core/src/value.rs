//! Native-side values.
//!
//! A [`TypedValue`] is what native code hands the bridge: a payload plus the
//! native type it was declared with. The payload alone ([`NativeValue`]) does
//! not say how to convert it; the declared type's registration does.

use std::fmt;
use std::sync::Arc;

use crate::{NativeTypeId, ObjectId, Variant};

/// An opaque native memory block holding a boxed structure.
///
/// The bridge treats the block as a byte span. Custom boxed strategies give
/// the bytes meaning; the default strategy only copies them.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Block(Vec<u8>);

impl Block {
    /// Create a block from its bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Mutable access to the bytes.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Size of the block in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the block is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the block, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({} bytes)", self.0.len())
    }
}

/// A native value payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// The "no value" representation (null object, null boxed pointer).
    None,
    Bool(bool),
    /// Any signed integer width; the declared type decides the range.
    Int(i64),
    /// Any unsigned integer width; the declared type decides the range.
    UInt(u64),
    /// Single or double precision float.
    Float(f64),
    Str(String),
    /// Enumeration value.
    Enum(i32),
    /// Flags bit set.
    Flags(u32),
    /// Reference to a native object. Passing it does not transfer a reference.
    Object(ObjectId),
    /// A boxed structure.
    Boxed(Block),
    /// A shared immutable variant.
    Variant(Arc<Variant>),
}

impl NativeValue {
    /// Short description of the payload kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeValue::None => "none",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int(_) => "int",
            NativeValue::UInt(_) => "uint",
            NativeValue::Float(_) => "float",
            NativeValue::Str(_) => "string",
            NativeValue::Enum(_) => "enum",
            NativeValue::Flags(_) => "flags",
            NativeValue::Object(_) => "object",
            NativeValue::Boxed(_) => "boxed",
            NativeValue::Variant(_) => "variant",
        }
    }

    /// Check if this is the "no value" representation.
    pub fn is_none(&self) -> bool {
        matches!(self, NativeValue::None)
    }
}

/// A native value together with its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    /// The declared native type.
    pub type_id: NativeTypeId,
    /// The payload.
    pub value: NativeValue,
}

impl TypedValue {
    /// Create a typed value.
    pub fn new(type_id: NativeTypeId, value: NativeValue) -> Self {
        Self { type_id, value }
    }

    /// Create a typed object reference.
    pub fn object(type_id: NativeTypeId, object: ObjectId) -> Self {
        Self::new(type_id, NativeValue::Object(object))
    }

    /// Create the "no value" of a type.
    pub fn none(type_id: NativeTypeId) -> Self {
        Self::new(type_id, NativeValue::None)
    }

    /// Consume into the payload.
    pub fn into_value(self) -> NativeValue {
        self.value
    }
}
