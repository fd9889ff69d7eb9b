//! Per-type wrapper strategies.
//!
//! A strategy is the function table the value converter dispatches to for a
//! registered type. Fundamentals and boxed types carry trait objects so
//! embedders can plug in their own; enums and flags carry their value tables.
//! Objects, param-specs and variants need no strategy: the bridge wraps them
//! itself.

use std::fmt;
use std::sync::Arc;

use objbridge_core::{
    Block, BoxedWrapper, ConversionError, FromHandle, Handle, IntoHandle, NativeTypeId,
    NativeValue, Ownership, fundamentals,
};

use crate::{EnumClass, FlagsClass};

/// Conversion of a fundamental (scalar) type.
pub trait FundamentalStrategy: Send + Sync {
    /// Convert a native scalar to a handle.
    fn wrap(&self, value: &NativeValue) -> Result<Handle, ConversionError>;

    /// Convert a handle to a native scalar.
    fn unwrap(&self, handle: &Handle) -> Result<NativeValue, ConversionError>;
}

/// The {wrap, unwrap, destroy} table of a boxed type.
pub trait BoxedStrategy: Send + Sync {
    /// Build the dynamic wrapper around a block.
    fn wrap(
        &self,
        type_id: NativeTypeId,
        package: Arc<str>,
        block: Block,
        ownership: Ownership,
    ) -> Result<BoxedWrapper, ConversionError>;

    /// Extract the native block from a wrapper.
    fn unwrap(&self, wrapper: &BoxedWrapper) -> Result<Block, ConversionError>;

    /// Duplicate a block, for wraps that must own a private copy.
    fn copy(&self, block: &Block) -> Block {
        block.clone()
    }

    /// Release the native resources of an owned wrapper.
    fn destroy(&self, wrapper: &BoxedWrapper);
}

/// Shallow byte-copy strategy used when a boxed type registers none.
///
/// Only suitable for structures without internal ownership.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCopyStrategy;

impl BoxedStrategy for ByteCopyStrategy {
    fn wrap(
        &self,
        type_id: NativeTypeId,
        package: Arc<str>,
        block: Block,
        ownership: Ownership,
    ) -> Result<BoxedWrapper, ConversionError> {
        Ok(BoxedWrapper::new(type_id, package, block, ownership))
    }

    fn unwrap(&self, wrapper: &BoxedWrapper) -> Result<Block, ConversionError> {
        Ok(wrapper.block().clone())
    }

    fn destroy(&self, _wrapper: &BoxedWrapper) {}
}

/// Built-in fundamental types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFundamental {
    Bool,
    Char,
    UChar,
    Int,
    UInt,
    Long,
    ULong,
    Int64,
    UInt64,
    Float,
    Double,
    String,
}

impl BuiltinFundamental {
    pub const ALL: [BuiltinFundamental; 12] = [
        BuiltinFundamental::Bool,
        BuiltinFundamental::Char,
        BuiltinFundamental::UChar,
        BuiltinFundamental::Int,
        BuiltinFundamental::UInt,
        BuiltinFundamental::Long,
        BuiltinFundamental::ULong,
        BuiltinFundamental::Int64,
        BuiltinFundamental::UInt64,
        BuiltinFundamental::Float,
        BuiltinFundamental::Double,
        BuiltinFundamental::String,
    ];

    /// Native type identifier of this fundamental.
    pub fn type_id(self) -> NativeTypeId {
        match self {
            BuiltinFundamental::Bool => fundamentals::BOOL,
            BuiltinFundamental::Char => fundamentals::CHAR,
            BuiltinFundamental::UChar => fundamentals::UCHAR,
            BuiltinFundamental::Int => fundamentals::INT,
            BuiltinFundamental::UInt => fundamentals::UINT,
            BuiltinFundamental::Long => fundamentals::LONG,
            BuiltinFundamental::ULong => fundamentals::ULONG,
            BuiltinFundamental::Int64 => fundamentals::INT64,
            BuiltinFundamental::UInt64 => fundamentals::UINT64,
            BuiltinFundamental::Float => fundamentals::FLOAT,
            BuiltinFundamental::Double => fundamentals::DOUBLE,
            BuiltinFundamental::String => fundamentals::STRING,
        }
    }

    /// Native name of this fundamental.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFundamental::Bool => "bool",
            BuiltinFundamental::Char => "char",
            BuiltinFundamental::UChar => "uchar",
            BuiltinFundamental::Int => "int",
            BuiltinFundamental::UInt => "uint",
            BuiltinFundamental::Long => "long",
            BuiltinFundamental::ULong => "ulong",
            BuiltinFundamental::Int64 => "int64",
            BuiltinFundamental::UInt64 => "uint64",
            BuiltinFundamental::Float => "float",
            BuiltinFundamental::Double => "double",
            BuiltinFundamental::String => "string",
        }
    }

    /// Find the built-in fundamental with the given identifier.
    pub fn from_type_id(id: NativeTypeId) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.type_id() == id)
    }
}

fn scalar_handle(value: NativeValue) -> Handle {
    match value {
        NativeValue::Bool(v) => v.into_handle(),
        NativeValue::Int(v) => v.into_handle(),
        NativeValue::UInt(v) => v.into_handle(),
        NativeValue::Float(v) => v.into_handle(),
        NativeValue::Str(v) => v.into_handle(),
        _ => Handle::Undefined,
    }
}

impl FundamentalStrategy for BuiltinFundamental {
    fn wrap(&self, value: &NativeValue) -> Result<Handle, ConversionError> {
        let raw = match value {
            NativeValue::Bool(_)
            | NativeValue::Int(_)
            | NativeValue::UInt(_)
            | NativeValue::Float(_)
            | NativeValue::Str(_) => scalar_handle(value.clone()),
            other => return Err(ConversionError::mismatch(self.name(), other.kind_name())),
        };
        // Range-check and normalise through the same path unwrap uses
        self.unwrap(&raw).map(scalar_handle)
    }

    fn unwrap(&self, handle: &Handle) -> Result<NativeValue, ConversionError> {
        match self {
            BuiltinFundamental::Bool => bool::from_handle(handle).map(NativeValue::Bool),
            BuiltinFundamental::Char => {
                i8::from_handle(handle).map(|v| NativeValue::Int(i64::from(v)))
            }
            BuiltinFundamental::UChar => {
                u8::from_handle(handle).map(|v| NativeValue::UInt(u64::from(v)))
            }
            BuiltinFundamental::Int => {
                i32::from_handle(handle).map(|v| NativeValue::Int(i64::from(v)))
            }
            BuiltinFundamental::UInt => {
                u32::from_handle(handle).map(|v| NativeValue::UInt(u64::from(v)))
            }
            BuiltinFundamental::Long | BuiltinFundamental::Int64 => {
                i64::from_handle(handle).map(NativeValue::Int)
            }
            BuiltinFundamental::ULong | BuiltinFundamental::UInt64 => {
                u64::from_handle(handle).map(NativeValue::UInt)
            }
            BuiltinFundamental::Float => {
                f32::from_handle(handle).map(|v| NativeValue::Float(f64::from(v)))
            }
            BuiltinFundamental::Double => f64::from_handle(handle).map(NativeValue::Float),
            BuiltinFundamental::String => String::from_handle(handle).map(NativeValue::Str),
        }
    }
}

/// The strategy a registered type converts through.
#[derive(Clone)]
pub enum WrapperStrategy {
    Fundamental(Arc<dyn FundamentalStrategy>),
    Boxed(Arc<dyn BoxedStrategy>),
    Enum(Arc<EnumClass>),
    Flags(Arc<FlagsClass>),
}

impl WrapperStrategy {
    /// Wrap a fundamental strategy.
    pub fn fundamental(strategy: impl FundamentalStrategy + 'static) -> Self {
        WrapperStrategy::Fundamental(Arc::new(strategy))
    }

    /// Wrap a boxed strategy.
    pub fn boxed(strategy: impl BoxedStrategy + 'static) -> Self {
        WrapperStrategy::Boxed(Arc::new(strategy))
    }

    /// The default byte-copy boxed strategy.
    pub fn byte_copy() -> Self {
        WrapperStrategy::boxed(ByteCopyStrategy)
    }

    /// Kind of strategy, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            WrapperStrategy::Fundamental(_) => "fundamental",
            WrapperStrategy::Boxed(_) => "boxed",
            WrapperStrategy::Enum(_) => "enum",
            WrapperStrategy::Flags(_) => "flags",
        }
    }
}

impl fmt::Debug for WrapperStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrapperStrategy::{}", self.kind())
    }
}
