//! Conversion traits between Rust values and dynamic handles.
//!
//! This module provides traits for converting between Rust types and
//! [`Handle`]s:
//! - [`FromHandle`]: Extract a Rust value from a [`Handle`]
//! - [`IntoHandle`]: Convert a Rust value into a [`Handle`]
//!
//! They are used by the built-in fundamental strategies and are handy when
//! writing dynamic callables in Rust.
//!
//! ## Supported Types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`
//! - Floats: `f32`, `f64`
//! - Boolean: `bool`
//! - Strings: `String`
//! - Unit: `()` (undefined)
//! - `Option<T>`: undefined maps to `None`
//!
//! ## Example
//!
//! ```
//! use objbridge_core::{FromHandle, Handle, IntoHandle};
//!
//! let handle = 42i32.into_handle();
//! let value: i32 = i32::from_handle(&handle).unwrap();
//! assert_eq!(value, 42);
//! assert!(u8::from_handle(&1000i32.into_handle()).is_err());
//! ```

use ordered_float::OrderedFloat;

use crate::{ConversionError, Handle, Scalar};

/// Extract a value from a handle.
pub trait FromHandle: Sized {
    /// Extract a value from the given handle.
    ///
    /// Returns a `ConversionError` if the handle holds an incompatible value.
    fn from_handle(handle: &Handle) -> Result<Self, ConversionError>;
}

/// Convert a value into a handle.
pub trait IntoHandle {
    /// Convert this value into a handle.
    fn into_handle(self) -> Handle;
}

fn mismatch(expected: &str, handle: &Handle) -> ConversionError {
    ConversionError::mismatch(expected, handle.type_name())
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_handle_int {
    ($($ty:ty),*) => {
        $(
            impl FromHandle for $ty {
                fn from_handle(handle: &Handle) -> Result<Self, ConversionError> {
                    match handle {
                        Handle::Scalar(Scalar::Int(v)) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: v.to_string(),
                                target_type: stringify!($ty),
                            }
                        }),
                        Handle::Scalar(Scalar::UInt(v)) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: v.to_string(),
                                target_type: stringify!($ty),
                            }
                        }),
                        _ => Err(mismatch("int", handle)),
                    }
                }
            }

            impl IntoHandle for $ty {
                fn into_handle(self) -> Handle {
                    Handle::Scalar(Scalar::Int(i64::from(self)))
                }
            }
        )*
    };
}

impl_handle_int!(i8, i16, i32, i64);

// Unsigned values keep their sign domain so u64::MAX survives the trip
macro_rules! impl_handle_uint {
    ($($ty:ty),*) => {
        $(
            impl FromHandle for $ty {
                fn from_handle(handle: &Handle) -> Result<Self, ConversionError> {
                    match handle {
                        Handle::Scalar(Scalar::UInt(v)) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: v.to_string(),
                                target_type: stringify!($ty),
                            }
                        }),
                        Handle::Scalar(Scalar::Int(v)) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: v.to_string(),
                                target_type: stringify!($ty),
                            }
                        }),
                        _ => Err(mismatch("uint", handle)),
                    }
                }
            }

            impl IntoHandle for $ty {
                fn into_handle(self) -> Handle {
                    Handle::Scalar(Scalar::UInt(u64::from(self)))
                }
            }
        )*
    };
}

impl_handle_uint!(u8, u16, u32, u64);

// ============================================================================
// Float implementations
// ============================================================================

impl FromHandle for f64 {
    fn from_handle(handle: &Handle) -> Result<Self, ConversionError> {
        match handle {
            Handle::Scalar(Scalar::Float(v)) => Ok(v.into_inner()),
            Handle::Scalar(Scalar::Int(v)) => Ok(*v as f64),
            Handle::Scalar(Scalar::UInt(v)) => Ok(*v as f64),
            _ => Err(mismatch("float", handle)),
        }
    }
}

impl IntoHandle for f64 {
    fn into_handle(self) -> Handle {
        Handle::Scalar(Scalar::Float(OrderedFloat(self)))
    }
}

impl FromHandle for f32 {
    fn from_handle(handle: &Handle) -> Result<Self, ConversionError> {
        let v = f64::from_handle(handle)?;
        // Infinities and NaN pass through; finite values must fit
        if v.is_finite() && (v > f32::MAX as f64 || v < f32::MIN as f64) {
            return Err(ConversionError::IntegerOverflow {
                value: v.to_string(),
                target_type: "f32",
            });
        }
        Ok(v as f32)
    }
}

impl IntoHandle for f32 {
    fn into_handle(self) -> Handle {
        Handle::Scalar(Scalar::Float(OrderedFloat(f64::from(self))))
    }
}

// ============================================================================
// Other scalars
// ============================================================================

impl FromHandle for bool {
    fn from_handle(handle: &Handle) -> Result<Self, ConversionError> {
        match handle {
            Handle::Scalar(Scalar::Bool(v)) => Ok(*v),
            Handle::Scalar(Scalar::Int(v)) => Ok(*v != 0),
            Handle::Scalar(Scalar::UInt(v)) => Ok(*v != 0),
            _ => Err(mismatch("bool", handle)),
        }
    }
}

impl IntoHandle for bool {
    fn into_handle(self) -> Handle {
        Handle::Scalar(Scalar::Bool(self))
    }
}

impl FromHandle for String {
    fn from_handle(handle: &Handle) -> Result<Self, ConversionError> {
        match handle {
            Handle::Scalar(Scalar::Str(v)) => Ok(v.clone()),
            _ => Err(mismatch("string", handle)),
        }
    }
}

impl IntoHandle for String {
    fn into_handle(self) -> Handle {
        Handle::Scalar(Scalar::Str(self))
    }
}

impl IntoHandle for &str {
    fn into_handle(self) -> Handle {
        Handle::Scalar(Scalar::Str(self.to_string()))
    }
}

impl FromHandle for () {
    fn from_handle(_handle: &Handle) -> Result<Self, ConversionError> {
        Ok(())
    }
}

impl IntoHandle for () {
    fn into_handle(self) -> Handle {
        Handle::Undefined
    }
}

impl<T: FromHandle> FromHandle for Option<T> {
    fn from_handle(handle: &Handle) -> Result<Self, ConversionError> {
        match handle {
            Handle::Undefined => Ok(None),
            other => T::from_handle(other).map(Some),
        }
    }
}

impl<T: IntoHandle> IntoHandle for Option<T> {
    fn into_handle(self) -> Handle {
        match self {
            Some(v) => v.into_handle(),
            None => Handle::Undefined,
        }
    }
}

impl FromHandle for Handle {
    fn from_handle(handle: &Handle) -> Result<Self, ConversionError> {
        Ok(handle.clone())
    }
}

impl IntoHandle for Handle {
    fn into_handle(self) -> Handle {
        self
    }
}
