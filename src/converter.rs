//! Value converter: typed native values to handles and back.
//!
//! Conversion is driven by the declared native type. Its registration in the
//! [`TypeRegistry`](objbridge_registry::TypeRegistry) decides the path:
//!
//! | Classification        | `to_handle`                    | `from_handle`                 |
//! |-----------------------|--------------------------------|-------------------------------|
//! | fundamental           | strategy `wrap`                | strategy `unwrap`             |
//! | enum / flags          | value table, by nick           | value table, by name or nick  |
//! | object / param-spec   | borrowed [`Bridge::wrap_object`] | [`Bridge::unwrap_object`]   |
//! | boxed                 | borrowed [`Bridge::wrap_boxed`]  | [`Bridge::unwrap_boxed`]    |
//! | variant               | shared reference               | shared reference              |
//!
//! Only objects, param-specs, boxed types and variants have a "no value"
//! representation; an undefined handle converts to it, and it converts to an
//! undefined handle.

use std::sync::Arc;

use objbridge_core::{
    BridgeError, BridgeResult, Classification, ConversionError, Handle, NativeTypeId, NativeValue,
    TypedValue,
};
use objbridge_registry::{TypeInfo, WrapperStrategy};

use crate::Bridge;

impl Bridge {
    /// Convert a typed native value to a handle.
    ///
    /// Unregistered declared types fail with `UnconvertibleType`, except for
    /// object payloads, which are wrapped by their concrete type.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn to_handle(&self, value: &TypedValue) -> BridgeResult<Handle> {
        let Some(info) = self.inner.registry.resolve(value.type_id) else {
            if let NativeValue::Object(object) = value.value {
                return self.wrap_object(object, false);
            }
            return Err(self.unconvertible(value.type_id));
        };

        match (info.classification, &value.value) {
            (Classification::Fundamental, payload) => {
                let WrapperStrategy::Fundamental(strategy) = strategy_of(&info)? else {
                    return Err(payload_mismatch(&info, payload));
                };
                Ok(strategy.wrap(payload)?)
            }
            (Classification::Enum, NativeValue::Enum(raw)) => match strategy_of(&info)? {
                WrapperStrategy::Enum(class) => Ok(class.to_handle(*raw)?),
                _ => Err(payload_mismatch(&info, &value.value)),
            },
            (Classification::Flags, NativeValue::Flags(bits)) => match strategy_of(&info)? {
                WrapperStrategy::Flags(class) => Ok(class.to_handle(*bits)?),
                _ => Err(payload_mismatch(&info, &value.value)),
            },
            (
                Classification::Object
                | Classification::ParamSpec
                | Classification::Boxed
                | Classification::Variant,
                NativeValue::None,
            ) => Ok(Handle::Undefined),
            (Classification::Object | Classification::ParamSpec, NativeValue::Object(object)) => {
                self.wrap_object(*object, false)
            }
            (Classification::Boxed, NativeValue::Boxed(block)) => {
                self.wrap_boxed(block.clone(), value.type_id, false)
            }
            (Classification::Variant, NativeValue::Variant(variant)) => {
                Ok(Handle::Variant(Arc::clone(variant)))
            }
            (_, payload) => Err(payload_mismatch(&info, payload)),
        }
    }

    /// Convert a handle to a native value of `expected` type.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn from_handle(&self, handle: &Handle, expected: NativeTypeId) -> BridgeResult<TypedValue> {
        let info = self
            .inner
            .registry
            .resolve(expected)
            .ok_or_else(|| self.unconvertible(expected))?;

        if !handle.is_defined() {
            return if info.classification.is_nullable() {
                Ok(TypedValue::none(expected))
            } else {
                Err(ConversionError::mismatch(&*info.package, handle.type_name()).into())
            };
        }

        let value = match info.classification {
            Classification::Fundamental => match strategy_of(&info)? {
                WrapperStrategy::Fundamental(strategy) => strategy.unwrap(handle)?,
                _ => return Err(self.unconvertible(expected)),
            },
            Classification::Enum => match strategy_of(&info)? {
                WrapperStrategy::Enum(class) => NativeValue::Enum(class.from_handle(handle)?),
                _ => return Err(self.unconvertible(expected)),
            },
            Classification::Flags => match strategy_of(&info)? {
                WrapperStrategy::Flags(class) => NativeValue::Flags(class.from_handle(handle)?),
                _ => return Err(self.unconvertible(expected)),
            },
            Classification::Object | Classification::ParamSpec => {
                NativeValue::Object(self.unwrap_object(handle, expected)?)
            }
            Classification::Boxed => NativeValue::Boxed(self.unwrap_boxed(handle, expected)?),
            Classification::Variant => match handle {
                Handle::Variant(variant) => NativeValue::Variant(Arc::clone(variant)),
                other => {
                    return Err(ConversionError::mismatch(&*info.package, other.type_name()).into());
                }
            },
        };
        Ok(TypedValue::new(expected, value))
    }

    /// Best available description of a type: its package when registered,
    /// its native name when known, its identifier otherwise.
    pub(crate) fn describe_type(&self, ty: NativeTypeId) -> String {
        if let Ok(package) = self.inner.registry.lookup_package(ty) {
            return package.to_string();
        }
        self.inner
            .native
            .type_name(ty)
            .unwrap_or_else(|| ty.to_string())
    }

    fn unconvertible(&self, ty: NativeTypeId) -> BridgeError {
        ConversionError::UnconvertibleType {
            type_name: self.describe_type(ty),
        }
        .into()
    }
}

fn strategy_of(info: &TypeInfo) -> BridgeResult<&WrapperStrategy> {
    info.strategy.as_ref().ok_or_else(|| {
        ConversionError::UnconvertibleType {
            type_name: info.type_name.to_string(),
        }
        .into()
    })
}

fn payload_mismatch(info: &TypeInfo, payload: &NativeValue) -> BridgeError {
    ConversionError::mismatch(&*info.package, payload.kind_name()).into()
}
