//! One-shot typed callbacks outside the signal system.
//!
//! A [`CallbackRecord`] describes a dynamic callable together with the native
//! signature it is invoked with, e.g. an option-parser hook. Unlike closures,
//! records are not shared with the native side: the caller creates, invokes
//! and destroys them explicitly, and a failure raised by the callable is
//! returned straight to that caller as `Raised`.

use objbridge_core::{
    BridgeResult, Callable, Handle, InvocationError, MarshalSite, NativeTypeId, NativeValue,
    RuntimeId, TypedValue,
};

use crate::context::ErrorSlotGuard;
use crate::Bridge;

/// Typed invocation descriptor of a one-shot callback.
#[derive(Debug)]
pub struct CallbackRecord {
    callable: Callable,
    data: Option<Handle>,
    param_types: Vec<NativeTypeId>,
    return_type: Option<NativeTypeId>,
    runtime: RuntimeId,
}

impl CallbackRecord {
    pub fn param_types(&self) -> &[NativeTypeId] {
        &self.param_types
    }

    pub fn return_type(&self) -> Option<NativeTypeId> {
        self.return_type
    }

    /// The runtime instance the callback belongs to.
    pub fn runtime(&self) -> RuntimeId {
        self.runtime
    }
}

impl Bridge {
    /// Describe a callback taking `param_types` and returning `return_type`
    /// (`None` for no value). `data`, when present, is passed last.
    pub fn create_callback(
        &self,
        callable: Callable,
        data: Option<Handle>,
        param_types: Vec<NativeTypeId>,
        return_type: Option<NativeTypeId>,
    ) -> CallbackRecord {
        tracing::debug!(params = param_types.len(), "creating callback");
        CallbackRecord {
            callable,
            data,
            param_types,
            return_type,
            runtime: self.inner.id,
        }
    }

    /// Invoke a callback with native arguments matching its parameter types.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke_callback(
        &self,
        record: &CallbackRecord,
        args: &[NativeValue],
    ) -> BridgeResult<Option<TypedValue>> {
        if record.runtime != self.inner.id {
            return Err(InvocationError::WrongContext {
                expected: record.runtime,
                current: Some(self.inner.id),
            }
            .into());
        }
        self.check_context()?;
        if args.len() != record.param_types.len() {
            return Err(InvocationError::ArgumentCount {
                expected: record.param_types.len(),
                got: args.len(),
            }
            .into());
        }

        let mut handles = Vec::with_capacity(args.len() + 1);
        for (index, (ty, value)) in record.param_types.iter().zip(args).enumerate() {
            let handle = self
                .to_handle(&TypedValue::new(*ty, value.clone()))
                .map_err(|err| err.at(MarshalSite::Argument(index)))?;
            handles.push(handle);
        }
        if let Some(data) = &record.data {
            handles.push(data.clone());
        }

        let outcome = {
            let slot = ErrorSlotGuard::save(&self.inner.error_slot);
            let outcome = record.callable.call(&handles);
            if let Err(fault) = &outcome {
                slot.raise(fault);
            }
            outcome
        };

        let value = outcome.map_err(InvocationError::Raised)?;
        match record.return_type {
            Some(ty) => self
                .from_handle(&value, ty)
                .map(Some)
                .map_err(|err| err.at(MarshalSite::Return)),
            None => Ok(None),
        }
    }

    /// Release a callback's references.
    pub fn destroy_callback(&self, record: CallbackRecord) {
        tracing::debug!(runtime = %record.runtime, "destroying callback");
        drop(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use objbridge_core::{BridgeError, Fault, ObjectHeap, Scalar, fundamentals};
    use objbridge_registry::TypeRegistry;

    fn bridge() -> Bridge {
        Bridge::builder(Arc::new(ObjectHeap::new()))
            .registry(Arc::new(TypeRegistry::with_fundamentals()))
            .build()
    }

    fn sum() -> Callable {
        Callable::new(|args: &[Handle]| {
            let total = args
                .iter()
                .map(|h| match h {
                    Handle::Scalar(Scalar::Int(v)) => *v,
                    _ => 0,
                })
                .sum::<i64>();
            Ok(Handle::Scalar(Scalar::Int(total)))
        })
    }

    #[test]
    fn invokes_with_typed_args_and_data() {
        let bridge = bridge();
        let record = bridge.create_callback(
            sum(),
            Some(Handle::Scalar(Scalar::Int(100))),
            vec![fundamentals::INT, fundamentals::INT],
            Some(fundamentals::INT),
        );
        let result = bridge
            .invoke_callback(&record, &[NativeValue::Int(1), NativeValue::Int(2)])
            .unwrap();
        assert_eq!(result.unwrap().value, NativeValue::Int(103));
        bridge.destroy_callback(record);
    }

    #[test]
    fn argument_count_checked() {
        let bridge = bridge();
        let record = bridge.create_callback(sum(), None, vec![fundamentals::INT], None);
        assert_eq!(
            bridge.invoke_callback(&record, &[]),
            Err(BridgeError::from(InvocationError::ArgumentCount {
                expected: 1,
                got: 0
            }))
        );
    }

    #[test]
    fn raised_fault_is_synchronous() {
        let bridge = bridge();
        bridge.set_error_slot(Some(Fault::new("ambient")));
        let record = bridge.create_callback(
            Callable::new(|_: &[Handle]| Err(Fault::new("parse error"))),
            None,
            vec![],
            None,
        );
        assert_eq!(
            bridge.invoke_callback(&record, &[]),
            Err(BridgeError::from(InvocationError::Raised(Fault::new(
                "parse error"
            ))))
        );
        assert_eq!(bridge.pending_faults(), 0);
        assert_eq!(bridge.error_slot(), Some(Fault::new("ambient")));
    }

    #[test]
    fn foreign_runtime_rejected() {
        let a = bridge();
        let b = bridge();
        let record = a.create_callback(sum(), None, vec![], None);
        assert!(matches!(
            b.invoke_callback(&record, &[]),
            Err(BridgeError::Invocation(InvocationError::WrongContext { .. }))
        ));
    }

    #[test]
    fn return_marshal_failure() {
        let bridge = bridge();
        let record = bridge.create_callback(sum(), None, vec![], Some(fundamentals::STRING));
        let err = bridge.invoke_callback(&record, &[]).unwrap_err();
        assert!(err.is_marshal_failure());
    }
}
