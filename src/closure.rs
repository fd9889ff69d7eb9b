//! Closure bridge: native-side callables forwarding into dynamic callables.
//!
//! A [`Closure`] is handed to the native side (usually through
//! [`Bridge::signal_connect`]) and invoked with typed native arguments. Each
//! invocation walks the same transient states:
//!
//! ```text
//! Idle -> ArgumentsMarshaled -> Invoking -> ResultMarshaled -> Idle
//!                                       \-> FaultCaptured   -> Idle
//! ```
//!
//! Marshal failures are returned to the native caller. A failure raised by
//! the dynamic callable never is: it goes to the exception relay and the
//! native caller sees "no value".

use std::fmt;
use std::sync::{Arc, Weak};

use objbridge_core::{
    BridgeResult, Callable, ClosureId, Handle, InvocationError, MarshalSite, NativeClosure,
    NativeTypeId, RuntimeId, TypedValue,
};

use crate::bridge::BridgeInner;
use crate::context::{self, ErrorSlotGuard};
use crate::Bridge;

/// Argument and result conversion used by a closure.
///
/// The defaults go through the bridge's value converter. Override either
/// method to special-case the signals a marshaller is installed for.
pub trait Marshaller: Send + Sync {
    /// Convert native argument `index` (0 is the instance).
    fn marshal_arg(&self, bridge: &Bridge, index: usize, value: &TypedValue) -> BridgeResult<Handle> {
        let _ = index;
        bridge.to_handle(value)
    }

    /// Convert the callable's result to the declared return type.
    fn marshal_return(
        &self,
        bridge: &Bridge,
        value: &Handle,
        return_type: NativeTypeId,
    ) -> BridgeResult<TypedValue> {
        bridge.from_handle(value, return_type)
    }
}

/// Marshaller that only uses the value converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMarshaller;

impl Marshaller for DefaultMarshaller {}

/// The dynamic references a closure owns.
///
/// Dropped exactly once, together with the closure that owns it.
pub struct ClosureRecord {
    callable: Callable,
    data: Option<Handle>,
    swap: bool,
    id: ClosureId,
}

impl ClosureRecord {
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn data(&self) -> Option<&Handle> {
        self.data.as_ref()
    }

    /// Whether the user data replaces the instance argument.
    pub fn swap(&self) -> bool {
        self.swap
    }

    pub fn id(&self) -> ClosureId {
        self.id
    }
}

impl Drop for ClosureRecord {
    fn drop(&mut self) {
        tracing::trace!(closure = %self.id, "releasing closure record");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvocationState {
    ArgumentsMarshaled,
    Invoking,
    ResultMarshaled,
    FaultCaptured,
}

/// A native-side callable bound to one runtime instance.
pub struct Closure {
    record: ClosureRecord,
    bridge: Weak<BridgeInner>,
    runtime: RuntimeId,
    marshaller: Arc<dyn Marshaller>,
    origin: String,
}

impl Closure {
    pub fn record(&self) -> &ClosureRecord {
        &self.record
    }

    pub fn id(&self) -> ClosureId {
        self.record.id
    }

    /// The runtime instance the closure belongs to.
    pub fn runtime(&self) -> RuntimeId {
        self.runtime
    }

    /// Where failures raised by the closure are reported as coming from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn enter_state(&self, state: InvocationState) {
        tracing::trace!(closure = %self.record.id, ?state, "closure invocation");
    }

    fn marshal_args(&self, bridge: &Bridge, params: &[TypedValue]) -> BridgeResult<Vec<Handle>> {
        let Some((instance, rest)) = params.split_first() else {
            return Err(InvocationError::ArgumentCount {
                expected: 1,
                got: 0,
            }
            .into());
        };

        let mut args = Vec::with_capacity(params.len() + 1);
        if self.record.swap {
            args.push(self.record.data.clone().unwrap_or_default());
        } else {
            let handle = self
                .marshaller
                .marshal_arg(bridge, 0, instance)
                .map_err(|err| err.at(MarshalSite::Argument(0)))?;
            args.push(handle);
        }
        for (offset, value) in rest.iter().enumerate() {
            let index = offset + 1;
            let handle = self
                .marshaller
                .marshal_arg(bridge, index, value)
                .map_err(|err| err.at(MarshalSite::Argument(index)))?;
            args.push(handle);
        }
        if !self.record.swap
            && let Some(data) = &self.record.data
        {
            args.push(data.clone());
        }
        Ok(args)
    }
}

impl NativeClosure for Closure {
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn invoke(
        &self,
        params: &[TypedValue],
        return_type: Option<NativeTypeId>,
    ) -> BridgeResult<Option<TypedValue>> {
        let inner = self.bridge.upgrade().ok_or(InvocationError::WrongContext {
            expected: self.runtime,
            current: context::current_runtime(),
        })?;
        let bridge = Bridge::from_inner(inner);
        bridge.check_context()?;

        let args = self.marshal_args(&bridge, params)?;
        self.enter_state(InvocationState::ArgumentsMarshaled);

        let outcome = {
            let slot = ErrorSlotGuard::save(&bridge.inner.error_slot);
            self.enter_state(InvocationState::Invoking);
            let outcome = self.record.callable.call(&args);
            if let Err(fault) = &outcome {
                slot.raise(fault);
            }
            outcome
        };
        drop(args);

        match outcome {
            Ok(value) => {
                let result = match return_type {
                    Some(ty) => Some(
                        self.marshaller
                            .marshal_return(&bridge, &value, ty)
                            .map_err(|err| err.at(MarshalSite::Return))?,
                    ),
                    None => None,
                };
                self.enter_state(InvocationState::ResultMarshaled);
                Ok(result)
            }
            Err(fault) => {
                self.enter_state(InvocationState::FaultCaptured);
                bridge.capture_fault(fault, &self.origin);
                Ok(None)
            }
        }
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("id", &self.record.id)
            .field("runtime", &self.runtime)
            .field("swap", &self.record.swap)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Create a closure forwarding to `callable`.
    ///
    /// With `swap`, `data` is passed in place of the instance argument;
    /// otherwise it is appended after the native arguments when present.
    pub fn create_closure(&self, callable: Callable, data: Option<Handle>, swap: bool) -> Arc<Closure> {
        self.build_closure(callable, data, swap, None, None)
    }

    /// Create a closure that converts through `marshaller`.
    pub fn create_closure_with_marshaller(
        &self,
        callable: Callable,
        data: Option<Handle>,
        swap: bool,
        marshaller: Arc<dyn Marshaller>,
    ) -> Arc<Closure> {
        self.build_closure(callable, data, swap, Some(marshaller), None)
    }

    /// Release this side's reference to a closure.
    ///
    /// The record's references are released when the last reference goes,
    /// which may be the native side's.
    pub fn destroy_closure(&self, closure: Arc<Closure>) {
        tracing::debug!(
            closure = %closure.id(),
            remaining = Arc::strong_count(&closure) - 1,
            "destroying closure"
        );
        drop(closure);
    }

    pub(crate) fn build_closure(
        &self,
        callable: Callable,
        data: Option<Handle>,
        swap: bool,
        marshaller: Option<Arc<dyn Marshaller>>,
        origin: Option<String>,
    ) -> Arc<Closure> {
        let id = ClosureId::next();
        let origin = origin.unwrap_or_else(|| id.to_string());
        tracing::debug!(closure = %id, %origin, swap, "creating closure");
        Arc::new(Closure {
            record: ClosureRecord {
                callable,
                data,
                swap,
                id,
            },
            bridge: Arc::downgrade(&self.inner),
            runtime: self.inner.id,
            marshaller: marshaller.unwrap_or_else(|| Arc::new(DefaultMarshaller)),
            origin,
        })
    }
}
