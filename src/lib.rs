//! objbridge - a foreign-value bridge between a dynamic scripting runtime and
//! a reference-counted native object system.
//!
//! A [`Bridge`] is one runtime instance's view of a [`NativeObjects`]
//! implementation. Through it, native values become [`Handle`]s and back,
//! native objects keep a single wrapper per identity, native signals invoke
//! dynamic callables, and failures raised by those callables are deferred to
//! an [`ExceptionRelay`] instead of unwinding through native frames.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use objbridge::prelude::*;
//!
//! let heap = Arc::new(ObjectHeap::new());
//! let widget = heap.define_type("Widget", None).unwrap();
//! heap.define_signal(widget, "clicked", vec![], None).unwrap();
//!
//! let bridge = Bridge::builder(heap.clone())
//!     .registry(Arc::new(TypeRegistry::with_fundamentals()))
//!     .build();
//! bridge
//!     .register_type("Widget", "Ui::Widget", Classification::Object, None)
//!     .unwrap();
//!
//! let object = heap.instantiate(widget).unwrap();
//! let handle = bridge.wrap_object(object, true).unwrap();
//! bridge
//!     .signal_connect(
//!         &handle,
//!         "clicked",
//!         Callable::new(|_: &[Handle]| Err(Fault::new("not today"))),
//!         None,
//!         ConnectFlags::empty(),
//!     )
//!     .unwrap();
//!
//! // The failure does not escape the emission...
//! assert!(heap.emit(object, "clicked", vec![]).unwrap().is_none());
//! // ...it waits in the relay instead.
//! assert_eq!(bridge.pending_faults(), 1);
//! assert_eq!(bridge.run_pending(), Ok(1));
//! ```

mod boxed;
mod bridge;
mod callback;
mod closure;
mod config;
mod context;
mod converter;
mod object;
mod relay;
mod signal;

pub use bridge::Bridge;
pub use callback::CallbackRecord;
pub use closure::{Closure, ClosureRecord, DefaultMarshaller, Marshaller};
pub use config::{BridgeBuilder, BridgeConfig, DEFAULT_MAX_PENDING_FAULTS};
pub use context::{ContextGuard, current_runtime};
pub use relay::{CapturedFault, ExceptionRelay, RelayHandlerId};
pub use signal::ConnectFlags;

pub use objbridge_core::{
    Block, BoxedWrapper, BridgeError, BridgeResult, Callable, Classification, ClosureId,
    ConversionError, DuplicatedArgv, Fault, FromHandle, Handle, HandleKind, HandlerId,
    IntoHandle, InvocationError, MarshalSite, NativeClosure, NativeError, NativeObjects,
    NativeTypeId, NativeValue, ObjectHeap, ObjectId, ObjectWrapper, Ownership,
    RegistrationError, RuntimeId, Scalar, SignalDef, TypedValue, Variant, fundamentals,
};
pub use objbridge_registry::{
    BoxedStrategy, BuiltinFundamental, ByteCopyStrategy, EnumClass, EnumValue, ErrorDomain,
    ErrorRecord, FlagsClass, FundamentalStrategy, TypeInfo, TypeRegistry, WrapperStrategy,
};

/// Everything needed to set up a bridge and move values across it.
pub mod prelude {
    pub use crate::{
        Block, Bridge, BridgeConfig, BridgeError, BridgeResult, Callable, CallbackRecord,
        CapturedFault, Classification, ConnectFlags, EnumValue, Fault, FromHandle, Handle,
        IntoHandle, Marshaller, NativeClosure, NativeObjects, NativeTypeId, NativeValue,
        ObjectHeap, Ownership, Scalar, TypeRegistry, TypedValue, WrapperStrategy, fundamentals,
    };
}
