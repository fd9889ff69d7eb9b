//! Core types for objbridge.
//!
//! This crate holds everything both sides of the bridge agree on:
//!
//! - identifiers ([`ObjectId`], [`NativeTypeId`], [`RuntimeId`], ...)
//! - native values ([`TypedValue`]) and dynamic handles ([`Handle`])
//! - the [`NativeObjects`] contract and its in-process [`ObjectHeap`]
//! - the error taxonomy ([`BridgeError`] and friends)
//! - Rust primitive conversions ([`FromHandle`], [`IntoHandle`])
//! - [`DuplicatedArgv`]

mod argv;
mod classification;
mod convert;
mod error;
mod fault;
mod handle;
mod heap;
mod ids;
mod native;
mod type_id;
mod value;
mod variant;

pub use argv::DuplicatedArgv;
pub use classification::Classification;
pub use convert::{FromHandle, IntoHandle};
pub use error::{
    BridgeError, BridgeResult, ConversionError, InvocationError, MarshalSite, NativeError,
    RegistrationError,
};
pub use fault::Fault;
pub use handle::{
    BoxedWrapper, Callable, DestroyFn, Handle, HandleKind, Invocable, ObjectWrapper, Ownership,
    Scalar,
};
pub use heap::{ObjectHeap, SignalDef};
pub use ids::{ClosureId, HandlerId, ObjectId, RuntimeId};
pub use native::{NativeClosure, NativeObjects};
pub use type_id::{NativeTypeId, fundamentals};
pub use value::{Block, NativeValue, TypedValue};
pub use variant::Variant;
