//! Contract between the bridge and the native object system.
//!
//! The bridge never manipulates native reference counts or signal tables
//! directly. Everything it needs from the native side goes through
//! [`NativeObjects`], and everything the native side needs to call back into
//! the bridge goes through [`NativeClosure`].

use std::sync::Arc;

use crate::{BridgeResult, HandlerId, NativeError, NativeTypeId, ObjectId, TypedValue};

/// The native object/type system as seen by the bridge.
///
/// Implementations must be safe to call re-entrantly: a closure invoked from
/// inside `emit` may wrap, ref and unref objects of the same system.
pub trait NativeObjects: Send + Sync {
    /// Concrete type of a live object, `None` once it is finalized.
    fn type_of(&self, object: ObjectId) -> Option<NativeTypeId>;

    /// Native name of a type.
    fn type_name(&self, ty: NativeTypeId) -> Option<String>;

    /// Direct parent of a type, `None` for roots and unknown types.
    fn parent_of(&self, ty: NativeTypeId) -> Option<NativeTypeId>;

    /// Whether `ty` is `ancestor`, derives from it, or implements it.
    fn is_a(&self, ty: NativeTypeId, ancestor: NativeTypeId) -> bool;

    /// Take a reference to a live object.
    fn ref_object(&self, object: ObjectId) -> Result<(), NativeError>;

    /// Release a reference; the object is finalized when the count reaches zero.
    fn unref_object(&self, object: ObjectId) -> Result<(), NativeError>;

    /// Current reference count of a live object.
    fn ref_count(&self, object: ObjectId) -> Option<u32>;

    /// Connect a closure to a signal of an object.
    ///
    /// The native side owns the closure from here on and drops it when the
    /// handler is disconnected or the object is finalized.
    fn connect(
        &self,
        object: ObjectId,
        signal: &str,
        closure: Arc<dyn NativeClosure>,
        after: bool,
    ) -> Result<HandlerId, NativeError>;

    /// Disconnect a previously connected handler.
    fn disconnect(&self, object: ObjectId, handler: HandlerId) -> Result<(), NativeError>;
}

/// A native-side callable, invoked by the native system with typed values.
///
/// `params[0]` is always the instance that owns the signal. `return_type` is
/// `None` for signals without a return value.
pub trait NativeClosure: Send + Sync {
    fn invoke(
        &self,
        params: &[TypedValue],
        return_type: Option<NativeTypeId>,
    ) -> BridgeResult<Option<TypedValue>>;
}

impl<F> NativeClosure for F
where
    F: Fn(&[TypedValue], Option<NativeTypeId>) -> BridgeResult<Option<TypedValue>> + Send + Sync,
{
    fn invoke(
        &self,
        params: &[TypedValue],
        return_type: Option<NativeTypeId>,
    ) -> BridgeResult<Option<TypedValue>> {
        (self)(params, return_type)
    }
}
