//! Dynamic-side handles.
//!
//! A [`Handle`] is the dynamic runtime's representation of a value that came
//! from (or is going to) native code. Scalars are held by value. Objects and
//! boxed structures are held through shared wrappers whose destruction
//! releases native resources according to their [`Ownership`] tag.
//!
//! ## Kinds
//!
//! | Variant    | Kind          | Released on last drop              |
//! |------------|---------------|------------------------------------|
//! | `Undefined`| undefined     | -                                  |
//! | `Scalar`   | scalar        | -                                  |
//! | `Object`   | object-ref    | native unref, if `Owned`           |
//! | `Boxed`    | object-ref    | strategy `destroy`, if `Owned`     |
//! | `Variant`  | object-ref    | shared tree dropped                |
//! | `Callable` | callable-ref  | callable dropped                   |

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use ordered_float::OrderedFloat;

use crate::{Block, Fault, NativeObjects, NativeTypeId, ObjectId, Variant};

/// Discriminant of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Undefined,
    Scalar,
    ObjectRef,
    CallableRef,
}

/// Whether destroying a handle releases the native value behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Destruction frees or unrefs the native value.
    Owned,
    /// Destruction leaves the native value alone.
    Borrowed,
}

impl Ownership {
    /// Map the `owned` flag of the wrap operations.
    pub fn from_owned(owned: bool) -> Self {
        if owned {
            Ownership::Owned
        } else {
            Ownership::Borrowed
        }
    }
}

/// Scalar payload of a handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Floating point value (uses OrderedFloat so scalars are hashable)
    Float(OrderedFloat<f64>),
    Str(String),
    /// A set of symbolic names, as produced for flags.
    Names(Vec<String>),
}

impl Scalar {
    /// Short type description used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::UInt(_) => "uint",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "string",
            Scalar::Names(_) => "name set",
        }
    }
}

// ============================================================================
// Object wrapper
// ============================================================================

/// Dynamic-side wrapper of a reference-counted native object.
///
/// One wrapper exists per native identity and runtime instance; every handle
/// to the object shares it. An `Owned` wrapper holds one native reference and
/// releases it exactly once, when the last handle is dropped. A `Borrowed`
/// wrapper can be handed its holder's reference with
/// [`adopt_reference`](Self::adopt_reference), after which it releases on
/// drop as well.
pub struct ObjectWrapper {
    object: ObjectId,
    native_type: NativeTypeId,
    package: Arc<str>,
    ownership: Ownership,
    releases: AtomicBool,
    native: Arc<dyn NativeObjects>,
}

impl ObjectWrapper {
    /// Create a wrapper. Reference counting is the caller's business; the
    /// wrapper only releases on drop when `ownership` is `Owned`.
    pub fn new(
        object: ObjectId,
        native_type: NativeTypeId,
        package: Arc<str>,
        ownership: Ownership,
        native: Arc<dyn NativeObjects>,
    ) -> Self {
        Self {
            object,
            native_type,
            package,
            ownership,
            releases: AtomicBool::new(ownership == Ownership::Owned),
            native,
        }
    }

    /// Take over one native reference, released when the last handle is
    /// dropped. Returns `false` if the wrapper already releases on drop.
    pub fn adopt_reference(&self) -> bool {
        !self.releases.swap(true, Ordering::AcqRel)
    }

    /// The wrapped native object.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Concrete native type of the object at wrap time.
    pub fn native_type(&self) -> NativeTypeId {
        self.native_type
    }

    /// Package the object is exposed under.
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// The native object system the object lives in.
    pub fn native(&self) -> &Arc<dyn NativeObjects> {
        &self.native
    }
}

impl Drop for ObjectWrapper {
    fn drop(&mut self) {
        if *self.releases.get_mut() {
            tracing::trace!(object = %self.object, package = %self.package, "releasing object");
            if let Err(err) = self.native.unref_object(self.object) {
                tracing::warn!(object = %self.object, error = %err, "failed to release object");
            }
        }
    }
}

impl fmt::Debug for ObjectWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectWrapper")
            .field("object", &self.object)
            .field("package", &self.package)
            .field("ownership", &self.ownership)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Boxed wrapper
// ============================================================================

/// Destroy hook attached to an owned boxed wrapper.
pub type DestroyFn = Arc<dyn Fn(&BoxedWrapper) + Send + Sync>;

/// Dynamic-side wrapper of a boxed structure.
pub struct BoxedWrapper {
    type_id: NativeTypeId,
    package: Arc<str>,
    block: Block,
    ownership: Ownership,
    destroy: OnceLock<DestroyFn>,
}

impl BoxedWrapper {
    pub fn new(type_id: NativeTypeId, package: Arc<str>, block: Block, ownership: Ownership) -> Self {
        Self {
            type_id,
            package,
            block,
            ownership,
            destroy: OnceLock::new(),
        }
    }

    /// Attach the destroy hook run when an owned wrapper is dropped.
    ///
    /// Returns `false` if a hook was already attached.
    pub fn set_destroy(&self, destroy: DestroyFn) -> bool {
        self.destroy.set(destroy).is_ok()
    }

    pub fn type_id(&self) -> NativeTypeId {
        self.type_id
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }
}

impl Drop for BoxedWrapper {
    fn drop(&mut self) {
        if self.ownership == Ownership::Owned
            && let Some(destroy) = self.destroy.get()
        {
            destroy(self);
        }
    }
}

impl fmt::Debug for BoxedWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedWrapper")
            .field("package", &self.package)
            .field("block", &self.block)
            .field("ownership", &self.ownership)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Callables
// ============================================================================

/// A dynamic-language callable.
///
/// Returning `Err` is how the callable raises a failure.
pub trait Invocable: Send + Sync {
    fn call(&self, args: &[Handle]) -> Result<Handle, Fault>;
}

impl<F> Invocable for F
where
    F: Fn(&[Handle]) -> Result<Handle, Fault> + Send + Sync,
{
    fn call(&self, args: &[Handle]) -> Result<Handle, Fault> {
        (self)(args)
    }
}

/// Shared reference to a dynamic callable.
#[derive(Clone)]
pub struct Callable(Arc<dyn Invocable>);

impl Callable {
    /// Wrap a callable.
    pub fn new<F>(f: F) -> Self
    where
        F: Invocable + 'static,
    {
        Self(Arc::new(f))
    }

    /// Call with the given arguments.
    pub fn call(&self, args: &[Handle]) -> Result<Handle, Fault> {
        self.0.call(args)
    }

    /// Whether two callables are the same reference.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live references to this callable.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

// ============================================================================
// Handle
// ============================================================================

/// The dynamic runtime's representation of a value.
#[derive(Clone, Default)]
pub enum Handle {
    /// The undefined value; converts to "no value" for nullable types.
    #[default]
    Undefined,
    Scalar(Scalar),
    Object(Arc<ObjectWrapper>),
    Boxed(Arc<BoxedWrapper>),
    Variant(Arc<Variant>),
    Callable(Callable),
}

impl Handle {
    /// Discriminant of this handle.
    pub fn kind(&self) -> HandleKind {
        match self {
            Handle::Undefined => HandleKind::Undefined,
            Handle::Scalar(_) => HandleKind::Scalar,
            Handle::Object(_) | Handle::Boxed(_) | Handle::Variant(_) => HandleKind::ObjectRef,
            Handle::Callable(_) => HandleKind::CallableRef,
        }
    }

    /// Check if this handle is defined.
    pub fn is_defined(&self) -> bool {
        !matches!(self, Handle::Undefined)
    }

    /// Ownership tag of object and boxed handles.
    pub fn ownership(&self) -> Option<Ownership> {
        match self {
            Handle::Object(wrapper) => Some(wrapper.ownership()),
            Handle::Boxed(wrapper) => Some(wrapper.ownership()),
            _ => None,
        }
    }

    /// Human-readable type description used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Handle::Undefined => "undef".to_string(),
            Handle::Scalar(scalar) => scalar.type_name().to_string(),
            Handle::Object(wrapper) => wrapper.package().to_string(),
            Handle::Boxed(wrapper) => wrapper.package().to_string(),
            Handle::Variant(variant) => format!("variant '{}'", variant.type_string()),
            Handle::Callable(_) => "callable".to_string(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Handle::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<ObjectWrapper>> {
        match self {
            Handle::Object(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    pub fn as_boxed(&self) -> Option<&Arc<BoxedWrapper>> {
        match self {
            Handle::Boxed(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Handle::Callable(callable) => Some(callable),
            _ => None,
        }
    }

    /// Create a string scalar.
    pub fn str(value: impl Into<String>) -> Self {
        Handle::Scalar(Scalar::Str(value.into()))
    }

    /// Create a set-of-names scalar.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Handle::Scalar(Scalar::Names(names.into_iter().map(Into::into).collect()))
    }

    /// Create a callable handle from a closure.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&[Handle]) -> Result<Handle, Fault> + Send + Sync + 'static,
    {
        Handle::Callable(Callable::new(f))
    }

    /// Whether two handles refer to the same value.
    ///
    /// Reference kinds compare by identity, scalars by value.
    pub fn same(&self, other: &Handle) -> bool {
        match (self, other) {
            (Handle::Undefined, Handle::Undefined) => true,
            (Handle::Scalar(a), Handle::Scalar(b)) => a == b,
            (Handle::Object(a), Handle::Object(b)) => Arc::ptr_eq(a, b),
            (Handle::Boxed(a), Handle::Boxed(b)) => Arc::ptr_eq(a, b),
            (Handle::Variant(a), Handle::Variant(b)) => Arc::ptr_eq(a, b),
            (Handle::Callable(a), Handle::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Handle::Variant(a), Handle::Variant(b)) => a == b,
            _ => self.same(other),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Undefined => write!(f, "Undefined"),
            Handle::Scalar(scalar) => write!(f, "Scalar({scalar:?})"),
            Handle::Object(wrapper) => write!(f, "Object({} {})", wrapper.package(), wrapper.object()),
            Handle::Boxed(wrapper) => write!(f, "Boxed({})", wrapper.package()),
            Handle::Variant(variant) => write!(f, "Variant({variant})"),
            Handle::Callable(callable) => write!(f, "{callable:?}"),
        }
    }
}
