//! Bridge - one dynamic runtime instance's view of the native object system.
//!
//! A [`Bridge`] ties together everything a runtime instance needs to move
//! values across the boundary:
//!
//! - the shared [`TypeRegistry`]
//! - the [`NativeObjects`] system objects live in
//! - the identity arena that keeps one wrapper per native object
//! - the [`ExceptionRelay`] that receives deferred failures
//! - the ambient error slot saved around every invocation
//!
//! The conversion, wrapper, closure and callback operations are implemented
//! on `Bridge` in their own modules.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use objbridge::{Bridge, Classification, NativeObjects, ObjectHeap, TypeRegistry};
//!
//! let heap = Arc::new(ObjectHeap::new());
//! let button = heap.define_type("Button", None).unwrap();
//! let bridge = Bridge::builder(heap.clone())
//!     .registry(Arc::new(TypeRegistry::with_fundamentals()))
//!     .build();
//! bridge
//!     .register_type("Button", "Ui::Button", Classification::Object, None)
//!     .unwrap();
//!
//! let object = heap.instantiate(button).unwrap();
//! let handle = bridge.wrap_object(object, false).unwrap();
//! assert_eq!(handle.type_name(), "Ui::Button");
//! assert_eq!(heap.ref_count(object), Some(2));
//! ```

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;

use objbridge_core::{
    BridgeResult, Fault, NativeObjects, NativeTypeId, ObjectId, RegistrationError, RuntimeId,
};
use objbridge_registry::{EnumValue, ErrorRecord, TypeRegistry, WrapperStrategy};

use crate::closure::Marshaller;
use crate::context::{self, ContextGuard};
use crate::object::{self, IdentityArena};
use crate::{BridgeBuilder, BridgeConfig, CapturedFault, ExceptionRelay, RelayHandlerId};

pub(crate) struct MarshallerEntry {
    pub(crate) type_id: NativeTypeId,
    pub(crate) signal: String,
    pub(crate) marshaller: Arc<dyn Marshaller>,
}

pub(crate) struct BridgeInner {
    pub(crate) id: RuntimeId,
    pub(crate) home: ThreadId,
    pub(crate) config: BridgeConfig,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) native: Arc<dyn NativeObjects>,
    pub(crate) relay: Arc<ExceptionRelay>,
    pub(crate) arena: Mutex<IdentityArena>,
    pub(crate) error_slot: Mutex<Option<Fault>>,
    pub(crate) marshallers: RwLock<Vec<MarshallerEntry>>,
    pub(crate) warned: Mutex<FxHashSet<NativeTypeId>>,
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        // Wrappers still held by handles take over their defensive reference
        // and release it with their last handle.
        let (outliving, idle): (Vec<_>, Vec<_>) = self
            .arena
            .get_mut()
            .drain_borrowed()
            .into_iter()
            .partition(|wrapper| Arc::strong_count(wrapper) > 1);
        for wrapper in &outliving {
            wrapper.adopt_reference();
        }
        let released = object::release_defensive(self.native.as_ref(), idle);
        tracing::debug!(
            runtime = %self.id,
            released,
            handed_over = outliving.len(),
            "dropping bridge"
        );
    }
}

/// A dynamic runtime instance attached to a native object system.
///
/// Cloning a `Bridge` is cheap and yields another reference to the same
/// instance.
#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Create a bridge with the default configuration and the process-wide
    /// registry.
    pub fn new(native: Arc<dyn NativeObjects>) -> Self {
        Self::builder(native).build()
    }

    /// Start configuring a bridge.
    pub fn builder(native: Arc<dyn NativeObjects>) -> BridgeBuilder {
        BridgeBuilder::new(native)
    }

    pub(crate) fn from_parts(
        native: Arc<dyn NativeObjects>,
        registry: Arc<TypeRegistry>,
        relay: Arc<ExceptionRelay>,
        config: BridgeConfig,
    ) -> Self {
        let id = RuntimeId::next();
        tracing::debug!(runtime = %id, ?config, "creating bridge");
        Self {
            inner: Arc::new(BridgeInner {
                id,
                home: std::thread::current().id(),
                config,
                registry,
                native,
                relay,
                arena: Mutex::new(IdentityArena::default()),
                error_slot: Mutex::new(None),
                marshallers: RwLock::new(Vec::new()),
                warned: Mutex::new(FxHashSet::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<BridgeInner>) -> Self {
        Self { inner }
    }

    /// Identity of this runtime instance.
    pub fn id(&self) -> RuntimeId {
        self.inner.id
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.inner.registry
    }

    pub fn native(&self) -> &Arc<dyn NativeObjects> {
        &self.inner.native
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn relay(&self) -> &Arc<ExceptionRelay> {
        &self.inner.relay
    }

    // ==========================================================================
    // Runtime context
    // ==========================================================================

    /// Establish this runtime's context on the current thread.
    ///
    /// Closures and callbacks of this bridge invoked from a thread other than
    /// the one that created it fail with `WrongContext` unless a guard is held.
    pub fn enter(&self) -> ContextGuard {
        ContextGuard::enter(self.inner.id)
    }

    /// Fail with `WrongContext` unless this runtime may run on the current
    /// thread right now.
    pub fn check_context(&self) -> BridgeResult<()> {
        context::check(self.inner.id, self.inner.home).map_err(Into::into)
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a native type under a package. See [`TypeRegistry::register`].
    pub fn register_type(
        &self,
        type_name: &str,
        package: &str,
        classification: objbridge_core::Classification,
        strategy: Option<WrapperStrategy>,
    ) -> Result<NativeTypeId, RegistrationError> {
        self.inner
            .registry
            .register(type_name, package, classification, strategy)
    }

    pub fn register_alias(&self, type_name: &str, alias: &str) -> Result<(), RegistrationError> {
        self.inner.registry.register_alias(type_name, alias)
    }

    pub fn register_synonym(&self, type_name: &str, synonym: &str) -> Result<(), RegistrationError> {
        self.inner.registry.register_synonym(type_name, synonym)
    }

    pub fn register_strategy(
        &self,
        type_name: &str,
        package: &str,
        strategy: WrapperStrategy,
    ) -> Result<NativeTypeId, RegistrationError> {
        self.inner
            .registry
            .register_strategy(type_name, package, strategy)
    }

    pub fn register_enum(
        &self,
        type_name: &str,
        package: &str,
        values: Vec<EnumValue<i32>>,
    ) -> Result<NativeTypeId, RegistrationError> {
        self.inner.registry.register_enum(type_name, package, values)
    }

    pub fn register_flags(
        &self,
        type_name: &str,
        package: &str,
        values: Vec<EnumValue<u32>>,
    ) -> Result<NativeTypeId, RegistrationError> {
        self.inner.registry.register_flags(type_name, package, values)
    }

    pub fn register_sink_func<F>(&self, type_name: &str, sink: F)
    where
        F: Fn(&dyn NativeObjects, ObjectId) + Send + Sync + 'static,
    {
        self.inner.registry.register_sink_func(type_name, sink);
    }

    pub fn register_error_domain(
        &self,
        domain: &str,
        enum_type: &str,
        package: &str,
    ) -> Result<(), RegistrationError> {
        self.inner
            .registry
            .register_error_domain(domain, enum_type, package)
    }

    // ==========================================================================
    // Exception relay
    // ==========================================================================

    /// Install a deferred-failure handler. Return `Ok(false)` from the
    /// handler to uninstall it.
    pub fn install_handler<F>(&self, handler: F) -> RelayHandlerId
    where
        F: FnMut(&CapturedFault) -> Result<bool, Fault> + Send + 'static,
    {
        self.inner.relay.install_handler(handler)
    }

    pub fn remove_handler(&self, id: RelayHandlerId) -> bool {
        self.inner.relay.remove_handler(id)
    }

    /// Drain deferred failures, then [`sweep`](Self::sweep) the identity
    /// arena. See [`ExceptionRelay::run_pending`].
    pub fn run_pending(&self) -> BridgeResult<usize> {
        let drained = self.inner.relay.run_pending();
        self.sweep();
        drained
    }

    /// Number of deferred failures waiting to be drained.
    pub fn pending_faults(&self) -> usize {
        self.inner.relay.pending()
    }

    // ==========================================================================
    // Error slot
    // ==========================================================================

    /// The ambient error slot: the failure most recently raised in this
    /// runtime outside of any bridge invocation.
    pub fn error_slot(&self) -> Option<Fault> {
        self.inner.error_slot.lock().clone()
    }

    /// Replace the ambient error slot, returning its previous value.
    pub fn set_error_slot(&self, fault: Option<Fault>) -> Option<Fault> {
        std::mem::replace(&mut *self.inner.error_slot.lock(), fault)
    }

    // ==========================================================================
    // Error mirroring
    // ==========================================================================

    /// Mirror a native error record as a fault.
    pub fn fault_from_error(&self, record: &ErrorRecord) -> Fault {
        self.inner.registry.fault_from_error(record)
    }

    /// Convert a fault back to a native error record.
    pub fn error_from_fault(&self, fault: &Fault) -> BridgeResult<ErrorRecord> {
        Ok(self.inner.registry.error_from_fault(fault)?)
    }

    pub(crate) fn capture_fault(&self, fault: Fault, origin: &str) {
        self.inner.relay.capture(fault, origin, self.inner.id);
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("live_objects", &self.inner.arena.lock().len())
            .field("relay", &self.inner.relay)
            .finish_non_exhaustive()
    }
}
