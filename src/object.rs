//! Object wrapper: identity-preserving wraps of reference-counted objects.
//!
//! Every bridge keeps an identity arena keyed by [`ObjectId`]. While a
//! wrapper for an object is alive, every wrap of that object returns it, so
//! a native identity maps to at most one live handle per runtime instance.
//!
//! ## Ownership
//!
//! - **Owned** wraps adopt the caller's reference. The arena only keeps a
//!   weak back-reference; the wrapper releases the reference exactly once
//!   when its last handle is dropped.
//! - **Borrowed** wraps take a defensive reference of their own. That
//!   reference belongs to the arena, which keeps the wrapper alive until
//!   [`Bridge::sweep`] finds no handle left or the bridge is dropped. A
//!   handle that outlives its bridge keeps the object alive and releases the
//!   reference when it is dropped.
//!
//! [`Bridge::run_pending`] sweeps after draining the relay, so an event loop
//! that drains failures once per iteration also releases the borrowed
//! wrappers and dead entries of that iteration.

use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;

use objbridge_core::{
    BridgeResult, ConversionError, Handle, NativeError, NativeObjects, NativeTypeId, ObjectId,
    ObjectWrapper, Ownership,
};

use crate::Bridge;

enum ArenaSlot {
    Owned(Weak<ObjectWrapper>),
    Borrowed(Arc<ObjectWrapper>),
}

/// Live wrappers of one runtime instance, keyed by native identity.
#[derive(Default)]
pub(crate) struct IdentityArena {
    entries: FxHashMap<ObjectId, ArenaSlot>,
}

impl IdentityArena {
    /// Live wrapper of `object`. A dead owned entry is pruned on the way.
    fn live(&mut self, object: ObjectId) -> Option<Arc<ObjectWrapper>> {
        let live = match self.entries.get(&object)? {
            ArenaSlot::Owned(weak) => weak.upgrade(),
            ArenaSlot::Borrowed(strong) => Some(Arc::clone(strong)),
        };
        if live.is_none() {
            self.entries.remove(&object);
        }
        live
    }

    fn insert(&mut self, wrapper: &Arc<ObjectWrapper>) {
        let slot = match wrapper.ownership() {
            Ownership::Owned => ArenaSlot::Owned(Arc::downgrade(wrapper)),
            Ownership::Borrowed => ArenaSlot::Borrowed(Arc::clone(wrapper)),
        };
        self.entries.insert(wrapper.object(), slot);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove entries no handle refers to any more. Returns the borrowed
    /// wrappers whose defensive reference must now be released.
    fn sweep(&mut self) -> Vec<Arc<ObjectWrapper>> {
        let mut released = Vec::new();
        self.entries.retain(|_, slot| match slot {
            ArenaSlot::Owned(weak) => weak.strong_count() > 0,
            ArenaSlot::Borrowed(strong) if Arc::strong_count(strong) == 1 => {
                released.push(Arc::clone(strong));
                false
            }
            ArenaSlot::Borrowed(_) => true,
        });
        released
    }

    /// Empty the arena, returning every borrowed wrapper it held.
    pub(crate) fn drain_borrowed(&mut self) -> Vec<Arc<ObjectWrapper>> {
        self.entries
            .drain()
            .filter_map(|(_, slot)| match slot {
                ArenaSlot::Borrowed(strong) => Some(strong),
                ArenaSlot::Owned(_) => None,
            })
            .collect()
    }
}

/// Release the defensive references of borrowed wrappers.
pub(crate) fn release_defensive(native: &dyn NativeObjects, held: Vec<Arc<ObjectWrapper>>) -> usize {
    let count = held.len();
    for wrapper in held {
        let object = wrapper.object();
        drop(wrapper);
        if let Err(err) = native.unref_object(object) {
            tracing::warn!(%object, error = %err, "failed to release defensive reference");
        }
    }
    count
}

impl Bridge {
    /// Wrap a native object as a handle.
    ///
    /// If the object already has a live handle in this runtime instance, that
    /// handle is returned and `owned` is ignored. Otherwise an `owned` wrap
    /// adopts the caller's reference, and a borrowed wrap takes a defensive
    /// reference of its own.
    ///
    /// Objects whose type is not registered are exposed under their nearest
    /// registered ancestor's package when subclass fallback is enabled.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn wrap_object(&self, object: ObjectId, owned: bool) -> BridgeResult<Handle> {
        let native = &self.inner.native;
        let native_type = native
            .type_of(object)
            .ok_or(NativeError::StaleObject(object))?;

        let wrapper = {
            let mut arena = self.inner.arena.lock();
            if let Some(existing) = arena.live(object) {
                tracing::trace!(%object, "reusing live wrapper");
                return Ok(Handle::Object(existing));
            }

            let package = self.object_package(native_type)?;
            let ownership = Ownership::from_owned(owned);
            if ownership == Ownership::Borrowed {
                native.ref_object(object)?;
            }
            let wrapper = Arc::new(ObjectWrapper::new(
                object,
                native_type,
                package,
                ownership,
                Arc::clone(native),
            ));
            arena.insert(&wrapper);
            wrapper
        };
        tracing::debug!(%object, package = wrapper.package(), owned, "wrapped object");

        if owned && let Some(sink) = self.inner.registry.sink_for(native.as_ref(), native_type) {
            sink(native.as_ref(), object);
        }
        Ok(Handle::Object(wrapper))
    }

    /// Extract the native object behind a handle.
    ///
    /// The object must be of `expected` or a subtype or implementor of it.
    /// The reference count is left untouched.
    pub fn unwrap_object(&self, handle: &Handle, expected: NativeTypeId) -> BridgeResult<ObjectId> {
        let Some(wrapper) = handle.as_object() else {
            return Err(ConversionError::mismatch(self.describe_type(expected), handle.type_name()).into());
        };
        let object = wrapper.object();
        let actual = self
            .inner
            .native
            .type_of(object)
            .ok_or(NativeError::StaleObject(object))?;
        let expected_canonical = self
            .inner
            .registry
            .resolve(expected)
            .map_or(expected, |info| info.type_id);

        if self.inner.native.is_a(actual, expected_canonical) {
            Ok(object)
        } else {
            Err(ConversionError::mismatch(self.describe_type(expected), wrapper.package()).into())
        }
    }

    /// Release the defensive references of borrowed wraps that no handle
    /// refers to any more. Returns the number of references released.
    pub fn sweep(&self) -> usize {
        let released = self.inner.arena.lock().sweep();
        let count = release_defensive(self.inner.native.as_ref(), released);
        if count > 0 {
            tracing::debug!(runtime = %self.inner.id, count, "swept borrowed wrappers");
        }
        count
    }

    /// Number of identities currently tracked by the arena.
    pub fn live_objects(&self) -> usize {
        self.inner.arena.lock().len()
    }

    fn object_package(&self, native_type: NativeTypeId) -> BridgeResult<Arc<str>> {
        let registry = &self.inner.registry;
        if let Some(info) = registry.resolve(native_type) {
            if info.classification.is_refcounted() {
                return Ok(info.package);
            }
            return Err(ConversionError::mismatch("object", info.classification.as_str()).into());
        }

        if self.inner.config.subclass_fallback {
            let mut current = self.inner.native.parent_of(native_type);
            while let Some(ancestor) = current {
                if let Some(info) = registry
                    .resolve(ancestor)
                    .filter(|info| info.classification.is_refcounted())
                {
                    self.warn_fallback(native_type, &info.package);
                    return Ok(info.package);
                }
                current = self.inner.native.parent_of(ancestor);
            }
        }

        Err(ConversionError::UnconvertibleType {
            type_name: self.describe_type(native_type),
        }
        .into())
    }

    fn warn_fallback(&self, native_type: NativeTypeId, package: &str) {
        if !self.inner.config.warn_on_fallback || !self.inner.warned.lock().insert(native_type) {
            return;
        }
        tracing::warn!(
            type_name = %self.describe_type(native_type),
            package,
            "type is not registered, representing it as its nearest registered ancestor"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objbridge_core::{Classification, ObjectHeap};
    use objbridge_registry::TypeRegistry;

    fn setup() -> (Arc<ObjectHeap>, Bridge, NativeTypeId) {
        let heap = Arc::new(ObjectHeap::new());
        let ty = heap.define_type("Widget", None).unwrap();
        let bridge = Bridge::builder(heap.clone())
            .registry(Arc::new(TypeRegistry::with_fundamentals()))
            .build();
        bridge
            .register_type("Widget", "Ui::Widget", Classification::Object, None)
            .unwrap();
        (heap, bridge, ty)
    }

    #[test]
    fn borrowed_wrap_takes_one_defensive_ref() {
        let (heap, bridge, ty) = setup();
        let obj = heap.instantiate(ty).unwrap();
        let a = bridge.wrap_object(obj, false).unwrap();
        let b = bridge.wrap_object(obj, false).unwrap();
        assert!(a.same(&b));
        assert_eq!(heap.ref_count(obj), Some(2));
        assert_eq!(a.ownership(), Some(Ownership::Borrowed));
    }

    #[test]
    fn sweep_releases_unreferenced_borrowed() {
        let (heap, bridge, ty) = setup();
        let obj = heap.instantiate(ty).unwrap();
        let handle = bridge.wrap_object(obj, false).unwrap();
        assert_eq!(bridge.sweep(), 0);
        drop(handle);
        assert_eq!(heap.ref_count(obj), Some(2));
        assert_eq!(bridge.sweep(), 1);
        assert_eq!(heap.ref_count(obj), Some(1));
        assert_eq!(bridge.live_objects(), 0);
    }

    #[test]
    fn run_pending_prunes_dead_owned_entries() {
        let (heap, bridge, ty) = setup();
        for _ in 0..100 {
            let obj = heap.instantiate(ty).unwrap();
            drop(bridge.wrap_object(obj, true).unwrap());
            assert!(!heap.is_alive(obj));
        }
        assert_eq!(bridge.live_objects(), 100);
        assert_eq!(bridge.run_pending(), Ok(0));
        assert_eq!(bridge.live_objects(), 0);
    }

    #[test]
    fn rewrap_after_owned_drop_takes_fresh_reference() {
        let (heap, bridge, ty) = setup();
        let obj = heap.instantiate(ty).unwrap();
        heap.ref_object(obj).unwrap();
        drop(bridge.wrap_object(obj, true).unwrap());
        assert_eq!(heap.ref_count(obj), Some(1));

        let handle = bridge.wrap_object(obj, false).unwrap();
        assert_eq!(handle.ownership(), Some(Ownership::Borrowed));
        assert_eq!(heap.ref_count(obj), Some(2));
        assert_eq!(bridge.live_objects(), 1);
    }

    #[test]
    fn owned_wrap_releases_on_drop() {
        let (heap, bridge, ty) = setup();
        let obj = heap.instantiate(ty).unwrap();
        heap.ref_object(obj).unwrap();
        let handle = bridge.wrap_object(obj, true).unwrap();
        assert_eq!(heap.ref_count(obj), Some(2));
        let again = bridge.wrap_object(obj, false).unwrap();
        assert_eq!(again.ownership(), Some(Ownership::Owned));
        drop(handle);
        drop(again);
        assert_eq!(heap.ref_count(obj), Some(1));
    }

    #[test]
    fn stale_object_rejected() {
        let (heap, bridge, ty) = setup();
        let obj = heap.instantiate(ty).unwrap();
        heap.unref_object(obj).unwrap();
        assert!(matches!(
            bridge.wrap_object(obj, false),
            Err(objbridge_core::BridgeError::Native(NativeError::StaleObject(_)))
        ));
    }

    #[test]
    fn dropping_bridge_releases_defensive_refs() {
        let (heap, bridge, ty) = setup();
        let obj = heap.instantiate(ty).unwrap();
        let _ = bridge.wrap_object(obj, false).unwrap();
        assert_eq!(heap.ref_count(obj), Some(2));
        drop(bridge);
        assert_eq!(heap.ref_count(obj), Some(1));
    }

    #[test]
    fn unregistered_root_type_is_unconvertible() {
        let (heap, bridge, _) = setup();
        let loose = heap.define_type("Loose", None).unwrap();
        let obj = heap.instantiate(loose).unwrap();
        let err = bridge.wrap_object(obj, false).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(heap.ref_count(obj), Some(1));
    }

    #[test]
    fn fallback_can_be_disabled() {
        let heap = Arc::new(ObjectHeap::new());
        let base = heap.define_type("Widget", None).unwrap();
        let derived = heap.define_type("Fancy", Some(base)).unwrap();
        let bridge = Bridge::builder(heap.clone())
            .registry(Arc::new(TypeRegistry::new()))
            .subclass_fallback(false)
            .build();
        bridge
            .register_type("Widget", "Ui::Widget", Classification::Object, None)
            .unwrap();
        let obj = heap.instantiate(derived).unwrap();
        assert!(bridge.wrap_object(obj, false).is_err());
    }

    #[test]
    fn unwrap_checks_subtype() {
        let (heap, bridge, widget) = setup();
        let other = heap.define_type("Other", None).unwrap();
        bridge
            .register_type("Other", "Ui::Other", Classification::Object, None)
            .unwrap();
        let obj = heap.instantiate(widget).unwrap();
        let handle = bridge.wrap_object(obj, false).unwrap();
        assert_eq!(bridge.unwrap_object(&handle, widget).unwrap(), obj);
        assert_eq!(
            bridge.unwrap_object(&handle, other).unwrap_err(),
            objbridge_core::BridgeError::from(ConversionError::mismatch("Ui::Other", "Ui::Widget"))
        );
        assert!(bridge.unwrap_object(&Handle::str("no"), widget).is_err());
    }
}
