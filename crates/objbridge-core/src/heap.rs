//! In-process native object system.
//!
//! [`ObjectHeap`] is a generational arena of reference-counted objects with a
//! small single-inheritance type system and per-type signals. It implements
//! [`NativeObjects`], so it can stand behind a bridge wherever no external
//! object system is available, and it is what the test suites run against.
//!
//! Objects are stored in a Vec with generation tracking. When an object is
//! finalized its slot is reused but the generation is incremented, which
//! makes stale [`ObjectId`]s detectable.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::{
    BridgeResult, HandlerId, NativeClosure, NativeError, NativeObjects, NativeTypeId,
    NativeValue, ObjectId, TypedValue,
};

/// Declared shape of a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalDef {
    /// Parameter types, not counting the instance.
    pub params: Vec<NativeTypeId>,
    /// Return type, `None` for void signals.
    pub return_type: Option<NativeTypeId>,
}

struct TypeEntry {
    name: String,
    parent: Option<NativeTypeId>,
    interfaces: Vec<NativeTypeId>,
    signals: FxHashMap<String, SignalDef>,
}

struct Handler {
    id: HandlerId,
    signal: String,
    closure: Arc<dyn NativeClosure>,
    after: bool,
}

struct LiveObject {
    type_id: NativeTypeId,
    ref_count: u32,
    handlers: Vec<Handler>,
}

struct HeapSlot {
    generation: u32,
    live: Option<LiveObject>,
}

#[derive(Default)]
struct HeapInner {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    types: FxHashMap<NativeTypeId, TypeEntry>,
    next_handler: u64,
    finalized: usize,
}

impl HeapInner {
    fn live(&self, object: ObjectId) -> Option<&LiveObject> {
        let slot = self.slots.get(object.index() as usize)?;
        if slot.generation != object.generation() {
            return None;
        }
        slot.live.as_ref()
    }

    fn live_mut(&mut self, object: ObjectId) -> Option<&mut LiveObject> {
        let slot = self.slots.get_mut(object.index() as usize)?;
        if slot.generation != object.generation() {
            return None;
        }
        slot.live.as_mut()
    }

    fn type_name(&self, ty: NativeTypeId) -> String {
        self.types
            .get(&ty)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| ty.to_string())
    }

    /// Find a signal on a type or any of its ancestors and interfaces.
    fn find_signal(&self, ty: NativeTypeId, signal: &str) -> Option<&SignalDef> {
        let mut current = Some(ty);
        while let Some(id) = current {
            let entry = self.types.get(&id)?;
            if let Some(def) = entry.signals.get(signal) {
                return Some(def);
            }
            for iface in &entry.interfaces {
                if let Some(def) = self.types.get(iface).and_then(|e| e.signals.get(signal)) {
                    return Some(def);
                }
            }
            current = entry.parent;
        }
        None
    }
}

/// Heap storage for native objects with generational indices.
pub struct ObjectHeap {
    inner: Mutex<HeapInner>,
}

impl ObjectHeap {
    /// Create a new empty heap with no types.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HeapInner::default()),
        }
    }

    /// Define a native type, optionally deriving from `parent`.
    pub fn define_type(
        &self,
        name: &str,
        parent: Option<NativeTypeId>,
    ) -> Result<NativeTypeId, NativeError> {
        let id = NativeTypeId::from_name(name);
        let mut inner = self.inner.lock();
        if inner.types.contains_key(&id) {
            return Err(NativeError::DuplicateType(name.to_string()));
        }
        if let Some(parent) = parent
            && !inner.types.contains_key(&parent)
        {
            return Err(NativeError::UnknownType(parent));
        }
        inner.types.insert(
            id,
            TypeEntry {
                name: name.to_string(),
                parent,
                interfaces: Vec::new(),
                signals: FxHashMap::default(),
            },
        );
        Ok(id)
    }

    /// Declare that `ty` implements the interface type `iface`.
    pub fn add_interface(&self, ty: NativeTypeId, iface: NativeTypeId) -> Result<(), NativeError> {
        let mut inner = self.inner.lock();
        if !inner.types.contains_key(&iface) {
            return Err(NativeError::UnknownType(iface));
        }
        let entry = inner.types.get_mut(&ty).ok_or(NativeError::UnknownType(ty))?;
        if !entry.interfaces.contains(&iface) {
            entry.interfaces.push(iface);
        }
        Ok(())
    }

    /// Define a signal on a type. Subtypes inherit it.
    pub fn define_signal(
        &self,
        ty: NativeTypeId,
        name: &str,
        params: Vec<NativeTypeId>,
        return_type: Option<NativeTypeId>,
    ) -> Result<(), NativeError> {
        let mut inner = self.inner.lock();
        let entry = inner.types.get_mut(&ty).ok_or(NativeError::UnknownType(ty))?;
        if entry.signals.contains_key(name) {
            return Err(NativeError::DuplicateSignal {
                type_name: entry.name.clone(),
                signal: name.to_string(),
            });
        }
        entry
            .signals
            .insert(name.to_string(), SignalDef { params, return_type });
        Ok(())
    }

    /// Look up a signal definition visible on `ty`.
    pub fn signal(&self, ty: NativeTypeId, name: &str) -> Option<SignalDef> {
        self.inner.lock().find_signal(ty, name).cloned()
    }

    /// Create an object of `ty` with a reference count of one.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn instantiate(&self, ty: NativeTypeId) -> Result<ObjectId, NativeError> {
        let mut inner = self.inner.lock();
        if !inner.types.contains_key(&ty) {
            return Err(NativeError::UnknownType(ty));
        }
        let live = LiveObject {
            type_id: ty,
            ref_count: 1,
            handlers: Vec::new(),
        };

        if let Some(index) = inner.free_list.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.live = Some(live);
            Ok(ObjectId::new(index, slot.generation))
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(HeapSlot {
                generation: 0,
                live: Some(live),
            });
            Ok(ObjectId::new(index, 0))
        }
    }

    /// Whether the object is still alive.
    pub fn is_alive(&self, object: ObjectId) -> bool {
        self.inner.lock().live(object).is_some()
    }

    /// Number of objects finalized since the heap was created.
    pub fn finalized_count(&self) -> usize {
        self.inner.lock().finalized
    }

    /// Number of handlers connected to an object.
    pub fn handler_count(&self, object: ObjectId) -> usize {
        self.inner
            .lock()
            .live(object)
            .map_or(0, |live| live.handlers.len())
    }

    /// Emit a signal on an object.
    ///
    /// Handlers run in connection order, normal handlers before `after`
    /// handlers. The result is the value returned by the last handler. The
    /// object is kept alive for the duration of the emission, and no heap
    /// lock is held while handlers run, so they may freely re-enter.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn emit(
        &self,
        object: ObjectId,
        signal: &str,
        args: Vec<NativeValue>,
    ) -> BridgeResult<Option<TypedValue>> {
        let (params, return_type, closures) = {
            let mut inner = self.inner.lock();
            let type_id = inner
                .live(object)
                .ok_or(NativeError::StaleObject(object))?
                .type_id;
            let def = inner
                .find_signal(type_id, signal)
                .cloned()
                .ok_or_else(|| NativeError::UnknownSignal {
                    type_name: inner.type_name(type_id),
                    signal: signal.to_string(),
                })?;
            if def.params.len() != args.len() {
                return Err(NativeError::SignalArity {
                    signal: signal.to_string(),
                    expected: def.params.len(),
                    got: args.len(),
                }
                .into());
            }

            let live = inner
                .live_mut(object)
                .ok_or(NativeError::StaleObject(object))?;
            live.ref_count += 1;

            let mut closures: Vec<Arc<dyn NativeClosure>> = Vec::new();
            for after in [false, true] {
                closures.extend(
                    live.handlers
                        .iter()
                        .filter(|h| h.signal == signal && h.after == after)
                        .map(|h| Arc::clone(&h.closure)),
                );
            }

            let mut params = Vec::with_capacity(args.len() + 1);
            params.push(TypedValue::object(type_id, object));
            params.extend(
                def.params
                    .iter()
                    .zip(args)
                    .map(|(ty, value)| TypedValue::new(*ty, value)),
            );
            (params, def.return_type, closures)
        };

        tracing::trace!(%object, signal, handlers = closures.len(), "emitting signal");

        let mut result = Ok(None);
        for closure in &closures {
            match closure.invoke(&params, return_type) {
                Ok(value) => result = Ok(value),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        drop(closures);

        self.unref_object(object)?;
        result
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ObjectHeap")
            .field("slot_count", &inner.slots.len())
            .field("free_count", &inner.free_list.len())
            .field("type_count", &inner.types.len())
            .finish()
    }
}

impl NativeObjects for ObjectHeap {
    fn type_of(&self, object: ObjectId) -> Option<NativeTypeId> {
        self.inner.lock().live(object).map(|live| live.type_id)
    }

    fn type_name(&self, ty: NativeTypeId) -> Option<String> {
        self.inner.lock().types.get(&ty).map(|entry| entry.name.clone())
    }

    fn parent_of(&self, ty: NativeTypeId) -> Option<NativeTypeId> {
        self.inner.lock().types.get(&ty).and_then(|entry| entry.parent)
    }

    fn is_a(&self, ty: NativeTypeId, ancestor: NativeTypeId) -> bool {
        let inner = self.inner.lock();
        let mut current = Some(ty);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            let Some(entry) = inner.types.get(&id) else {
                return false;
            };
            if entry.interfaces.contains(&ancestor) {
                return true;
            }
            current = entry.parent;
        }
        false
    }

    fn ref_object(&self, object: ObjectId) -> Result<(), NativeError> {
        let mut inner = self.inner.lock();
        let live = inner
            .live_mut(object)
            .ok_or(NativeError::StaleObject(object))?;
        live.ref_count = live.ref_count.saturating_add(1);
        Ok(())
    }

    fn unref_object(&self, object: ObjectId) -> Result<(), NativeError> {
        // Handlers of a finalized object are dropped after the lock is
        // released; dropping a closure may unref other objects.
        let released = {
            let mut inner = self.inner.lock();
            let slot = inner
                .slots
                .get_mut(object.index() as usize)
                .filter(|slot| slot.generation == object.generation())
                .ok_or(NativeError::StaleObject(object))?;
            let live = slot.live.as_mut().ok_or(NativeError::StaleObject(object))?;
            live.ref_count -= 1;
            if live.ref_count > 0 {
                return Ok(());
            }
            let live = slot.live.take();
            slot.generation = slot.generation.wrapping_add(1);
            inner.free_list.push(object.index());
            inner.finalized += 1;
            live
        };
        tracing::debug!(%object, "object finalized");
        drop(released);
        Ok(())
    }

    fn ref_count(&self, object: ObjectId) -> Option<u32> {
        self.inner.lock().live(object).map(|live| live.ref_count)
    }

    fn connect(
        &self,
        object: ObjectId,
        signal: &str,
        closure: Arc<dyn NativeClosure>,
        after: bool,
    ) -> Result<HandlerId, NativeError> {
        let mut inner = self.inner.lock();
        let type_id = inner
            .live(object)
            .ok_or(NativeError::StaleObject(object))?
            .type_id;
        if inner.find_signal(type_id, signal).is_none() {
            return Err(NativeError::UnknownSignal {
                type_name: inner.type_name(type_id),
                signal: signal.to_string(),
            });
        }
        inner.next_handler += 1;
        let id = HandlerId::new(inner.next_handler);
        let live = inner
            .live_mut(object)
            .ok_or(NativeError::StaleObject(object))?;
        live.handlers.push(Handler {
            id,
            signal: signal.to_string(),
            closure,
            after,
        });
        Ok(id)
    }

    fn disconnect(&self, object: ObjectId, handler: HandlerId) -> Result<(), NativeError> {
        let removed = {
            let mut inner = self.inner.lock();
            let live = inner
                .live_mut(object)
                .ok_or(NativeError::StaleObject(object))?;
            let pos = live
                .handlers
                .iter()
                .position(|h| h.id == handler)
                .ok_or(NativeError::UnknownHandler(handler))?;
            live.handlers.remove(pos)
        };
        drop(removed);
        Ok(())
    }
}
