//! Signal connection and per-signal marshallers.

use std::sync::Arc;

use bitflags::bitflags;

use objbridge_core::{
    BridgeResult, Callable, ConversionError, Handle, HandlerId, NativeClosure, NativeError,
    NativeTypeId, ObjectWrapper,
};

use crate::bridge::MarshallerEntry;
use crate::closure::Marshaller;
use crate::Bridge;

bitflags! {
    /// Options of [`Bridge::signal_connect`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConnectFlags: u32 {
        /// Run after the default handlers.
        const AFTER = 1 << 0;
        /// Pass the user data in place of the instance.
        const SWAPPED = 1 << 1;
    }
}

impl Bridge {
    /// Connect `callable` to `signal` on the object behind `instance`.
    ///
    /// Failures raised by the callable are reported as coming from
    /// `Package::signal`. A marshaller installed with
    /// [`set_marshaller_for`](Self::set_marshaller_for) for the instance's
    /// type or one of its ancestors is used when present.
    pub fn signal_connect(
        &self,
        instance: &Handle,
        signal: &str,
        callable: Callable,
        data: Option<Handle>,
        flags: ConnectFlags,
    ) -> BridgeResult<HandlerId> {
        let wrapper = self.signal_target(instance)?;
        let object = wrapper.object();
        let native_type = self
            .inner
            .native
            .type_of(object)
            .ok_or(NativeError::StaleObject(object))?;

        let origin = format!("{}::{}", wrapper.package(), signal);
        let closure: Arc<dyn NativeClosure> = self.build_closure(
            callable,
            data,
            flags.contains(ConnectFlags::SWAPPED),
            self.marshaller_for(native_type, signal),
            Some(origin),
        );
        let handler = self.inner.native.connect(
            object,
            signal,
            closure,
            flags.contains(ConnectFlags::AFTER),
        )?;
        tracing::debug!(%object, signal, %handler, ?flags, "connected signal handler");
        Ok(handler)
    }

    /// Disconnect a handler returned by [`signal_connect`](Self::signal_connect).
    pub fn signal_disconnect(&self, instance: &Handle, handler: HandlerId) -> BridgeResult<()> {
        let wrapper = self.signal_target(instance)?;
        self.inner.native.disconnect(wrapper.object(), handler)?;
        tracing::debug!(object = %wrapper.object(), %handler, "disconnected signal handler");
        Ok(())
    }

    /// Use `marshaller` for closures connected to `signal` on `type_name`
    /// and its subtypes. Replaces an earlier marshaller for the same pair.
    pub fn set_marshaller_for(&self, type_name: &str, signal: &str, marshaller: Arc<dyn Marshaller>) {
        let type_id = NativeTypeId::from_name(type_name);
        tracing::debug!(type_name, signal, "installing signal marshaller");
        let mut entries = self.inner.marshallers.write();
        entries.retain(|entry| !(entry.type_id == type_id && entry.signal == signal));
        entries.push(MarshallerEntry {
            type_id,
            signal: signal.to_string(),
            marshaller,
        });
    }

    /// Marshaller for `signal` on the most derived type that has one.
    fn marshaller_for(&self, native_type: NativeTypeId, signal: &str) -> Option<Arc<dyn Marshaller>> {
        let entries = self.inner.marshallers.read();
        if entries.is_empty() {
            return None;
        }
        let mut current = Some(native_type);
        while let Some(ty) = current {
            if let Some(entry) = entries
                .iter()
                .find(|entry| entry.type_id == ty && entry.signal == signal)
            {
                return Some(Arc::clone(&entry.marshaller));
            }
            current = self.inner.native.parent_of(ty);
        }
        None
    }

    fn signal_target<'h>(&self, instance: &'h Handle) -> BridgeResult<&'h Arc<ObjectWrapper>> {
        instance
            .as_object()
            .ok_or_else(|| ConversionError::mismatch("object", instance.type_name()).into())
    }
}
