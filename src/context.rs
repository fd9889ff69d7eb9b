//! Runtime execution context and the ambient error slot.
//!
//! Each thread carries a stack of entered runtime contexts. A closure or
//! callback only runs when its own runtime is the innermost entered one, or
//! when nothing is entered and the caller is the runtime's home thread.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::thread::ThreadId;

use parking_lot::Mutex;

use objbridge_core::{Fault, InvocationError, RuntimeId};

thread_local! {
    static ENTERED: RefCell<Vec<RuntimeId>> = const { RefCell::new(Vec::new()) };
}

/// The innermost runtime context entered on this thread.
pub fn current_runtime() -> Option<RuntimeId> {
    ENTERED.with(|stack| stack.borrow().last().copied())
}

/// Fail fast unless `runtime` may run on this thread right now.
pub(crate) fn check(runtime: RuntimeId, home: ThreadId) -> Result<(), InvocationError> {
    match current_runtime() {
        Some(current) if current == runtime => Ok(()),
        None if std::thread::current().id() == home => Ok(()),
        current => Err(InvocationError::WrongContext {
            expected: runtime,
            current,
        }),
    }
}

/// Keeps a runtime context established on the current thread.
///
/// Created by [`Bridge::enter`](crate::Bridge::enter). Guards nest and must be
/// dropped on the thread that created them, in reverse order.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard {
    runtime: RuntimeId,
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    pub(crate) fn enter(runtime: RuntimeId) -> Self {
        ENTERED.with(|stack| stack.borrow_mut().push(runtime));
        tracing::trace!(%runtime, "entered runtime context");
        Self {
            runtime,
            _not_send: PhantomData,
        }
    }

    /// The runtime this guard established.
    pub fn runtime(&self) -> RuntimeId {
        self.runtime
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ENTERED.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|id| *id == self.runtime) {
                stack.remove(pos);
            }
        });
        tracing::trace!(runtime = %self.runtime, "left runtime context");
    }
}

/// Saves the ambient error slot for the duration of one invocation.
///
/// The slot is cleared on entry, receives the fault if the callable raises,
/// and gets its saved value back when the guard drops, on every exit path.
/// Nested invocations nest their guards, so saves and restores pair up in
/// strict LIFO order.
pub(crate) struct ErrorSlotGuard<'a> {
    slot: &'a Mutex<Option<Fault>>,
    saved: Option<Fault>,
}

impl<'a> ErrorSlotGuard<'a> {
    pub(crate) fn save(slot: &'a Mutex<Option<Fault>>) -> Self {
        let saved = slot.lock().take();
        Self { slot, saved }
    }

    /// Record a raised fault in the slot, as the dynamic runtime would.
    pub(crate) fn raise(&self, fault: &Fault) {
        *self.slot.lock() = Some(fault.clone());
    }
}

impl Drop for ErrorSlotGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = self.saved.take();
    }
}
