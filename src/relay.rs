//! Deferred failure relay.
//!
//! Failures raised by dynamic callables while native code is on the stack are
//! not allowed to unwind through native frames. The closure bridge captures
//! them here instead, and the embedding event loop drains the queue at a safe
//! point by calling [`ExceptionRelay::run_pending`].
//!
//! ## Ordering
//!
//! Failures are delivered in the order they were captured. Every installed
//! handler sees every failure (fan-out). A handler returning `Ok(false)` is
//! uninstalled; a handler returning `Err` stays installed and its failure is
//! reported through the `Err` of `run_pending`, never queued again.
//!
//! A drained failure no handler could take, because none is installed or
//! every one is already running further up the stack, is logged at error
//! level and dropped.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use objbridge_core::{BridgeError, BridgeResult, Fault, RuntimeId};

/// A failure waiting in the relay queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFault {
    /// The failure raised by the dynamic callable.
    pub fault: Fault,
    /// Where it was raised (closure or signal description).
    pub origin: String,
    /// The runtime instance whose callable raised it.
    pub runtime: RuntimeId,
    /// Capture order, increasing across the relay's lifetime.
    pub sequence: u64,
}

impl fmt::Display for CapturedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in {})", self.fault, self.origin)
    }
}

/// Tag identifying an installed relay handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelayHandlerId(u64);

type HandlerFn = dyn FnMut(&CapturedFault) -> Result<bool, Fault> + Send;

struct HandlerEntry {
    id: RelayHandlerId,
    handler: Arc<Mutex<Box<HandlerFn>>>,
}

/// FIFO mailbox of captured failures with fan-out handlers.
pub struct ExceptionRelay {
    queue: Mutex<VecDeque<CapturedFault>>,
    handlers: Mutex<Vec<HandlerEntry>>,
    max_pending: Option<usize>,
    next_handler: AtomicU64,
    next_sequence: AtomicU64,
}

impl ExceptionRelay {
    /// Create an unbounded relay.
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Create a relay that keeps at most `max_pending` failures queued.
    pub fn with_limit(max_pending: Option<usize>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handlers: Mutex::new(Vec::new()),
            max_pending,
            next_handler: AtomicU64::new(1),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Queue a failure. Returns its sequence number.
    pub fn capture(&self, fault: Fault, origin: impl Into<String>, runtime: RuntimeId) -> u64 {
        let captured = CapturedFault {
            fault,
            origin: origin.into(),
            runtime,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };
        let sequence = captured.sequence;
        tracing::debug!(%captured, sequence, "deferring callback failure");

        let dropped = {
            let mut queue = self.queue.lock();
            queue.push_back(captured);
            match self.max_pending {
                Some(max) if queue.len() > max => queue.pop_front(),
                _ => None,
            }
        };
        if let Some(dropped) = dropped {
            tracing::error!(
                fault = %dropped,
                sequence = dropped.sequence,
                "relay queue full, dropping oldest failure"
            );
        }
        sequence
    }

    /// Install a handler, invoked once per drained failure.
    pub fn install_handler<F>(&self, handler: F) -> RelayHandlerId
    where
        F: FnMut(&CapturedFault) -> Result<bool, Fault> + Send + 'static,
    {
        let id = RelayHandlerId(self.next_handler.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().push(HandlerEntry {
            id,
            handler: Arc::new(Mutex::new(Box::new(handler))),
        });
        id
    }

    /// Uninstall a handler. Returns `false` if it was not installed.
    pub fn remove_handler(&self, id: RelayHandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|entry| entry.id != id);
        handlers.len() != before
    }

    /// Number of failures waiting to be drained.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of installed handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Drain the queue in FIFO order, fanning each failure out to every
    /// installed handler.
    ///
    /// Returns the number of failures drained. Handlers may install or
    /// remove handlers, capture new failures (drained in the same run) and
    /// call `run_pending` again; a handler already running is not re-entered.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run_pending(&self) -> BridgeResult<usize> {
        let mut drained = 0;
        let mut failures = Vec::new();

        loop {
            let Some(captured) = self.queue.lock().pop_front() else {
                break;
            };
            drained += 1;

            let snapshot: Vec<(RelayHandlerId, Arc<Mutex<Box<HandlerFn>>>)> = self
                .handlers
                .lock()
                .iter()
                .map(|entry| (entry.id, Arc::clone(&entry.handler)))
                .collect();

            let mut handled = false;
            for (id, entry) in snapshot {
                let Some(mut handler) = entry.try_lock() else {
                    tracing::trace!(handler = id.0, "skipping running exception handler");
                    continue;
                };
                handled = true;
                match (*handler)(&captured) {
                    Ok(true) => {}
                    Ok(false) => {
                        drop(handler);
                        self.remove_handler(id);
                    }
                    Err(fault) => {
                        tracing::warn!(fault = %fault, "exception handler failed");
                        failures.push(fault);
                    }
                }
            }

            if !handled {
                tracing::error!(
                    fault = %captured.fault,
                    origin = %captured.origin,
                    runtime = %captured.runtime,
                    "unhandled exception in callback"
                );
            }
        }

        if failures.is_empty() {
            Ok(drained)
        } else {
            Err(BridgeError::HandlerFailures(failures))
        }
    }
}

impl Default for ExceptionRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExceptionRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionRelay")
            .field("pending", &self.pending())
            .field("handlers", &self.handler_count())
            .field("max_pending", &self.max_pending)
            .finish()
    }
}
