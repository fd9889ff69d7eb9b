//! Bridge configuration.

use std::sync::Arc;

use objbridge_core::NativeObjects;
use objbridge_registry::TypeRegistry;

use crate::{Bridge, ExceptionRelay};

/// Default cap on queued deferred failures.
pub const DEFAULT_MAX_PENDING_FAULTS: usize = 1024;

/// Tunables of a [`Bridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Wrap objects of unregistered types as their nearest registered ancestor.
    pub subclass_fallback: bool,
    /// Log a warning the first time each type takes the fallback.
    pub warn_on_fallback: bool,
    /// Queued failures beyond this count drop the oldest (reported, not lost
    /// silently). `None` means unbounded.
    pub max_pending_faults: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            subclass_fallback: true,
            warn_on_fallback: true,
            max_pending_faults: Some(DEFAULT_MAX_PENDING_FAULTS),
        }
    }
}

/// Builder for a [`Bridge`].
///
/// ```
/// use std::sync::Arc;
/// use objbridge::{Bridge, ObjectHeap, TypeRegistry};
///
/// let bridge = Bridge::builder(Arc::new(ObjectHeap::new()))
///     .registry(Arc::new(TypeRegistry::with_fundamentals()))
///     .warn_on_fallback(false)
///     .build();
/// assert_eq!(bridge.pending_faults(), 0);
/// ```
pub struct BridgeBuilder {
    native: Arc<dyn NativeObjects>,
    registry: Option<Arc<TypeRegistry>>,
    relay: Option<Arc<ExceptionRelay>>,
    config: BridgeConfig,
}

impl BridgeBuilder {
    pub fn new(native: Arc<dyn NativeObjects>) -> Self {
        Self {
            native,
            registry: None,
            relay: None,
            config: BridgeConfig::default(),
        }
    }

    /// Use a specific registry instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an exception relay with other bridges.
    pub fn relay(mut self, relay: Arc<ExceptionRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn subclass_fallback(mut self, enabled: bool) -> Self {
        self.config.subclass_fallback = enabled;
        self
    }

    pub fn warn_on_fallback(mut self, enabled: bool) -> Self {
        self.config.warn_on_fallback = enabled;
        self
    }

    pub fn max_pending_faults(mut self, limit: Option<usize>) -> Self {
        self.config.max_pending_faults = limit;
        self
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Bridge {
        let registry = self.registry.unwrap_or_else(objbridge_registry::global);
        let relay = self.relay.unwrap_or_else(|| {
            Arc::new(ExceptionRelay::with_limit(self.config.max_pending_faults))
        });
        Bridge::from_parts(self.native, registry, relay, self.config)
    }
}
