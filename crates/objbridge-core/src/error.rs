//! Unified error types for the bridge.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BridgeError (top-level wrapper)
//! ├── RegistrationError - type registry setup errors (programmer errors)
//! ├── ConversionError   - per-value conversion errors
//! ├── InvocationError   - closure and callback invocation errors
//! ├── NativeError       - failures reported by the native object system
//! └── HandlerFailures   - relay handlers that failed while draining
//! ```
//!
//! Failures raised by dynamic callables are not errors of this hierarchy;
//! they are [`Fault`]s. A fault only becomes a `BridgeError` when it is
//! returned synchronously (one-shot callbacks) or when a relay handler fails.

use thiserror::Error;

use crate::{Fault, HandlerId, NativeTypeId, ObjectId, RuntimeId};

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors that occur while populating the type registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The `(type, package)` pair is already registered, or the type is
    /// already registered under a different classification.
    #[error("duplicate registration: {type_name} as '{package}' conflicts with {existing}")]
    DuplicateRegistration {
        /// The native type name.
        type_name: String,
        /// The package of the rejected registration.
        package: String,
        /// Description of the registration that is already present.
        existing: String,
    },

    /// No registration exists for a package or type.
    #[error("no mapping registered for {0}")]
    UnknownMapping(String),

    /// The classification requires a strategy and none was supplied.
    #[error("type '{type_name}' registered as {classification} requires a strategy")]
    MissingStrategy {
        /// The native type name.
        type_name: String,
        /// The classification being registered.
        classification: &'static str,
    },

    /// The supplied strategy does not fit the classification.
    #[error("type '{type_name}': {strategy} strategy cannot serve a {classification} type")]
    StrategyMismatch {
        /// The native type name.
        type_name: String,
        /// The classification being registered.
        classification: &'static str,
        /// The kind of strategy supplied.
        strategy: &'static str,
    },

    /// Two enumerators or flags of one type share a name or nick.
    #[error("duplicate enumerator '{name}' in '{type_name}'")]
    DuplicateEnumerator {
        /// The enum or flags type name.
        type_name: String,
        /// The duplicated name.
        name: String,
    },
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors that occur while converting a single value across the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The type has no registration and no conversion path.
    #[error("type '{type_name}' is not convertible: no registration found")]
    UnconvertibleType {
        /// The type name, or its identifier when the name is unknown.
        type_name: String,
    },

    /// The handle does not hold a value of the expected type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The actual type.
        actual: String,
    },

    /// A symbolic name or native value has no matching enumerator.
    #[error("unknown enumerator '{name}' for '{type_name}'")]
    UnknownEnumerator {
        /// The enum or flags type name.
        type_name: String,
        /// The offending name or value.
        name: String,
    },

    /// An integer value does not fit the target type.
    #[error("integer overflow: {value} doesn't fit in {target_type}")]
    IntegerOverflow {
        /// The value that overflowed.
        value: String,
        /// The target type.
        target_type: &'static str,
    },
}

impl ConversionError {
    /// Shorthand for a `TypeMismatch`.
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        ConversionError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

// ============================================================================
// Invocation Errors
// ============================================================================

/// Where a marshal failure happened during an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarshalSite {
    /// Converting the native argument at this position.
    Argument(usize),
    /// Converting the dynamic return value back to native.
    Return,
}

impl std::fmt::Display for MarshalSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarshalSite::Argument(index) => write!(f, "argument {index}"),
            MarshalSite::Return => f.write_str("return value"),
        }
    }
}

/// Errors that occur while invoking a closure or one-shot callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// Argument or result conversion failed; the native caller sees this
    /// synchronously.
    #[error("marshal failure at {site}: {source}")]
    MarshalFailure {
        /// Which value failed to convert.
        site: MarshalSite,
        /// The underlying failure.
        #[source]
        source: Box<BridgeError>,
    },

    /// The invocation happened outside the runtime context that owns it.
    #[error("wrong runtime context: expected {expected}, current {}", current.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    WrongContext {
        /// The runtime that owns the closure or callback.
        expected: RuntimeId,
        /// The runtime established on the calling thread, if any.
        current: Option<RuntimeId>,
    },

    /// The native caller passed the wrong number of arguments.
    #[error("expected {expected} argument(s), got {got}")]
    ArgumentCount {
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },

    /// A one-shot callback raised a failure.
    #[error("callback raised: {0}")]
    Raised(Fault),
}

// ============================================================================
// Native Errors
// ============================================================================

/// Failures reported by the native object system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// The object has been finalized.
    #[error("stale object: {0} has been finalized")]
    StaleObject(ObjectId),

    /// The type is not known to the native type system.
    #[error("unknown native type {0}")]
    UnknownType(NativeTypeId),

    /// A native type with this name already exists.
    #[error("native type '{0}' already defined")]
    DuplicateType(String),

    /// The object's type does not define the signal.
    #[error("type '{type_name}' has no signal '{signal}'")]
    UnknownSignal {
        /// The instance type name.
        type_name: String,
        /// The signal name.
        signal: String,
    },

    /// A signal was defined twice on one type.
    #[error("signal '{signal}' already defined on '{type_name}'")]
    DuplicateSignal {
        /// The type name.
        type_name: String,
        /// The signal name.
        signal: String,
    },

    /// The handler is not connected to the object.
    #[error("no handler {0} connected")]
    UnknownHandler(HandlerId),

    /// An emission supplied the wrong number of arguments.
    #[error("signal '{signal}' takes {expected} argument(s), got {got}")]
    SignalArity {
        /// The signal name.
        signal: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },

    /// Native code left an argument vector in an inconsistent state.
    #[error("argument vector corrupted: {0}")]
    ArgvCorrupted(String),
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// The unified error type for all bridge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// A registration error.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A conversion error.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// An invocation error.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// A native object system error.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// Relay handlers failed while draining deferred faults.
    #[error("{} exception handler(s) failed", .0.len())]
    HandlerFailures(Vec<Fault>),
}

impl BridgeError {
    /// Whether this error indicates a broken setup rather than bad data.
    ///
    /// Fatal errors are still returned as `Err`; embedders that want the
    /// fatal-by-default behaviour abort on them.
    pub fn is_fatal(&self) -> bool {
        match self {
            BridgeError::Registration(_) => true,
            BridgeError::Conversion(ConversionError::UnconvertibleType { .. }) => true,
            BridgeError::Invocation(InvocationError::WrongContext { .. }) => true,
            BridgeError::Invocation(InvocationError::MarshalFailure { source, .. }) => {
                source.is_fatal()
            }
            _ => false,
        }
    }

    /// Check if this is a registration error.
    pub fn is_registration(&self) -> bool {
        matches!(self, BridgeError::Registration(_))
    }

    /// Check if this is a conversion error.
    pub fn is_conversion(&self) -> bool {
        matches!(self, BridgeError::Conversion(_))
    }

    /// Check if this is a marshal failure.
    pub fn is_marshal_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::Invocation(InvocationError::MarshalFailure { .. })
        )
    }

    /// Wrap this error as a marshal failure at `site`.
    pub fn at(self, site: MarshalSite) -> BridgeError {
        InvocationError::MarshalFailure {
            site,
            source: Box::new(self),
        }
        .into()
    }
}

/// Result alias used throughout the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_error_display() {
        let err = RegistrationError::DuplicateRegistration {
            type_name: "Widget".to_string(),
            package: "Ui::Widget".to_string(),
            existing: "object 'Ui::Widget'".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "duplicate registration: Widget as 'Ui::Widget' conflicts with object 'Ui::Widget'"
        );
    }

    #[test]
    fn conversion_error_display() {
        let err = ConversionError::mismatch("int", "string");
        assert_eq!(format!("{err}"), "type mismatch: expected int, got string");
    }

    #[test]
    fn marshal_failure_display() {
        let err = BridgeError::from(ConversionError::mismatch("int", "undef"))
            .at(MarshalSite::Argument(2));
        assert!(err.is_marshal_failure());
        assert_eq!(
            format!("{err}"),
            "marshal failure at argument 2: type mismatch: expected int, got undef"
        );
    }

    #[test]
    fn fatal_classification() {
        let reg: BridgeError = RegistrationError::UnknownMapping("Foo".into()).into();
        assert!(reg.is_fatal());
        assert!(reg.is_registration());

        let unconvertible: BridgeError = ConversionError::UnconvertibleType {
            type_name: "Foo".into(),
        }
        .into();
        assert!(unconvertible.is_fatal());

        let mismatch: BridgeError = ConversionError::mismatch("a", "b").into();
        assert!(!mismatch.is_fatal());
        assert!(mismatch.is_conversion());

        let wrong: BridgeError = InvocationError::WrongContext {
            expected: RuntimeId::next(),
            current: None,
        }
        .into();
        assert!(wrong.is_fatal());
    }

    #[test]
    fn fatal_propagates_through_marshal_failure() {
        let err = BridgeError::from(ConversionError::UnconvertibleType {
            type_name: "Foo".into(),
        })
        .at(MarshalSite::Return);
        assert!(err.is_fatal());
    }

    #[test]
    fn transparent_display() {
        let err: BridgeError = NativeError::StaleObject(ObjectId::new(1, 0)).into();
        assert_eq!(format!("{err}"), "stale object: object#1.0 has been finalized");
    }

    #[test]
    fn wrong_context_display() {
        let expected = RuntimeId::next();
        let err = InvocationError::WrongContext {
            expected,
            current: None,
        };
        assert_eq!(
            format!("{err}"),
            format!("wrong runtime context: expected {expected}, current none")
        );
    }
}
