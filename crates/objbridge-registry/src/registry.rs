//! TypeRegistry - process-wide native type to package mapping.
//!
//! This module provides [`TypeRegistry`], the table every conversion consults
//! to find out how a native type crosses the bridge: its classification, the
//! dynamic package it is exposed under, and the strategy that converts it.
//!
//! # Storage Model
//!
//! - **Types**: one entry per canonical [`NativeTypeId`], holding the primary
//!   package, classification and strategy.
//! - **Packages**: package name -> type, including alias packages. Aliases
//!   resolve to their type but are never returned by `lookup_package`.
//! - **Synonyms**: secondary type ids that resolve to a canonical type and
//!   share its registration entirely.
//! - **Sink functions** and **error domains**, consulted by the object
//!   wrapper and the error mirror respectively.
//!
//! # Thread Safety
//!
//! All state sits behind one coarse `RwLock`. Registration normally happens
//! in a startup phase, after which the table is effectively read-only.
//!
//! # Example
//!
//! ```
//! use objbridge_core::{Classification, NativeTypeId};
//! use objbridge_registry::TypeRegistry;
//!
//! let registry = TypeRegistry::with_fundamentals();
//! let button = registry
//!     .register("Button", "Ui::Button", Classification::Object, None)
//!     .unwrap();
//! assert_eq!(registry.lookup_type("Ui::Button").unwrap(), button);
//! assert_eq!(&*registry.lookup_package(button).unwrap(), "Ui::Button");
//! assert!(registry.lookup_type("Ui::Missing").is_err());
//! ```

use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use objbridge_core::{
    Classification, ConversionError, Fault, NativeObjects, NativeTypeId, ObjectId,
    RegistrationError,
};

use crate::{
    BuiltinFundamental, EnumClass, EnumValue, ErrorDomain, ErrorRecord, FlagsClass,
    WrapperStrategy,
};

/// Function run on the first owned wrap of an object to normalise a
/// floating reference.
pub type SinkFn = Arc<dyn Fn(&dyn NativeObjects, ObjectId) + Send + Sync>;

/// Snapshot of a registration, as returned by [`TypeRegistry::resolve`].
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Canonical type id (synonyms resolve to their target).
    pub type_id: NativeTypeId,
    pub type_name: Arc<str>,
    /// Primary package.
    pub package: Arc<str>,
    pub classification: Classification,
    pub strategy: Option<WrapperStrategy>,
}

struct TypeEntry {
    type_name: Arc<str>,
    package: Arc<str>,
    classification: Classification,
    strategy: Option<WrapperStrategy>,
}

impl TypeEntry {
    fn describe(&self) -> String {
        format!("{} '{}'", self.classification, self.package)
    }

    fn enum_class(&self) -> Option<&Arc<EnumClass>> {
        match &self.strategy {
            Some(WrapperStrategy::Enum(class)) => Some(class),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PackageEntry {
    type_id: NativeTypeId,
    alias: bool,
}

#[derive(Default)]
struct RegistryInner {
    types: FxHashMap<NativeTypeId, TypeEntry>,
    packages: FxHashMap<String, PackageEntry>,
    synonyms: FxHashMap<NativeTypeId, NativeTypeId>,
    sinks: Vec<(NativeTypeId, SinkFn)>,
    domains: FxHashMap<String, ErrorDomain>,
}

impl RegistryInner {
    fn canonical(&self, id: NativeTypeId) -> NativeTypeId {
        self.synonyms.get(&id).copied().unwrap_or(id)
    }

    fn entry(&self, id: NativeTypeId) -> Option<&TypeEntry> {
        self.types.get(&self.canonical(id))
    }

    fn enum_class(&self, id: NativeTypeId) -> Option<&Arc<EnumClass>> {
        self.entry(id).and_then(TypeEntry::enum_class)
    }

    fn describe_package(&self, entry: PackageEntry) -> String {
        let target = self
            .types
            .get(&entry.type_id)
            .map(|t| t.type_name.to_string())
            .unwrap_or_else(|| entry.type_id.to_string());
        if entry.alias {
            format!("alias of '{target}'")
        } else {
            format!("package of '{target}'")
        }
    }
}

/// Process-wide type registry.
#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

static GLOBAL: LazyLock<Arc<TypeRegistry>> =
    LazyLock::new(|| Arc::new(TypeRegistry::with_fundamentals()));

/// The process-wide registry, with the built-in fundamentals registered.
pub fn global() -> Arc<TypeRegistry> {
    Arc::clone(&GLOBAL)
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in fundamentals pre-registered.
    ///
    /// Each fundamental is exposed under its own native name.
    pub fn with_fundamentals() -> Self {
        let registry = Self::new();
        {
            let mut inner = registry.inner.write();
            for fundamental in BuiltinFundamental::ALL {
                let name: Arc<str> = Arc::from(fundamental.name());
                inner.types.insert(
                    fundamental.type_id(),
                    TypeEntry {
                        type_name: Arc::clone(&name),
                        package: Arc::clone(&name),
                        classification: Classification::Fundamental,
                        strategy: Some(WrapperStrategy::fundamental(fundamental)),
                    },
                );
                inner.packages.insert(
                    name.to_string(),
                    PackageEntry {
                        type_id: fundamental.type_id(),
                        alias: false,
                    },
                );
            }
        }
        registry
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a native type under a package.
    ///
    /// Fails with `DuplicateRegistration` if the package is taken or if the
    /// type is already registered under a different classification.
    /// Registering an already-registered type under a new package with the
    /// same classification makes the new package its primary one.
    ///
    /// Without a strategy, fundamentals fall back to the built-in strategy of
    /// the same name and boxed types to byte-copying; enums and flags need
    /// their value tables.
    pub fn register(
        &self,
        type_name: &str,
        package: &str,
        classification: Classification,
        strategy: Option<WrapperStrategy>,
    ) -> Result<NativeTypeId, RegistrationError> {
        let requested = NativeTypeId::from_name(type_name);
        let supplied = strategy.is_some();
        let strategy = check_strategy(type_name, requested, classification, strategy)?;

        let mut inner = self.inner.write();
        let type_id = inner.canonical(requested);

        if let Some(existing) = inner.packages.get(package).copied() {
            return Err(RegistrationError::DuplicateRegistration {
                type_name: type_name.to_string(),
                package: package.to_string(),
                existing: inner.describe_package(existing),
            });
        }

        let package: Arc<str> = Arc::from(package);
        match inner.types.get_mut(&type_id) {
            Some(entry) if entry.classification != classification => {
                return Err(RegistrationError::DuplicateRegistration {
                    type_name: type_name.to_string(),
                    package: package.to_string(),
                    existing: entry.describe(),
                });
            }
            Some(entry) => {
                tracing::debug!(
                    type_name,
                    from = %entry.package,
                    to = %package,
                    "re-pointing primary package"
                );
                entry.package = Arc::clone(&package);
                if supplied {
                    entry.strategy = strategy;
                }
            }
            None => {
                tracing::debug!(type_name, %package, %classification, "registering type");
                inner.types.insert(
                    type_id,
                    TypeEntry {
                        type_name: Arc::from(type_name),
                        package: Arc::clone(&package),
                        classification,
                        strategy,
                    },
                );
            }
        }
        inner.packages.insert(
            package.to_string(),
            PackageEntry {
                type_id,
                alias: false,
            },
        );
        Ok(type_id)
    }

    /// Register a type with a strategy, deriving the classification from it.
    pub fn register_strategy(
        &self,
        type_name: &str,
        package: &str,
        strategy: WrapperStrategy,
    ) -> Result<NativeTypeId, RegistrationError> {
        let classification = match &strategy {
            WrapperStrategy::Fundamental(_) => Classification::Fundamental,
            WrapperStrategy::Boxed(_) => Classification::Boxed,
            WrapperStrategy::Enum(_) => Classification::Enum,
            WrapperStrategy::Flags(_) => Classification::Flags,
        };
        self.register(type_name, package, classification, Some(strategy))
    }

    /// Register an enum type with its value table.
    pub fn register_enum(
        &self,
        type_name: &str,
        package: &str,
        values: Vec<EnumValue<i32>>,
    ) -> Result<NativeTypeId, RegistrationError> {
        let class = EnumClass::new(type_name, values)?;
        self.register_strategy(type_name, package, WrapperStrategy::Enum(Arc::new(class)))
    }

    /// Register a flags type with its value table.
    pub fn register_flags(
        &self,
        type_name: &str,
        package: &str,
        values: Vec<EnumValue<u32>>,
    ) -> Result<NativeTypeId, RegistrationError> {
        let class = FlagsClass::new(type_name, values)?;
        self.register_strategy(type_name, package, WrapperStrategy::Flags(Arc::new(class)))
    }

    /// Add an alias package resolving to an already-registered type.
    pub fn register_alias(&self, type_name: &str, alias: &str) -> Result<(), RegistrationError> {
        let mut inner = self.inner.write();
        let type_id = inner.canonical(NativeTypeId::from_name(type_name));
        if !inner.types.contains_key(&type_id) {
            return Err(RegistrationError::UnknownMapping(format!("type '{type_name}'")));
        }
        if let Some(existing) = inner.packages.get(alias).copied() {
            return Err(RegistrationError::DuplicateRegistration {
                type_name: type_name.to_string(),
                package: alias.to_string(),
                existing: inner.describe_package(existing),
            });
        }
        tracing::debug!(type_name, alias, "registering alias");
        inner.packages.insert(
            alias.to_string(),
            PackageEntry {
                type_id,
                alias: true,
            },
        );
        Ok(())
    }

    /// Make `synonym` resolve exactly like the registered type `type_name`.
    pub fn register_synonym(&self, type_name: &str, synonym: &str) -> Result<(), RegistrationError> {
        let mut inner = self.inner.write();
        let target = inner.canonical(NativeTypeId::from_name(type_name));
        let synonym_id = NativeTypeId::from_name(synonym);
        let Some(entry) = inner.types.get(&target) else {
            return Err(RegistrationError::UnknownMapping(format!("type '{type_name}'")));
        };
        if synonym_id == target {
            return Ok(());
        }
        if let Some(existing) = inner.entry(synonym_id) {
            return Err(RegistrationError::DuplicateRegistration {
                type_name: synonym.to_string(),
                package: entry.package.to_string(),
                existing: existing.describe(),
            });
        }
        tracing::debug!(type_name, synonym, "registering synonym");
        inner.synonyms.insert(synonym_id, target);
        Ok(())
    }

    /// Register a sink function for a type and its subtypes.
    ///
    /// When several registered types match, the first registered wins.
    pub fn register_sink_func<F>(&self, type_name: &str, sink: F)
    where
        F: Fn(&dyn NativeObjects, ObjectId) + Send + Sync + 'static,
    {
        let type_id = NativeTypeId::from_name(type_name);
        tracing::debug!(type_name, "registering sink function");
        self.inner.write().sinks.push((type_id, Arc::new(sink)));
    }

    /// Map a native error domain to a registered enum type and an exception
    /// package.
    pub fn register_error_domain(
        &self,
        domain: &str,
        enum_type: &str,
        package: &str,
    ) -> Result<(), RegistrationError> {
        let mut inner = self.inner.write();
        let enum_id = inner.canonical(NativeTypeId::from_name(enum_type));
        if inner.enum_class(enum_id).is_none() {
            return Err(RegistrationError::UnknownMapping(format!(
                "enum type '{enum_type}'"
            )));
        }
        if let Some(existing) = inner.domains.get(domain) {
            return Err(RegistrationError::DuplicateRegistration {
                type_name: enum_type.to_string(),
                package: package.to_string(),
                existing: format!("error domain '{}'", existing.domain),
            });
        }
        tracing::debug!(domain, enum_type, package, "registering error domain");
        inner.domains.insert(
            domain.to_string(),
            ErrorDomain {
                domain: domain.to_string(),
                error_enum: enum_id,
                package: Arc::from(package),
            },
        );
        Ok(())
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Type registered under a package (aliases included).
    pub fn lookup_type(&self, package: &str) -> Result<NativeTypeId, RegistrationError> {
        self.inner
            .read()
            .packages
            .get(package)
            .map(|entry| entry.type_id)
            .ok_or_else(|| RegistrationError::UnknownMapping(format!("package '{package}'")))
    }

    /// Primary package of a type. Never an alias.
    pub fn lookup_package(&self, ty: NativeTypeId) -> Result<Arc<str>, RegistrationError> {
        self.inner
            .read()
            .entry(ty)
            .map(|entry| Arc::clone(&entry.package))
            .ok_or_else(|| RegistrationError::UnknownMapping(format!("type {ty}")))
    }

    /// Like [`lookup_type`](Self::lookup_type), restricted to one classification.
    pub fn lookup_type_in(
        &self,
        classification: Classification,
        package: &str,
    ) -> Result<NativeTypeId, RegistrationError> {
        let inner = self.inner.read();
        inner
            .packages
            .get(package)
            .filter(|p| {
                inner
                    .types
                    .get(&p.type_id)
                    .is_some_and(|t| t.classification == classification)
            })
            .map(|p| p.type_id)
            .ok_or_else(|| {
                RegistrationError::UnknownMapping(format!("{classification} package '{package}'"))
            })
    }

    /// Like [`lookup_package`](Self::lookup_package), restricted to one
    /// classification.
    pub fn lookup_package_in(
        &self,
        classification: Classification,
        ty: NativeTypeId,
    ) -> Result<Arc<str>, RegistrationError> {
        self.inner
            .read()
            .entry(ty)
            .filter(|entry| entry.classification == classification)
            .map(|entry| Arc::clone(&entry.package))
            .ok_or_else(|| RegistrationError::UnknownMapping(format!("{classification} type {ty}")))
    }

    /// Full registration of a type, following synonyms.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(&self, ty: NativeTypeId) -> Option<TypeInfo> {
        let inner = self.inner.read();
        let type_id = inner.canonical(ty);
        inner.types.get(&type_id).map(|entry| TypeInfo {
            type_id,
            type_name: Arc::clone(&entry.type_name),
            package: Arc::clone(&entry.package),
            classification: entry.classification,
            strategy: entry.strategy.clone(),
        })
    }

    /// Whether two type ids resolve to the same registration.
    pub fn same_type(&self, a: NativeTypeId, b: NativeTypeId) -> bool {
        let inner = self.inner.read();
        inner.canonical(a) == inner.canonical(b)
    }

    /// Check if a type (or synonym) is registered.
    pub fn is_registered(&self, ty: NativeTypeId) -> bool {
        self.inner.read().entry(ty).is_some()
    }

    /// Registered name of a type.
    pub fn type_name(&self, ty: NativeTypeId) -> Option<Arc<str>> {
        self.inner
            .read()
            .entry(ty)
            .map(|entry| Arc::clone(&entry.type_name))
    }

    /// Number of registered types, synonyms not counted.
    pub fn type_count(&self) -> usize {
        self.inner.read().types.len()
    }

    /// Sink function for an object of type `ty`, if one applies.
    pub fn sink_for(&self, native: &dyn NativeObjects, ty: NativeTypeId) -> Option<SinkFn> {
        let sinks = self.inner.read().sinks.clone();
        sinks
            .into_iter()
            .find(|(sink_ty, _)| native.is_a(ty, *sink_ty))
            .map(|(_, sink)| sink)
    }

    /// Registered error domain by name.
    pub fn error_domain(&self, domain: &str) -> Option<ErrorDomain> {
        self.inner.read().domains.get(domain).cloned()
    }

    // ==========================================================================
    // Error mirroring
    // ==========================================================================

    /// Mirror a native error record as a fault.
    ///
    /// Registered domains give the fault their exception package and name
    /// the code by its enum nick. Codes without an enumerator, and records of
    /// unregistered domains, keep the numeric code.
    pub fn fault_from_error(&self, record: &ErrorRecord) -> Fault {
        let inner = self.inner.read();
        let Some(domain) = inner.domains.get(&record.domain) else {
            return Fault::new(record.message.as_str())
                .with_code(record.domain.as_str(), record.code.to_string());
        };
        let code = inner
            .enum_class(domain.error_enum)
            .and_then(|class| class.by_value(record.code))
            .map(|value| value.nick.clone())
            .unwrap_or_else(|| record.code.to_string());
        Fault::new(record.message.as_str())
            .with_package(&*domain.package)
            .with_code(domain.domain.as_str(), code)
    }

    /// Convert a fault carrying a domain and code back to a native record.
    pub fn error_from_fault(&self, fault: &Fault) -> Result<ErrorRecord, ConversionError> {
        let (Some(domain), Some(code)) = (&fault.domain, &fault.code) else {
            return Err(ConversionError::mismatch("error record", "plain fault"));
        };
        let inner = self.inner.read();
        let known = inner
            .domains
            .get(domain)
            .and_then(|d| inner.enum_class(d.error_enum))
            .and_then(|class| class.lookup(code))
            .map(|value| value.value);
        let value = match known {
            Some(value) => value,
            None => code
                .parse::<i32>()
                .map_err(|_| ConversionError::UnknownEnumerator {
                    type_name: domain.clone(),
                    name: code.clone(),
                })?,
        };
        Ok(ErrorRecord::new(domain.as_str(), value, fault.message.as_str()))
    }
}

fn check_strategy(
    type_name: &str,
    type_id: NativeTypeId,
    classification: Classification,
    strategy: Option<WrapperStrategy>,
) -> Result<Option<WrapperStrategy>, RegistrationError> {
    let mismatch = |strategy: &WrapperStrategy| RegistrationError::StrategyMismatch {
        type_name: type_name.to_string(),
        classification: classification.as_str(),
        strategy: strategy.kind(),
    };
    let missing = || RegistrationError::MissingStrategy {
        type_name: type_name.to_string(),
        classification: classification.as_str(),
    };

    match (classification, strategy) {
        (Classification::Fundamental, Some(s @ WrapperStrategy::Fundamental(_)))
        | (Classification::Boxed, Some(s @ WrapperStrategy::Boxed(_)))
        | (Classification::Enum, Some(s @ WrapperStrategy::Enum(_)))
        | (Classification::Flags, Some(s @ WrapperStrategy::Flags(_))) => Ok(Some(s)),
        (Classification::Fundamental, None) => BuiltinFundamental::from_type_id(type_id)
            .map(|f| Some(WrapperStrategy::fundamental(f)))
            .ok_or_else(missing),
        (Classification::Boxed, None) => Ok(Some(WrapperStrategy::byte_copy())),
        (Classification::Enum | Classification::Flags, None) => Err(missing()),
        (
            Classification::Object | Classification::ParamSpec | Classification::Variant,
            None,
        ) => Ok(None),
        (_, Some(s)) => Err(mismatch(&s)),
    }
}
