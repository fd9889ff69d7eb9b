//! Enum and flags value tables.
//!
//! Enumerations cross the bridge as symbolic names. Each declared value has a
//! full `name` and a short `nick`; conversion to a handle yields the nick,
//! conversion from a handle accepts either, matched exactly.

use rustc_hash::FxHashSet;

use objbridge_core::{ConversionError, Handle, RegistrationError, Scalar};

/// One declared value of an enum or flags type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue<V> {
    pub value: V,
    pub name: String,
    pub nick: String,
}

impl<V> EnumValue<V> {
    pub fn new(value: V, name: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            value,
            name: name.into(),
            nick: nick.into(),
        }
    }

    fn matches(&self, symbol: &str) -> bool {
        self.nick == symbol || self.name == symbol
    }
}

fn check_unique<V>(type_name: &str, values: &[EnumValue<V>]) -> Result<(), RegistrationError> {
    let mut seen = FxHashSet::default();
    for value in values {
        // A value may use the same text for its name and nick
        let mut symbols = vec![value.name.as_str()];
        if value.nick != value.name {
            symbols.push(value.nick.as_str());
        }
        for symbol in symbols {
            if !seen.insert(symbol) {
                return Err(RegistrationError::DuplicateEnumerator {
                    type_name: type_name.to_string(),
                    name: symbol.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Value table of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumClass {
    type_name: String,
    values: Vec<EnumValue<i32>>,
}

impl EnumClass {
    /// Build a table, rejecting repeated names or nicks.
    pub fn new(
        type_name: impl Into<String>,
        values: Vec<EnumValue<i32>>,
    ) -> Result<Self, RegistrationError> {
        let type_name = type_name.into();
        check_unique(&type_name, &values)?;
        Ok(Self { type_name, values })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn values(&self) -> &[EnumValue<i32>] {
        &self.values
    }

    /// Find a declared value by name or nick.
    pub fn lookup(&self, symbol: &str) -> Option<&EnumValue<i32>> {
        self.values.iter().find(|v| v.matches(symbol))
    }

    /// Find a declared value by its native value.
    pub fn by_value(&self, value: i32) -> Option<&EnumValue<i32>> {
        self.values.iter().find(|v| v.value == value)
    }

    /// Convert a native value to its nick.
    pub fn to_handle(&self, value: i32) -> Result<Handle, ConversionError> {
        self.by_value(value)
            .map(|v| Handle::str(v.nick.as_str()))
            .ok_or_else(|| ConversionError::UnknownEnumerator {
                type_name: self.type_name.clone(),
                name: value.to_string(),
            })
    }

    /// Convert a symbolic name to its native value.
    pub fn from_handle(&self, handle: &Handle) -> Result<i32, ConversionError> {
        let Handle::Scalar(Scalar::Str(symbol)) = handle else {
            return Err(ConversionError::mismatch(
                format!("enum '{}'", self.type_name),
                handle.type_name(),
            ));
        };
        self.lookup(symbol)
            .map(|v| v.value)
            .ok_or_else(|| ConversionError::UnknownEnumerator {
                type_name: self.type_name.clone(),
                name: symbol.clone(),
            })
    }
}

/// Value table of a flags (bit set) type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagsClass {
    type_name: String,
    values: Vec<EnumValue<u32>>,
}

impl FlagsClass {
    /// Build a table, rejecting repeated names or nicks.
    pub fn new(
        type_name: impl Into<String>,
        values: Vec<EnumValue<u32>>,
    ) -> Result<Self, RegistrationError> {
        let type_name = type_name.into();
        check_unique(&type_name, &values)?;
        Ok(Self { type_name, values })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn values(&self) -> &[EnumValue<u32>] {
        &self.values
    }

    /// Find a declared flag by name or nick.
    pub fn lookup(&self, symbol: &str) -> Option<&EnumValue<u32>> {
        self.values.iter().find(|v| v.matches(symbol))
    }

    /// Convert a bit set to the nicks of the flags it contains.
    ///
    /// Flags are taken in declared order; every flag whose bits are all set
    /// is emitted, so overlapping masks each appear. Bits no declared flag
    /// covers are an error.
    pub fn to_handle(&self, bits: u32) -> Result<Handle, ConversionError> {
        let mut covered = 0u32;
        let mut names = Vec::new();
        for flag in &self.values {
            if flag.value != 0 && bits & flag.value == flag.value {
                names.push(flag.nick.clone());
                covered |= flag.value;
            }
        }
        let rest = bits & !covered;
        if rest != 0 {
            return Err(ConversionError::UnknownEnumerator {
                type_name: self.type_name.clone(),
                name: format!("{rest:#x}"),
            });
        }
        Ok(Handle::Scalar(Scalar::Names(names)))
    }

    /// Combine a name or set of names into a bit set.
    ///
    /// One unknown name fails the whole conversion.
    pub fn from_handle(&self, handle: &Handle) -> Result<u32, ConversionError> {
        let symbols: &[String] = match handle {
            Handle::Scalar(Scalar::Str(symbol)) => std::slice::from_ref(symbol),
            Handle::Scalar(Scalar::Names(names)) => names,
            other => {
                return Err(ConversionError::mismatch(
                    format!("flags '{}'", self.type_name),
                    other.type_name(),
                ));
            }
        };
        symbols.iter().try_fold(0u32, |bits, symbol| {
            self.lookup(symbol)
                .map(|flag| bits | flag.value)
                .ok_or_else(|| ConversionError::UnknownEnumerator {
                    type_name: self.type_name.clone(),
                    name: symbol.clone(),
                })
        })
    }
}
