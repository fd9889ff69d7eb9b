//! Failures raised by dynamic callables.

use std::fmt;

/// A failure raised inside a dynamic-language callable.
///
/// This is what the dynamic runtime would put in its ambient error channel:
/// a message plus, for structured exceptions, the package of the exception
/// class. Faults mirrored from native error records also carry the error
/// domain and the symbolic error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Human-readable failure message.
    pub message: String,
    /// Package of the exception class, if the failure is structured.
    pub package: Option<String>,
    /// Native error domain, for faults mirrored from native errors.
    pub domain: Option<String>,
    /// Symbolic error code within the domain.
    pub code: Option<String>,
}

impl Fault {
    /// Create a plain message fault.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            package: None,
            domain: None,
            code: None,
        }
    }

    /// Attach an exception class package.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Attach a native error domain and symbolic code.
    pub fn with_code(mut self, domain: impl Into<String>, code: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{package}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Fault::new(message)
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Fault::new(message)
    }
}
