//! Native error domains.
//!
//! Native code reports failures as error records: a domain string, a numeric
//! code and a message. Registering a domain ties it to an enum type (whose
//! nicks name the codes) and to the package of the exception class the
//! dynamic side raises for it.

use std::sync::Arc;

use objbridge_core::NativeTypeId;

/// A native error record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub domain: String,
    pub code: i32,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(domain: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }
}

/// A registered error domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDomain {
    /// The native domain string.
    pub domain: String,
    /// Enum type naming the codes of the domain.
    pub error_enum: NativeTypeId,
    /// Package of the exception class raised for this domain.
    pub package: Arc<str>,
}
