//! Native type registry for objbridge.
//!
//! This crate holds the [`TypeRegistry`] and the per-type
//! [`WrapperStrategy`] tables it hands out to the value converter.

mod domain;
mod enums;
mod registry;
mod strategy;

pub use domain::{ErrorDomain, ErrorRecord};
pub use enums::{EnumClass, EnumValue, FlagsClass};
pub use registry::{SinkFn, TypeInfo, TypeRegistry, global};
pub use strategy::{
    BoxedStrategy, BuiltinFundamental, ByteCopyStrategy, FundamentalStrategy, WrapperStrategy,
};
