//! Custom Resource Definitions.

mod qos;

pub use qos::*;
