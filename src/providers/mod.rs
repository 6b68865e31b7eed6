//! Provider implementations

pub mod dump;
pub mod radio;

pub use dump::DumpProvider;
pub use radio::RadioProvider;
