//! Core types for telemetry data representation.
//!
//! - [`FieldDefinition`] / [`FieldKind`] describe one schema entry
//! - [`RawField`] / [`RawPayload`] / [`Value`] hold decoded values before naming
//! - [`Packet`] is one decoded radio frame
//! - [`NamedRecord`] is the unit handed to display, storage and plotting code
//!
//! ```rust
//! use martha_ground::types::{NamedRecord, RawField, Value};
//!
//! let field = RawField::single(8, 123.45f32);
//! assert_eq!(field.value(), Some(Value::Float(123.45)));
//!
//! let mut record = NamedRecord::new(Some(1000));
//! record.insert("ALTITUDE", 123.45f32);
//! assert_eq!(record.get_f64("ALTITUDE").map(|v| v as f32), Some(123.45));
//! ```

mod field;
mod packet;
mod record;
mod update_rate;
mod value;

pub use field::{FieldDefinition, FieldKind};
pub use packet::Packet;
pub use record::NamedRecord;
pub use update_rate::UpdateRate;
pub use value::{RawField, RawPayload, Value};
