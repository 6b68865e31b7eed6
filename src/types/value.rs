//! Decoded telemetry values

use serde::{Deserialize, Serialize};

/// A decoded scalar.
///
/// The wire always carries 4 raw bytes; the designated timestamp field is read as an
/// unsigned integer and every other single field as an IEEE-754 float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    UInt(u32),
    Float(f32),
}

impl Value {
    /// Widen to `f64` for arithmetic and plotting.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::UInt(v) => v as f64,
            Value::Float(v) => v as f64,
        }
    }

    /// Returns the float payload, or `None` for integer values.
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::Float(v) => Some(v),
            Value::UInt(_) => None,
        }
    }

    /// Returns the integer payload, or `None` for float values.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::UInt(v) => Some(v),
            Value::Float(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v)
    }
}

/// Payload of a decoded field before names are attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawPayload {
    Single(Value),
    Group([f32; 3]),
}

/// A decoded but not-yet-named field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    pub id: u8,
    pub payload: RawPayload,
}

impl RawField {
    pub fn single(id: u8, value: impl Into<Value>) -> Self {
        Self { id, payload: RawPayload::Single(value.into()) }
    }

    pub fn group(id: u8, values: [f32; 3]) -> Self {
        Self { id, payload: RawPayload::Group(values) }
    }

    /// The scalar value, if this is a single field.
    pub fn value(&self) -> Option<Value> {
        match self.payload {
            RawPayload::Single(v) => Some(v),
            RawPayload::Group(_) => None,
        }
    }
}
