//! Field schema entries

use serde::{Deserialize, Serialize};

/// Whether a field carries one scalar or a packed X/Y/Z triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// One 4-byte value.
    #[default]
    Single,
    /// Three 4-byte floats expanding into three child fields.
    Group,
}

impl FieldKind {
    /// Radio payload width in bytes for this kind.
    pub const fn radio_payload_len(&self) -> usize {
        match self {
            FieldKind::Single => 4,
            FieldKind::Group => 12,
        }
    }
}

/// One entry of a versioned data names definition.
///
/// Deserializes directly from the YAML layout used by the flight software team:
///
/// ```yaml
/// - id: 100
///   name: ACCELEROMETER
///   unit: m/s^2
///   type: group
///   data: [0, 1, 2]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Wire id of the field
    pub id: u8,
    /// Unique semantic name (e.g. `ALTITUDE`)
    pub name: String,
    /// Display unit
    #[serde(default)]
    pub unit: String,
    /// Single value or group
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    /// Child field ids of a group, in declared X/Y/Z order
    #[serde(rename = "data", default)]
    pub children: Vec<u8>,
}

impl FieldDefinition {
    /// Build a single-valued definition.
    pub fn single(id: u8, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self { id, name: name.into(), unit: unit.into(), kind: FieldKind::Single, children: Vec::new() }
    }

    /// Build a group definition expanding into `children`.
    pub fn group(id: u8, name: impl Into<String>, unit: impl Into<String>, children: [u8; 3]) -> Self {
        Self {
            id,
            name: name.into(),
            unit: unit.into(),
            kind: FieldKind::Group,
            children: children.to_vec(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == FieldKind::Group
    }
}
