//! Field schema registry
//!
//! A [`SchemaRegistry`] is the immutable id/name → [`FieldDefinition`] mapping for one
//! protocol version. It is validated once at load time; any inconsistency is a
//! configuration error that must stop a session before decoding begins. After
//! construction it is read-only and can be shared across sessions behind an `Arc`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::types::{FieldDefinition, FieldKind};
use crate::{Result, TelemetryError};

/// Name of the designated timestamp field.
pub const TIMESTAMP_FIELD: &str = "TIMESTAMP";

/// Number of children every group field expands into.
pub const GROUP_WIDTH: usize = 3;

#[derive(Debug, Deserialize)]
struct DataNamesFile {
    data_names: Vec<FieldDefinition>,
}

/// Immutable mapping of field ids and names for one protocol version.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    version: u8,
    by_id: HashMap<u8, FieldDefinition>,
    by_name: HashMap<String, u8>,
    timestamp_id: u8,
}

impl SchemaRegistry {
    /// Build and validate a registry from definitions.
    pub fn new(version: u8, definitions: Vec<FieldDefinition>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(definitions.len());
        let mut by_name = HashMap::with_capacity(definitions.len());

        for def in definitions {
            if def.name.is_empty() {
                return Err(TelemetryError::schema(
                    format!("Field id {} has an empty name", def.id),
                    Some(version),
                ));
            }
            if by_name.contains_key(&def.name) {
                return Err(TelemetryError::schema(
                    format!("Duplicate field name {:?}", def.name),
                    Some(version),
                ));
            }
            if by_id.contains_key(&def.id) {
                return Err(TelemetryError::schema(
                    format!("Duplicate field id {}", def.id),
                    Some(version),
                ));
            }
            by_name.insert(def.name.clone(), def.id);
            by_id.insert(def.id, def);
        }

        let timestamp_id = match by_name.get(TIMESTAMP_FIELD) {
            Some(&id) => id,
            None => {
                return Err(TelemetryError::schema(
                    format!("No {} field defined", TIMESTAMP_FIELD),
                    Some(version),
                ));
            }
        };

        let registry = Self { version, by_id, by_name, timestamp_id };
        registry.validate()?;

        debug!(version, fields = registry.len(), "Loaded field schema");
        Ok(registry)
    }

    /// Parse a `data_names:` YAML document.
    pub fn from_yaml_str(version: u8, yaml: &str) -> Result<Self> {
        let file: DataNamesFile = serde_yaml_ng::from_str(yaml).map_err(|e| {
            TelemetryError::schema(format!("Malformed data names YAML: {}", e), Some(version))
        })?;
        Self::new(version, file.data_names)
    }

    /// Load a `data_names:` YAML file.
    pub fn load<P: AsRef<Path>>(version: u8, path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(version, &yaml)
    }

    fn validate(&self) -> Result<()> {
        for def in self.by_id.values() {
            match def.kind {
                FieldKind::Single => {
                    if !def.children.is_empty() {
                        return Err(TelemetryError::schema(
                            format!("Single field {} declares children", def.name),
                            Some(self.version),
                        ));
                    }
                }
                FieldKind::Group => {
                    if def.children.len() != GROUP_WIDTH {
                        return Err(TelemetryError::schema(
                            format!(
                                "Group {} has {} children, expected {}",
                                def.name,
                                def.children.len(),
                                GROUP_WIDTH
                            ),
                            Some(self.version),
                        ));
                    }
                    for child_id in &def.children {
                        match self.by_id.get(child_id) {
                            None => {
                                return Err(TelemetryError::schema(
                                    format!("Group {} references unknown id {}", def.name, child_id),
                                    Some(self.version),
                                ));
                            }
                            Some(child) if child.is_group() => {
                                return Err(TelemetryError::schema(
                                    format!("Group {} nests group {}", def.name, child.name),
                                    Some(self.version),
                                ));
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
        }

        if self.by_id.get(&self.timestamp_id).is_some_and(|d| d.is_group()) {
            return Err(TelemetryError::schema(
                format!("{} must be a single field", TIMESTAMP_FIELD),
                Some(self.version),
            ));
        }

        Ok(())
    }

    /// Protocol version this registry was loaded for.
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn lookup_by_id(&self, id: u8) -> Option<&FieldDefinition> {
        self.by_id.get(&id)
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    /// Like [`lookup_by_name`](Self::lookup_by_name) but reports a missing field as an error.
    pub fn require(&self, name: &str) -> Result<&FieldDefinition> {
        self.lookup_by_name(name)
            .ok_or_else(|| TelemetryError::FieldNotFound { field: name.to_string() })
    }

    /// Wire id of the designated timestamp field.
    pub fn timestamp_id(&self) -> u8 {
        self.timestamp_id
    }

    pub fn is_timestamp(&self, id: u8) -> bool {
        id == self.timestamp_id
    }

    /// Child definitions of a group, in declared order. Empty for single fields.
    pub fn children_of<'a>(
        &'a self,
        def: &'a FieldDefinition,
    ) -> impl Iterator<Item = &'a FieldDefinition> + 'a {
        def.children.iter().filter_map(move |id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All definitions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        let mut defs: Vec<&FieldDefinition> = self.by_id.values().collect();
        defs.sort_by_key(|d| d.id);
        defs.into_iter()
    }

    /// Names of all single-valued fields in id order, i.e. the columns a record can have.
    pub fn column_names(&self) -> Vec<&str> {
        self.iter().filter(|d| !d.is_group()).map(|d| d.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::single(0, "ACCELEROMETER_X", "m/s^2"),
            FieldDefinition::single(1, "ACCELEROMETER_Y", "m/s^2"),
            FieldDefinition::single(2, "ACCELEROMETER_Z", "m/s^2"),
            FieldDefinition::single(8, "ALTITUDE", "m"),
            FieldDefinition::single(14, "TIMESTAMP", "ms"),
            FieldDefinition::group(100, "ACCELEROMETER", "m/s^2", [0, 1, 2]),
        ]
    }

    #[test]
    fn lookups_by_id_and_name_agree() {
        let registry = SchemaRegistry::new(3, base_fields()).unwrap();

        assert_eq!(registry.version(), 3);
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.lookup_by_id(8).map(|d| d.name.as_str()), Some("ALTITUDE"));
        assert_eq!(registry.lookup_by_name("ALTITUDE").map(|d| d.id), Some(8));
        assert!(registry.lookup_by_id(200).is_none());
        assert!(registry.lookup_by_name("NOPE").is_none());
        assert_eq!(registry.timestamp_id(), 14);
        assert!(registry.is_timestamp(14));
    }

    #[test]
    fn require_reports_missing_field() {
        let registry = SchemaRegistry::new(3, base_fields()).unwrap();
        let err = registry.require("EST_APOGEE").unwrap_err();
        assert!(matches!(err, TelemetryError::FieldNotFound { ref field } if field == "EST_APOGEE"));
    }

    #[test]
    fn group_children_resolve_in_declared_order() {
        let registry = SchemaRegistry::new(3, base_fields()).unwrap();
        let group = registry.lookup_by_id(100).unwrap();
        let names: Vec<&str> = registry.children_of(group).map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["ACCELEROMETER_X", "ACCELEROMETER_Y", "ACCELEROMETER_Z"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut fields = base_fields();
        fields.push(FieldDefinition::single(8, "ALTITUDE_2", "m"));
        let err = SchemaRegistry::new(3, fields).unwrap_err();
        assert!(err.is_fatal_configuration());
        assert!(err.to_string().contains("Duplicate field id 8"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut fields = base_fields();
        fields.push(FieldDefinition::single(9, "ALTITUDE", "m"));
        let err = SchemaRegistry::new(3, fields).unwrap_err();
        assert!(err.to_string().contains("Duplicate field name"));
    }

    #[test]
    fn groups_must_have_three_single_children() {
        let mut fields = base_fields();
        fields.push(FieldDefinition {
            id: 101,
            name: "SHORT".into(),
            unit: String::new(),
            kind: FieldKind::Group,
            children: vec![0, 1],
        });
        assert!(SchemaRegistry::new(3, fields).is_err());

        let mut fields = base_fields();
        fields.push(FieldDefinition::group(101, "NESTED", "", [100, 1, 2]));
        let err = SchemaRegistry::new(3, fields).unwrap_err();
        assert!(err.to_string().contains("nests group"));

        let mut fields = base_fields();
        fields.push(FieldDefinition::group(101, "DANGLING", "", [0, 1, 77]));
        let err = SchemaRegistry::new(3, fields).unwrap_err();
        assert!(err.to_string().contains("unknown id 77"));
    }

    #[test]
    fn timestamp_field_is_mandatory_and_single() {
        let fields: Vec<_> = base_fields().into_iter().filter(|d| d.name != "TIMESTAMP").collect();
        let err = SchemaRegistry::new(3, fields).unwrap_err();
        assert!(err.to_string().contains("TIMESTAMP"));

        let mut fields: Vec<_> =
            base_fields().into_iter().filter(|d| d.name != "TIMESTAMP").collect();
        fields.push(FieldDefinition::group(14, "TIMESTAMP", "ms", [0, 1, 2]));
        assert!(SchemaRegistry::new(3, fields).is_err());
    }

    #[test]
    fn malformed_yaml_is_a_schema_error() {
        let err = SchemaRegistry::from_yaml_str(3, "data_names: [ {id: 300, name: X} ]").unwrap_err();
        assert!(matches!(err, TelemetryError::Schema { version: Some(3), .. }));

        let err = SchemaRegistry::from_yaml_str(3, "fields: []").unwrap_err();
        assert!(err.is_fatal_configuration());
    }

    #[test]
    fn column_names_skip_groups() {
        let registry = SchemaRegistry::new(3, base_fields()).unwrap();
        assert_eq!(
            registry.column_names(),
            ["ACCELEROMETER_X", "ACCELEROMETER_Y", "ACCELEROMETER_Z", "ALTITUDE", "TIMESTAMP"]
        );
    }
}
