//! Flight state definitions
//!
//! The flight computer reports its state machine transitions through the
//! `STATE_CHANGE` field as a numeric id; a [`StateTable`] names those ids.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::{Result, TelemetryError};

/// One flight state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDef {
    pub id: u8,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatesFile {
    states: Vec<StateDef>,
}

/// Immutable id/name lookup of flight states for one states version.
#[derive(Debug, Clone)]
pub struct StateTable {
    version: u8,
    by_id: HashMap<u8, StateDef>,
    by_name: HashMap<String, u8>,
}

impl StateTable {
    pub fn new(version: u8, states: Vec<StateDef>) -> Result<Self> {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for state in states {
            if by_name.contains_key(&state.name) {
                return Err(TelemetryError::schema(
                    format!("Duplicate state name {:?}", state.name),
                    Some(version),
                ));
            }
            if by_id.contains_key(&state.id) {
                return Err(TelemetryError::schema(
                    format!("Duplicate state id {}", state.id),
                    Some(version),
                ));
            }
            by_name.insert(state.name.clone(), state.id);
            by_id.insert(state.id, state);
        }

        Ok(Self { version, by_id, by_name })
    }

    pub fn from_yaml_str(version: u8, yaml: &str) -> Result<Self> {
        let file: StatesFile = serde_yaml_ng::from_str(yaml).map_err(|e| {
            TelemetryError::schema(format!("Invalid states YAML: {}", e), Some(version))
        })?;
        Self::new(version, file.states)
    }

    pub fn load<P: AsRef<Path>>(version: u8, path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(version, &yaml)
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn get(&self, name: &str) -> Option<&StateDef> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn get_by_id(&self, id: u8) -> Option<&StateDef> {
        self.by_id.get(&id)
    }

    /// Name for a raw `STATE_CHANGE` value, if it is a whole number naming a known state.
    pub fn name_of_value(&self, value: f64) -> Option<&str> {
        if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
            return None;
        }
        self.get_by_id(value as u8).map(|s| s.name.as_str())
    }

    /// States in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &StateDef> {
        let mut states: Vec<&StateDef> = self.by_id.values().collect();
        states.sort_by_key(|s| s.id);
        states.into_iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn ids(&self) -> Vec<u8> {
        self.iter().map(|s| s.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
states:
  - { id: 1, name: STATE_ASCENT }
  - { id: 0, name: STATE_ARMED, description: "On the pad" }
  - { id: 4, name: STATE_DESCENT }
"#;

    #[test]
    fn lookups_by_name_and_id() {
        let table = StateTable::from_yaml_str(1, YAML).unwrap();
        assert_eq!(table.get("STATE_ASCENT").map(|s| s.id), Some(1));
        assert_eq!(table.get_by_id(0).and_then(|s| s.description.as_deref()), Some("On the pad"));
        assert!(table.get("STATE_BOGUS").is_none());
        assert!(table.get_by_id(9).is_none());
    }

    #[test]
    fn iteration_is_sorted_by_id() {
        let table = StateTable::from_yaml_str(1, YAML).unwrap();
        assert_eq!(table.ids(), vec![0, 1, 4]);
        assert_eq!(table.names(), vec!["STATE_ARMED", "STATE_ASCENT", "STATE_DESCENT"]);
    }

    #[test]
    fn state_values_map_to_names() {
        let table = StateTable::from_yaml_str(1, YAML).unwrap();
        assert_eq!(table.name_of_value(4.0), Some("STATE_DESCENT"));
        assert_eq!(table.name_of_value(4.5), None);
        assert_eq!(table.name_of_value(-1.0), None);
    }

    #[test]
    fn duplicates_are_rejected() {
        let yaml = "states:\n  - { id: 0, name: A }\n  - { id: 0, name: B }\n";
        assert!(StateTable::from_yaml_str(1, yaml).is_err());
        let yaml = "states:\n  - { id: 0, name: A }\n  - { id: 1, name: A }\n";
        assert!(StateTable::from_yaml_str(1, yaml).is_err());
    }

    #[test]
    fn missing_states_list_is_an_error() {
        let err = StateTable::from_yaml_str(1, "phases: []").unwrap_err();
        assert!(err.is_fatal_configuration());
    }

    #[test]
    fn bundled_states_file_loads_from_disk() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("protocols/states");
        let table = StateTable::load(1, dir.join("states_v01.yaml")).unwrap();
        assert_eq!(table.version(), 1);
        assert_eq!(table.ids(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(table.get("STATE_DESCENT").map(|s| s.id), Some(4));
        assert_eq!(table.get_by_id(5).map(|s| s.name.as_str()), Some("STATE_LANDED"));
        assert_eq!(table.name_of_value(2.0), Some("STATE_POWERED_ASCENT"));

        let catalog = crate::schema::SchemaCatalog::from_dir(&dir);
        assert_eq!(catalog.available_state_versions().unwrap(), vec![1]);
        let loaded = catalog.load_states(1).unwrap();
        let builtin = StateTable::builtin(1).unwrap();
        assert_eq!(loaded.iter().collect::<Vec<_>>(), builtin.iter().collect::<Vec<_>>());
        assert!(catalog.load_states(2).is_err());
    }
}
