//! Versioned schema discovery
//!
//! Definitions live in files named `data_names_vNN.yaml` and `states_vNN.yaml`. A
//! [`SchemaCatalog`] resolves a version either from a directory on disk or from the
//! definitions bundled into the crate.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{SchemaRegistry, StateTable};
use crate::{Result, TelemetryError};

const BUILTIN_DATA_NAMES: &[(u8, &str)] = &[
    (1, include_str!("../../protocols/data_names/data_names_v01.yaml")),
    (3, include_str!("../../protocols/data_names/data_names_v03.yaml")),
];

const BUILTIN_STATES: &[(u8, &str)] = &[(1, include_str!("../../protocols/states/states_v01.yaml"))];

/// Default data names version used by the current flight software.
pub const DEFAULT_SCHEMA_VERSION: u8 = 3;

/// Default flight states version.
pub const DEFAULT_STATES_VERSION: u8 = 1;

/// File name for a data names version.
pub fn data_names_file_name(version: u8) -> String {
    format!("data_names_v{:02}.yaml", version)
}

/// File name for a states version.
pub fn states_file_name(version: u8) -> String {
    format!("states_v{:02}.yaml", version)
}

fn parse_version(file_name: &str, prefix: &str) -> Option<u8> {
    file_name.strip_prefix(prefix)?.strip_suffix(".yaml")?.parse().ok()
}

/// Where schema definitions are loaded from.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    directory: Option<PathBuf>,
}

impl SchemaCatalog {
    /// Catalog over the bundled definitions only.
    pub fn builtin() -> Self {
        Self { directory: None }
    }

    /// Catalog over a directory of YAML files.
    pub fn from_dir(directory: impl Into<PathBuf>) -> Self {
        Self { directory: Some(directory.into()) }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Data names versions available in this catalog, ascending.
    pub fn available_versions(&self) -> Result<Vec<u8>> {
        match &self.directory {
            Some(dir) => Self::scan(dir, "data_names_v"),
            None => Ok(BUILTIN_DATA_NAMES.iter().map(|(v, _)| *v).collect()),
        }
    }

    /// States versions available in this catalog, ascending.
    pub fn available_state_versions(&self) -> Result<Vec<u8>> {
        match &self.directory {
            Some(dir) => Self::scan(dir, "states_v"),
            None => Ok(BUILTIN_STATES.iter().map(|(v, _)| *v).collect()),
        }
    }

    /// Load and validate the data names registry for `version`.
    pub fn load(&self, version: u8) -> Result<SchemaRegistry> {
        match &self.directory {
            Some(dir) => {
                let path = dir.join(data_names_file_name(version));
                debug!(path = %path.display(), "Loading data names");
                SchemaRegistry::load(version, path)
            }
            None => SchemaRegistry::builtin(version),
        }
    }

    /// Load the flight state table for `version`.
    pub fn load_states(&self, version: u8) -> Result<StateTable> {
        match &self.directory {
            Some(dir) => StateTable::load(version, dir.join(states_file_name(version))),
            None => StateTable::builtin(version),
        }
    }

    fn scan(dir: &Path, prefix: &str) -> Result<Vec<u8>> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| TelemetryError::file_error(dir.to_path_buf(), e))?;

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TelemetryError::file_error(dir.to_path_buf(), e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match parse_version(name, prefix) {
                Some(v) => versions.push(v),
                None if name.starts_with(prefix) => {
                    warn!(file = name, "Ignoring schema file with unparseable version");
                }
                None => {}
            }
        }
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }
}

impl SchemaRegistry {
    /// Registry from the definitions bundled into the crate.
    pub fn builtin(version: u8) -> Result<Self> {
        let (_, yaml) = BUILTIN_DATA_NAMES.iter().find(|(v, _)| *v == version).ok_or_else(|| {
            TelemetryError::schema(
                format!("No bundled data names for version {}", version),
                Some(version),
            )
        })?;
        Self::from_yaml_str(version, yaml)
    }
}

impl StateTable {
    /// State table from the definitions bundled into the crate.
    pub fn builtin(version: u8) -> Result<Self> {
        let (_, yaml) = BUILTIN_STATES.iter().find(|(v, _)| *v == version).ok_or_else(|| {
            TelemetryError::schema(format!("No bundled states for version {}", version), Some(version))
        })?;
        Self::from_yaml_str(version, yaml)
    }
}
