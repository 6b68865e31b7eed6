//! Named records delivered to display, storage and plotting consumers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Value;

/// A set of named telemetry values sharing one timestamp.
///
/// Names iterate in sorted order so downstream CSV writers get stable columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedRecord {
    /// Flight computer clock in milliseconds, when known
    pub timestamp_ms: Option<u32>,
    /// Values keyed by field name
    pub values: BTreeMap<String, Value>,
}

impl NamedRecord {
    pub fn new(timestamp_ms: Option<u32>) -> Self {
        Self { timestamp_ms, values: BTreeMap::new() }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    /// Value widened to `f64`, whatever its wire type.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.as_f64())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
