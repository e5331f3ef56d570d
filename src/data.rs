//! The shared mutable data environment.
//!
//! Every simulation owns one [`SimData`]; conditions read it and actions
//! mutate it in place. While a simulation is running the environment belongs
//! exclusively to the run thread — controllers may only observe it through
//! [`Simulation::snapshot`](crate::Simulation::snapshot) after a blocking
//! control call has returned.

use std::collections::HashMap;

use serde::Serialize;

use crate::value::Value;

/// The key/value environment conditions and actions operate on.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SimData {
    values: HashMap<String, Value>,
}

impl SimData {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an environment from a raw JSON object, deep-converting each
    /// value with [`Value::from_json`]. Used by the declarative loader for
    /// `initialdata` maps.
    #[must_use]
    pub fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            values: map
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect(),
        }
    }

    /// Looks up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Sets a key, creating it if absent.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Removes a key, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the environment in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable access used by the action evaluator.
    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    /// Renders the whole environment as a raw JSON object for telemetry
    /// records and snapshots.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Reads a list-valued key as owned strings, ignoring non-string
    /// elements. Convenient for observing ordered action side effects.
    #[must_use]
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| v.as_string().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl FromIterator<(String, Value)> for SimData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl From<HashMap<String, Value>> for SimData {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut data = SimData::new();
        data.insert("count", 3);
        assert_eq!(data.get("count"), Some(&Value::Int(3)));
        assert!(data.contains("count"));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn insert_overwrites() {
        let mut data = SimData::new();
        data.insert("light", "red");
        data.insert("light", "green");
        assert_eq!(data.get("light"), Some(&Value::String("green".into())));
    }

    #[test]
    fn from_json_map_converts_values() {
        let serde_json::Value::Object(map) =
            serde_json::json!({"timeOn": 0, "light": "red", "tags": []})
        else {
            panic!("expected an object");
        };
        let data = SimData::from_json_map(map);
        assert_eq!(data.get("timeOn"), Some(&Value::Int(0)));
        assert_eq!(data.get("light"), Some(&Value::String("red".into())));
        assert_eq!(data.get("tags"), Some(&Value::List(Vec::new())));
    }

    #[test]
    fn string_list_reads_tags() {
        let mut data = SimData::new();
        data.insert(
            "tags",
            Value::List(vec![
                Value::String("exitA".into()),
                Value::String("enterB".into()),
            ]),
        );
        assert_eq!(data.string_list("tags"), vec!["exitA", "enterB"]);
        assert!(data.string_list("missing").is_empty());
    }

    #[test]
    fn to_json_snapshot() {
        let mut data = SimData::new();
        data.insert("ready", true);
        let json = data.to_json();
        assert_eq!(json["ready"], serde_json::json!(true));
    }
}
