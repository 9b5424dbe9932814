//! Result records produced by scoring one step.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use easy_exp_tracking::{is_private_field, HistoryRow};

/// Reserved key naming the step's log file, relative to the log directory.
pub const LOG_PATH_KEY: &str = "log_path";

/// Private history field carrying the stable key of the item a row was
/// computed for. Stripped from restored records like every `_` field.
pub const ITEM_KEY_FIELD: &str = "_item_key";

/// Mapping from metric names to JSON values for one step.
///
/// Keys keep insertion order so printed and tracked records read the way
/// the metric produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRecord(Map<String, Value>);

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Numeric field as `f64`, accepting integers and booleans.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_f64(),
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            _ => None,
        }
    }

    /// The reserved `log_path` field.
    ///
    /// Returns `Ok(None)` when absent and an error message when present but
    /// not a string.
    pub fn log_path(&self) -> std::result::Result<Option<&str>, String> {
        match self.0.get(LOG_PATH_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(format!("{LOG_PATH_KEY} must be a string, got {other}")),
        }
    }

    /// Rebuild a record from a tracked history row, dropping private fields.
    pub fn from_history_row(row: &HistoryRow) -> Self {
        Self(
            row.iter()
                .filter(|(k, _)| !is_private_field(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// The row sent to a tracking session: the record plus an optional
    /// private item key.
    pub fn to_history_row(&self, item_key: Option<&str>) -> HistoryRow {
        let mut row = self.0.clone();
        if let Some(key) = item_key {
            row.insert(ITEM_KEY_FIELD.to_string(), Value::from(key));
        }
        row
    }
}

impl From<Map<String, Value>> for ResultRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<ResultRecord> for Map<String, Value> {
    fn from(record: ResultRecord) -> Self {
        record.0
    }
}

impl TryFrom<Value> for ResultRecord {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(format!("result record must be a JSON object, got {other}")),
        }
    }
}
