//! JSON-file datasets.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use easy_exp_core::{dataset_digest, Dataset};

/// Failures loading a dataset file.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("cannot read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One MATH-style problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathProblem {
    pub problem: String,
    /// Reference solution ending in a `\boxed{}` answer.
    pub solution: String,
    /// Relative file name identifying the problem (e.g. `algebra/1.json`).
    pub path: String,
    /// Any other fields (level, type, ...), kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Items loaded from a JSON array file.
///
/// With a key field set, each item's value for that field is its stable
/// key, and resumed runs match results by it.
#[derive(Debug, Clone)]
pub struct JsonDataset<T> {
    items: Vec<T>,
    key_field: Option<String>,
}

impl<T: DeserializeOwned> JsonDataset<T> {
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let items = serde_json::from_str(&text).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_items(items))
    }
}

impl<T> JsonDataset<T> {
    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items,
            key_field: None,
        }
    }

    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = Some(field.into());
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}

impl<T: Serialize> JsonDataset<T> {
    /// Digest of the items, for detecting a changed dataset on resume.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        dataset_digest(self)
    }
}

impl<T: Serialize> Dataset for JsonDataset<T> {
    type Item = T;

    fn len(&self) -> usize {
        self.items.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.items.iter())
    }

    fn item_key(&self, item: &T) -> Option<String> {
        let field = self.key_field.as_deref()?;
        match serde_json::to_value(item).ok()?.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
