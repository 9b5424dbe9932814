//! Dataset contract and an in-memory implementation.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A finite, ordered, re-iterable sequence of items.
///
/// `len` must equal the number of items `iter` yields, and `iter` must yield
/// them in the same order every time; restore relies on both.
pub trait Dataset {
    type Item: Serialize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Self::Item> + '_>;

    /// Stable identifier of an item, if the dataset has one. When present,
    /// restored results are matched by key instead of by position.
    fn item_key(&self, _item: &Self::Item) -> Option<String> {
        None
    }
}

/// SHA-256 over the serialized items, in iteration order.
pub fn dataset_digest<D: Dataset + ?Sized>(dataset: &D) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();
    for item in dataset.iter() {
        hasher.update(serde_json::to_vec(item)?);
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

type KeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// Dataset backed by a `Vec`.
pub struct VecDataset<T> {
    items: Vec<T>,
    key_fn: Option<KeyFn<T>>,
}

impl<T> VecDataset<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            key_fn: None,
        }
    }

    /// Derive a stable item key with `key_fn`.
    pub fn with_key(mut self, key_fn: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.key_fn = Some(Box::new(key_fn));
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}

impl<T: Serialize> Dataset for VecDataset<T> {
    type Item = T;

    fn len(&self) -> usize {
        self.items.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.items.iter())
    }

    fn item_key(&self, item: &T) -> Option<String> {
        self.key_fn.as_ref().map(|f| f(item))
    }
}
