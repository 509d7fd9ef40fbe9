//! Request-scoped data threaded from middleware to the layers below it.
//!
//! Each layer sees a [`DataBag`]. When a middleware proceeds it may contribute a
//! [`Data`] set; the next layer's bag is the current one plus those entries. Keys are
//! never overwritten: contributing a key that an enclosing layer already set fails with
//! [`ChainError::DataKeyConflict`].

use crate::error::ChainError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Value = Arc<dyn Any + Send + Sync>;

/// Entries a middleware contributes when it proceeds.
#[derive(Clone, Default)]
pub struct Data {
    entries: Vec<(String, Value)>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.entries.push((key.into(), Arc::new(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(key, _)| key)).finish()
    }
}

/// The data visible to one layer of a chain.
#[derive(Clone, Default)]
pub struct DataBag {
    entries: Arc<HashMap<String, Value>>,
}

impl DataBag {
    /// Looks up `key`, returning None when it is absent or holds another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref()
    }

    /// Like [`get`](Self::get) but hands out a shared handle that outlives the bag.
    pub fn get_arc<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        Arc::clone(self.entries.get(key)?).downcast().ok()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn extend(&self, data: Data) -> Result<DataBag, ChainError> {
        if data.is_empty() {
            return Ok(self.clone());
        }

        let mut entries = HashMap::clone(&self.entries);
        for (key, value) in data.entries {
            if entries.contains_key(&key) {
                return Err(ChainError::data_key_conflict(key));
            }
            entries.insert(key, value);
        }
        Ok(DataBag { entries: Arc::new(entries) })
    }
}

impl fmt::Debug for DataBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_layers_without_touching_parent() {
        let root = DataBag::default();
        let outer = root.extend(Data::new().with("a", 1_u32)).unwrap();
        let inner = outer.extend(Data::new().with("b", "two")).unwrap();

        assert!(root.is_empty());
        assert_eq!(outer.len(), 1);
        assert_eq!(inner.get::<u32>("a"), Some(&1));
        assert_eq!(inner.get::<&str>("b"), Some(&"two"));
        assert!(!outer.contains_key("b"));
    }

    #[test]
    fn wrong_type_reads_as_absent() {
        let bag = DataBag::default().extend(Data::new().with("n", 5_i64)).unwrap();
        assert_eq!(bag.get::<u8>("n"), None);
        assert_eq!(bag.get_arc::<i64>("n").as_deref(), Some(&5));
    }

    #[test]
    fn existing_key_conflicts() {
        let bag = DataBag::default().extend(Data::new().with("user", "ann")).unwrap();
        let result = bag.extend(Data::new().with("user", "bob"));
        assert!(matches!(result, Err(ChainError::DataKeyConflict { key }) if key == "user"));
    }
}
