use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owned string→string map held by parameters/properties/attributes nodes
///
/// Also the detached result type of scoped property resolution. Keys are
/// kept sorted so two maps with the same entries compare and print equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct KeyValues {
    data: BTreeMap<String, String>,
}

impl KeyValues {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Set a value, replacing any previous one (last write wins)
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.data.insert(key.into(), value.into())
    }

    /// Set a value only if the key is not present yet
    ///
    /// Returns `true` when the value was inserted.
    pub fn insert_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.data.contains_key(key) {
            return false;
        }
        self.data.insert(key.to_string(), value.to_string());
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<BTreeMap<String, String>> for KeyValues {
    fn from(data: BTreeMap<String, String>) -> Self {
        Self { data }
    }
}

impl From<KeyValues> for BTreeMap<String, String> {
    fn from(kv: KeyValues) -> Self {
        kv.data
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut kv = KeyValues::new();
        kv.insert("host", "h1");
        let previous = kv.insert("host", "h2");

        assert_eq!(previous.as_deref(), Some("h1"));
        assert_eq!(kv.get("host"), Some("h2"));
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let mut kv: KeyValues = [("k", "d")].into_iter().collect();

        assert!(!kv.insert_if_absent("k", "a"));
        assert!(kv.insert_if_absent("other", "a"));
        assert_eq!(kv.get("k"), Some("d"));
        assert_eq!(kv.get("other"), Some("a"));
    }

    #[test]
    fn test_iteration_is_sorted() {
        let kv: KeyValues = [("b", "2"), ("a", "1")].into_iter().collect();
        let keys: Vec<_> = kv.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
