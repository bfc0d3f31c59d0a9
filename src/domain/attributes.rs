//! Raw attribute maps produced by section extractors
//!
//! Keys are kept exactly as found in the page markup (after text cleanup),
//! case preserved, in first-insertion order.

use serde::{Deserialize, Serialize};

/// Ordered raw key → raw value mapping for one document.
///
/// Product pages carry a few dozen attributes at most, so lookups are linear
/// scans over a vector; this keeps insertion order without an extra map type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttributeMap {
    entries: Vec<(String, String)>,
}

impl RawAttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. An overwritten key keeps its original position.
    /// Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Insert only when the key is not present yet. Returns true if inserted.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, value.into()));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawAttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for RawAttributeMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_keeps_position() {
        let mut map = RawAttributeMap::new();
        map.insert("Colour", "Red");
        map.insert("Size", "4 Years");
        let previous = map.insert("Colour", "Blue");

        assert_eq!(previous.as_deref(), Some("Red"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["Colour", "Size"]);
        assert_eq!(map.get("Colour"), Some("Blue"));
    }

    #[test]
    fn insert_if_absent_never_overwrites() {
        let mut map = RawAttributeMap::new();
        assert!(map.insert_if_absent("Colour", "Red"));
        assert!(!map.insert_if_absent("Colour", "Blue"));
        assert_eq!(map.get("Colour"), Some("Red"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn keys_are_case_sensitive() {
        let map: RawAttributeMap = [("Colour", "Red"), ("colour", "red")].into_iter().collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("colour"), Some("red"));
    }
}
