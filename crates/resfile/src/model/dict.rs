//! Name-keyed, insertion-ordered dictionary.

/// Ordered dictionary from names to records.
///
/// Entries keep insertion order, which is also their wire order. Lookups
/// are linear; dictionaries in a container are small.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct ResDict<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for ResDict<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ResDict<T> {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `value` under `name`.
    ///
    /// An existing entry with the same name is replaced in place and its
    /// old value returned.
    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Option<T> {
        let name = name.into();
        match self.index_of(&name) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Appends an entry without checking for an existing name.
    ///
    /// Used by the decoder so a container is read back exactly as stored.
    pub(crate) fn push(&mut self, name: String, value: T) {
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Returns the position of `name`, which is also its element index.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }

    /// Returns the entry at `index`.
    pub fn get_index(&self, index: usize) -> Option<(&str, &T)> {
        self.entries
            .get(index)
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<T, K: Into<String>> FromIterator<(K, T)> for ResDict<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (name, value) in iter {
            dict.insert(name, value);
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut dict = ResDict::new();
        assert_eq!(dict.insert("a", 1), None);
        assert_eq!(dict.insert("b", 2), None);
        assert_eq!(dict.insert("a", 3), Some(1));

        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("a"), Some(&3));
        assert_eq!(dict.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let dict: ResDict<u32> = [("Bone", 1)].into_iter().collect();
        assert!(dict.contains_key("Bone"));
        assert!(!dict.contains_key("bone"));
        assert_eq!(dict.index_of("Bone"), Some(0));
        assert_eq!(dict.get_index(0), Some(("Bone", &1)));
        assert_eq!(dict.get_index(1), None);
    }

    #[test]
    fn test_push_keeps_duplicates() {
        let mut dict = ResDict::new();
        dict.push("x".to_string(), 1);
        dict.push("x".to_string(), 2);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("x"), Some(&1));
    }
}
