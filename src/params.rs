//! Ordered, name-keyed bind parameters produced during translation.

use sea_query::Value;

/// Named parameter values in insertion order.
///
/// Inserting an existing name replaces its value in place, so the order of
/// first appearance is kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    entries: Vec<(String, Value)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Renames a parameter, keeping its position. Returns false if `from` is absent.
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|(n, _)| n == from) {
            Some(entry) => {
                entry.0 = to.into();
                true
            }
            None => false,
        }
    }

    /// Replaces the value of an existing parameter. Returns false if `name` is absent.
    pub fn modify_value(&mut self, name: &str, value: Value) -> bool {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                entry.1 = value;
                true
            }
            None => false,
        }
    }

    /// Merges another set into this one; colliding names take the incoming value.
    pub fn union(&mut self, other: ParameterSet) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, Value)> {
        self.entries
    }
}

impl FromIterator<(String, Value)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut set = ParameterSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_keeps_first_position() {
        let mut params = ParameterSet::new();
        params.insert("Age1", Value::BigInt(Some(18)));
        params.insert("Name2", Value::String(Some(Box::new("a".to_string()))));
        params.insert("Age1", Value::BigInt(Some(21)));

        assert_eq!(params.len(), 2);
        assert_eq!(params.names().collect::<Vec<_>>(), vec!["Age1", "Name2"]);
        assert_eq!(params.get("Age1"), Some(&Value::BigInt(Some(21))));
    }

    #[test]
    fn test_rename_and_modify() {
        let mut params = ParameterSet::new();
        params.insert("p1", Value::BigInt(Some(1)));

        assert!(params.rename("p1", "Id1"));
        assert!(!params.contains("p1"));
        assert!(params.modify_value("Id1", Value::BigInt(Some(2))));
        assert!(!params.modify_value("missing", Value::BigInt(Some(3))));
        assert_eq!(params.get("Id1"), Some(&Value::BigInt(Some(2))));
    }

    #[test]
    fn test_union_overwrites_collisions() {
        let mut left: ParameterSet = vec![
            ("a".to_string(), Value::BigInt(Some(1))),
            ("b".to_string(), Value::BigInt(Some(2))),
        ]
        .into_iter()
        .collect();
        let right: ParameterSet = vec![
            ("b".to_string(), Value::BigInt(Some(20))),
            ("c".to_string(), Value::BigInt(Some(30))),
        ]
        .into_iter()
        .collect();

        left.union(right);
        assert_eq!(
            left.into_inner(),
            vec![
                ("a".to_string(), Value::BigInt(Some(1))),
                ("b".to_string(), Value::BigInt(Some(20))),
                ("c".to_string(), Value::BigInt(Some(30))),
            ]
        );
    }
}
