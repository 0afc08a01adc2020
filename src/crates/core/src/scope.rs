//! Resolution scope for value extraction.
//!
//! A `Scope` is what a node sees while its value is being extracted:
//! - the sibling fields its owning struct has already resolved, by name
//! - the keys of the group buckets it is nested in, innermost first
//!
//! Computed fields read siblings through it instead of reaching into the
//! owning struct, which keeps resolution an explicit single pass.

use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Keys of the enclosing buckets, innermost first.
    keys: Vec<Value>,
    /// Already-resolved sibling values in resolution order.
    fields: Map,
}

impl Scope {
    /// Scope of a tree root: no siblings, no enclosing groups.
    pub fn root() -> Self {
        Self::default()
    }

    /// Scope for the fields of a struct nested in `self`.
    ///
    /// Group keys are inherited, sibling fields are not.
    pub fn nested(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            fields: Map::new(),
        }
    }

    /// Scope for a bucket of a group node, one level deeper.
    pub fn enter_group(&self, key: Value) -> Self {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.push(key);
        keys.extend(self.keys.iter().cloned());
        Self {
            keys,
            fields: Map::new(),
        }
    }

    /// Key of the enclosing bucket `level` steps out (0 = innermost).
    pub fn group_key(&self, level: usize) -> Option<&Value> {
        self.keys.get(level)
    }

    /// Number of enclosing group levels.
    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    /// Resolved sibling value by name.
    ///
    /// Fails with `Error::Unresolved` if the sibling does not exist or has not
    /// been resolved yet (a computed field declared later).
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::Unresolved(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// All siblings resolved so far.
    pub fn fields(&self) -> &Map {
        &self.fields
    }

    pub(crate) fn resolve(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

impl Record for Scope {
    fn field(&self, name: &str) -> Result<Value> {
        self.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_keys_innermost_first() {
        let outer = Scope::root().enter_group(Value::from("jane"));
        let inner = outer.nested().enter_group(Value::from("chicago"));
        assert_eq!(inner.depth(), 2);
        assert_eq!(inner.group_key(0), Some(&Value::from("chicago")));
        assert_eq!(inner.group_key(1), Some(&Value::from("jane")));
        assert_eq!(inner.group_key(2), None);
    }

    #[test]
    fn test_unresolved_sibling() {
        let mut scope = Scope::root();
        scope.resolve("a", Value::Int(1));
        assert_eq!(scope.get("a"), Ok(&Value::Int(1)));
        assert_eq!(scope.get("b"), Err(Error::Unresolved("b".into())));
        assert!(!scope.nested().contains("a"));
    }
}
