//! Field lookup on input records.
//!
//! Records are opaque to the tree: nodes are generic over the record type and
//! only the callbacks supplied by the caller look inside. `Record` is the
//! lookup-by-name protocol used by the field helpers and by field-based
//! grouping.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::value::{Map, Value};

pub trait Record {
    /// Value of the named field, or `Error::MissingField`.
    fn field(&self, name: &str) -> Result<Value>;
}

impl Record for Value {
    fn field(&self, name: &str) -> Result<Value> {
        match self {
            Value::Map(map) => map.field(name),
            other => Err(Error::mismatch("map", other)),
        }
    }
}

impl Record for Map {
    fn field(&self, name: &str) -> Result<Value> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }
}

impl Record for HashMap<String, Value> {
    fn field(&self, name: &str) -> Result<Value> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }
}

impl Record for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Result<Value> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn field(&self, name: &str) -> Result<Value> {
        (**self).field(name)
    }
}
