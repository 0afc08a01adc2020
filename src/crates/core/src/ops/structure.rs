//! Struct nodes: named fields composed into one ordered mapping.
//!
//! Fields are split by kind when the struct is instantiated:
//! - fed fields (aggregators, nested structs, group nodes) receive every
//!   record that passes the struct's prefilter
//! - constant fields and computed fields are never fed
//!
//! Value extraction is two-phase. Every non-computed field is resolved first,
//! then the computed fields in declaration order against a scope holding what
//! has been resolved so far. The emitted mapping always follows declaration
//! order, whichever phase resolved a field.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::clause::Predicate;
use crate::error::{Error, Result};
use crate::node::{BoxedNode, Node, NodeKind};
use crate::ops::constant::ConstantNode;
use crate::scope::Scope;
use crate::spec::FieldSpec;
use crate::value::{Map, Value};

/// Key material a group node injects into a bucket it creates.
#[derive(Debug, Default)]
pub(crate) struct Injection {
    /// Explicit key field, declared before the template's fields.
    pub(crate) key_field: Option<(String, Value)>,
    /// Values for the template's grouping-field slots, by slot name.
    pub(crate) grouping: Map,
}

/// Declarative description of a struct node.
///
/// # Example
///
/// ```ignore
/// let report = StructSpec::new()
///     .constant("report", "X001")
///     .field("total", sum_of_v)
///     .computed("double", |scope| scope.get("total")?.checked_add(scope.get("total")?));
/// ```
pub struct StructSpec<R> {
    fields: Vec<(String, FieldSpec<R>)>,
    prefilter: Option<Predicate<R>>,
}

impl<R: 'static> StructSpec<R> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            prefilter: None,
        }
    }

    /// Declare a field. Declaration order is output order.
    pub fn field(mut self, name: impl Into<String>, spec: impl Into<FieldSpec<R>>) -> Self {
        self.fields.push((name.into(), spec.into()));
        self
    }

    pub fn constant(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field(name, FieldSpec::constant(value))
    }

    pub fn computed<F>(self, name: impl Into<String>, fnc: F) -> Self
    where
        F: Fn(&Scope) -> Result<Value> + Send + Sync + 'static,
    {
        self.field(name, FieldSpec::computed(fnc))
    }

    /// Field holding the key of the bucket `level` group levels out.
    pub fn group_key(self, name: impl Into<String>, level: usize) -> Self {
        self.field(name, FieldSpec::group_key(level))
    }

    /// Slot for the record field `name`, filled by a field-grouped group node.
    pub fn grouping_field(self, name: impl Into<String>) -> Self {
        self.field(name, FieldSpec::GroupingField)
    }

    /// Only records for which `pred` holds are forwarded to the fields.
    pub fn prefilter<P>(mut self, pred: P) -> Self
    where
        P: Fn(&R) -> Result<bool> + Send + Sync + 'static,
    {
        self.prefilter = Some(Arc::new(pred));
        self
    }

    /// Names of the grouping-field slots, in declaration order.
    pub fn grouping_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, spec)| matches!(spec, FieldSpec::GroupingField))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check the whole spec: field names non-empty and unique, no stray
    /// grouping-field slots, nested specs included.
    pub fn validate(&self) -> Result<()> {
        self.validate_template(None, false)
    }

    /// Check this struct as the bucket template of a group node that injects
    /// `key_field` and may fill grouping-field slots.
    pub(crate) fn validate_template(
        &self,
        key_field: Option<&str>,
        grouping_allowed: bool,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        for (name, spec) in &self.fields {
            if name.is_empty() {
                return Err(Error::construction("empty field name"));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::construction(format!("duplicate field `{}`", name)));
            }
            match spec {
                FieldSpec::GroupingField if !grouping_allowed => {
                    return Err(Error::construction(format!(
                        "grouping field `{}` declared outside a field-grouped group-by",
                        name
                    )));
                }
                FieldSpec::GroupingField => {}
                other => other.validate()?,
            }
        }
        if let Some(name) = key_field {
            if seen.contains(name) {
                return Err(Error::construction(format!(
                    "key field `{}` collides with a template field",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Fresh struct node. Grouping-field slots are rejected here; only a
    /// field-grouped group node can fill them.
    pub fn build(&self) -> Result<StructNode<R>> {
        self.validate()?;
        self.instantiate(&Injection::default())
    }

    /// Node graph for an already validated spec.
    pub(crate) fn instantiate(&self, injection: &Injection) -> Result<StructNode<R>> {
        let mut slots = Vec::with_capacity(self.fields.len() + 1);
        if let Some((name, key)) = &injection.key_field {
            slots.push(Slot {
                name: name.clone(),
                node: Box::new(ConstantNode::new(key.clone())),
            });
        }
        for (name, spec) in &self.fields {
            let node: BoxedNode<R> = match spec {
                FieldSpec::GroupingField => match injection.grouping.get(name) {
                    Some(component) => Box::new(ConstantNode::new(component.clone())),
                    None => {
                        return Err(Error::construction(format!(
                            "grouping field `{}` has no key component",
                            name
                        )));
                    }
                },
                other => other.node()?,
            };
            slots.push(Slot {
                name: name.clone(),
                node,
            });
        }
        Ok(StructNode::new(slots, self.prefilter.clone()))
    }
}

impl<R: 'static> Default for StructSpec<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for StructSpec<R> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            prefilter: self.prefilter.clone(),
        }
    }
}

impl<R> fmt::Debug for StructSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructSpec")
            .field("fields", &self.fields)
            .field("prefilter", &self.prefilter.is_some())
            .finish()
    }
}

struct Slot<R> {
    name: String,
    node: BoxedNode<R>,
}

/// Running state of a struct: one exclusively owned node per field.
pub struct StructNode<R> {
    slots: Vec<Slot<R>>,
    /// Indices of fed slots, in declaration order.
    fed: Vec<usize>,
    /// Indices of computed slots, in declaration order.
    computed: Vec<usize>,
    prefilter: Option<Predicate<R>>,
}

impl<R> StructNode<R> {
    fn new(slots: Vec<Slot<R>>, prefilter: Option<Predicate<R>>) -> Self {
        let mut fed = Vec::new();
        let mut computed = Vec::new();
        for (i, slot) in slots.iter().enumerate() {
            match slot.node.kind() {
                NodeKind::Computed => computed.push(i),
                kind if kind.is_fed() => fed.push(i),
                _ => {}
            }
        }
        Self {
            slots,
            fed,
            computed,
            prefilter,
        }
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    /// The node behind a field.
    pub fn child(&self, name: &str) -> Option<&BoxedNode<R>> {
        self.slots
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| &slot.node)
    }
}

impl<R> Node<R> for StructNode<R> {
    fn accept(&mut self, record: &R) -> Result<()> {
        if let Some(pred) = &self.prefilter {
            if !pred(record)? {
                return Ok(());
            }
        }
        for &i in &self.fed {
            self.slots[i].node.accept(record)?;
        }
        Ok(())
    }

    fn value_in(&self, parent: &Scope) -> Result<Value> {
        let base = parent.nested();
        let mut scope = parent.nested();
        let mut resolved: Vec<Option<Value>> = vec![None; self.slots.len()];

        for (i, slot) in self.slots.iter().enumerate() {
            if slot.node.kind() == NodeKind::Computed {
                continue;
            }
            let value = slot.node.value_in(&base)?;
            scope.resolve(&slot.name, value.clone());
            resolved[i] = Some(value);
        }
        for &i in &self.computed {
            let slot = &self.slots[i];
            let value = slot.node.value_in(&scope)?;
            scope.resolve(&slot.name, value.clone());
            resolved[i] = Some(value);
        }

        let mut out = Map::with_capacity(self.slots.len());
        for (slot, value) in self.slots.iter().zip(resolved) {
            out.insert(slot.name.clone(), value.unwrap_or_default());
        }
        Ok(Value::Map(out))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Struct
    }

    fn name(&self) -> &'static str {
        "Struct"
    }
}

impl<R> fmt::Debug for StructNode<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructNode")
            .field("fields", &self.field_names().collect::<Vec<_>>())
            .field("fed", &self.fed.len())
            .field("computed", &self.computed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::aggregator::AggregatorSpec;

    fn sum() -> AggregatorSpec<i64> {
        AggregatorSpec::new(0i64, |acc: &Value, r: &i64| acc.checked_add(&Value::Int(*r)))
    }

    fn keys(value: &Value) -> Vec<String> {
        value.as_map().unwrap().keys().cloned().collect()
    }

    #[test]
    fn test_declaration_order_regardless_of_kind() {
        let mut node = StructSpec::new()
            .computed("f1", |scope| scope.get("f3").cloned())
            .constant("f2", "const")
            .field("f3", sum())
            .build()
            .unwrap();
        node.feed_many(&[1, 2, 3]).unwrap();
        let value = node.value().unwrap();
        assert_eq!(keys(&value), vec!["f1", "f2", "f3"]);
        assert_eq!(value.get("f1"), Some(&Value::Int(6)));
    }

    #[test]
    fn test_computed_over_constants_without_records() {
        let node = StructSpec::<i64>::new()
            .constant("a", 1i64)
            .constant("b", 2i64)
            .computed("c", |scope| scope.get("a")?.checked_add(scope.get("b")?))
            .build()
            .unwrap();
        assert_eq!(node.value().unwrap().get("c"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_computed_sees_earlier_computed_only() {
        let node = StructSpec::<i64>::new()
            .constant("a", 1i64)
            .computed("b", |scope| scope.get("a")?.checked_add(&Value::Int(1)))
            .computed("c", |scope| scope.get("b").cloned())
            .build()
            .unwrap();
        assert_eq!(node.value().unwrap().get("c"), Some(&Value::Int(2)));

        let node = StructSpec::<i64>::new()
            .computed("c", |scope| scope.get("b").cloned())
            .computed("b", |_| Ok(Value::Int(1)))
            .build()
            .unwrap();
        assert_eq!(node.value(), Err(Error::Unresolved("b".into())));
    }

    #[test]
    fn test_prefilter_gates_all_fed_fields() {
        let mut node = StructSpec::new()
            .prefilter(|r: &i64| Ok(*r > 1))
            .field("sum", sum())
            .field("inner", StructSpec::new().field("sum", sum()))
            .build()
            .unwrap();
        node.feed_many(&[1, 2, 3]).unwrap();
        let value = node.value().unwrap();
        assert_eq!(value.get("sum"), Some(&Value::Int(5)));
        assert_eq!(value.get("inner").and_then(|v| v.get("sum")), Some(&Value::Int(5)));
    }

    #[test]
    fn test_duplicate_field_is_construction_error() {
        let err = StructSpec::new()
            .field("a", sum())
            .constant("a", 1i64)
            .build()
            .unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn test_grouping_field_outside_group_by() {
        let err = StructSpec::<i64>::new().grouping_field("g").build().unwrap_err();
        assert!(err.is_construction());
    }
}
