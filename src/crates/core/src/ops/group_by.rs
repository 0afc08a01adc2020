//! Group nodes: partition records into keyed buckets of struct state.
//!
//! Each record that passes the prefilter is mapped to a key. The first record
//! of a key instantiates a fresh struct from the template; later records of
//! the same key go to that bucket only. Buckets keep first-seen order and live
//! as long as the node.
//!
//! At value time the bucket values are extracted in creation order, then:
//! 1. `sort_key` orders them
//! 2. `having` drops buckets whose fully resolved value fails it
//! 3. `post_sort_key` orders what is left
//!
//! All three are stable and run on the materialized sequence only.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use log::{debug, trace};

use crate::clause::{Clauses, KeyFn, SortKey, ValuePredicate, retain_values, sort_values};
use crate::error::{Error, Result};
use crate::node::{Node, NodeKind};
use crate::ops::structure::{Injection, StructNode, StructSpec};
use crate::record::Record;
use crate::scope::Scope;
use crate::value::Value;

/// How a group node derives bucket keys.
pub enum Grouping<R> {
    /// Key computed by a function of the record.
    Key(KeyFn<R>),
    /// Key is the tuple of the named record fields; each component fills the
    /// template's grouping-field slot of the same name.
    Fields(Vec<String>, KeyFn<R>),
    /// Every record opens its own bucket, keyed by arrival index.
    Sequence,
}

impl<R> Clone for Grouping<R> {
    fn clone(&self) -> Self {
        match self {
            Grouping::Key(key) => Grouping::Key(Arc::clone(key)),
            Grouping::Fields(names, key) => Grouping::Fields(names.clone(), Arc::clone(key)),
            Grouping::Sequence => Grouping::Sequence,
        }
    }
}

impl<R> fmt::Debug for Grouping<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Key(_) => f.write_str("Key"),
            Grouping::Fields(names, _) => f.debug_tuple("Fields").field(names).finish(),
            Grouping::Sequence => f.write_str("Sequence"),
        }
    }
}

/// Declarative description of a group node.
///
/// # Example
///
/// ```ignore
/// let by_g = GroupBySpec::new(|r: &Value| r.field("g"), StructSpec::new().field("sum", sum_of_v))
///     .key_field("key")
///     .having(|row| Ok(row.get("sum") > Some(&Value::Int(2))))
///     .post_sort_key(|row| row.field("key"));
/// ```
pub struct GroupBySpec<R> {
    grouping: Grouping<R>,
    template: StructSpec<R>,
    key_field: Option<String>,
    clauses: Clauses<R>,
    having: Option<ValuePredicate>,
    post_sort_key: Option<SortKey>,
}

impl<R: 'static> GroupBySpec<R> {
    /// Group by the key `key` computes for each record.
    pub fn new<K>(key: K, template: StructSpec<R>) -> Self
    where
        K: Fn(&R) -> Result<Value> + Send + Sync + 'static,
    {
        Self::with_grouping(Grouping::Key(Arc::new(key)), template)
    }

    /// Group by the record fields named by the template's grouping-field
    /// slots, in slot order.
    pub fn by_fields(template: StructSpec<R>) -> Self
    where
        R: Record,
    {
        let names: Vec<String> = template
            .grouping_fields()
            .into_iter()
            .map(str::to_string)
            .collect();
        let key_names = names.clone();
        let key: KeyFn<R> = Arc::new(move |record: &R| {
            key_names
                .iter()
                .map(|name| record.field(name))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        });
        Self::with_grouping(Grouping::Fields(names, key), template)
    }

    /// One bucket per record, in arrival order. No key is injected.
    pub fn sequence(template: StructSpec<R>) -> Self {
        Self::with_grouping(Grouping::Sequence, template)
    }

    fn with_grouping(grouping: Grouping<R>, template: StructSpec<R>) -> Self {
        Self {
            grouping,
            template,
            key_field: None,
            clauses: Clauses::default(),
            having: None,
            post_sort_key: None,
        }
    }

    /// Expose each bucket's key as a constant field `name`, declared first.
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.key_field = Some(name.into());
        self
    }

    pub fn prefilter<P>(mut self, pred: P) -> Self
    where
        P: Fn(&R) -> Result<bool> + Send + Sync + 'static,
    {
        self.clauses.prefilter = Some(Arc::new(pred));
        self
    }

    /// Order bucket values before `having` is applied.
    pub fn sort_key<K>(mut self, key: K) -> Self
    where
        K: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.clauses.sort_key = Some(Arc::new(key));
        self
    }

    /// Keep only buckets whose resolved value (computed fields included)
    /// satisfies `pred`.
    pub fn having<P>(mut self, pred: P) -> Self
    where
        P: Fn(&Value) -> Result<bool> + Send + Sync + 'static,
    {
        self.having = Some(Arc::new(pred));
        self
    }

    /// Order the buckets left after `having`.
    pub fn post_sort_key<K>(mut self, key: K) -> Self
    where
        K: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.post_sort_key = Some(Arc::new(key));
        self
    }

    pub fn template(&self) -> &StructSpec<R> {
        &self.template
    }

    /// Check the grouping mode against the template, nested group nodes
    /// included.
    pub fn validate(&self) -> Result<()> {
        let by_fields = match &self.grouping {
            Grouping::Fields(names, _) if names.is_empty() => {
                return Err(Error::construction(
                    "field-grouped group-by template declares no grouping fields",
                ));
            }
            Grouping::Fields(..) => true,
            _ => false,
        };
        self.template
            .validate_template(self.key_field.as_deref(), by_fields)
    }

    /// Fresh group node without buckets.
    ///
    /// The whole spec is validated here, so bucket creation while feeding
    /// never re-checks or re-copies it.
    pub fn build(&self) -> Result<GroupByNode<R>> {
        self.validate()?;
        debug!(
            "built group-by ({:?}) over {} template fields",
            self.grouping,
            self.template.len()
        );
        Ok(GroupByNode::new(Arc::new(self.clone())))
    }

    fn instantiate_bucket(&self, key: &Value) -> Result<StructNode<R>> {
        let mut injection = Injection {
            key_field: self.key_field.clone().map(|name| (name, key.clone())),
            ..Injection::default()
        };
        if let Grouping::Fields(names, _) = &self.grouping {
            let components = key.as_list().unwrap_or_default();
            for (name, component) in names.iter().zip(components) {
                injection.grouping.insert(name.clone(), component.clone());
            }
        }
        self.template.instantiate(&injection)
    }
}

impl<R> Clone for GroupBySpec<R> {
    fn clone(&self) -> Self {
        Self {
            grouping: self.grouping.clone(),
            template: self.template.clone(),
            key_field: self.key_field.clone(),
            clauses: self.clauses.clone(),
            having: self.having.clone(),
            post_sort_key: self.post_sort_key.clone(),
        }
    }
}

impl<R> fmt::Debug for GroupBySpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBySpec")
            .field("grouping", &self.grouping)
            .field("template", &self.template)
            .field("key_field", &self.key_field)
            .field("clauses", &self.clauses)
            .field("having", &self.having.is_some())
            .field("post_sort_key", &self.post_sort_key.is_some())
            .finish()
    }
}

/// Running state of a group node: buckets in first-seen key order.
///
/// The spec is shared with every other node instantiated from the same
/// template, e.g. the copies of a nested group living in sibling buckets.
pub struct GroupByNode<R> {
    spec: Arc<GroupBySpec<R>>,
    buckets: IndexMap<Value, StructNode<R>>,
    next_index: i64,
}

impl<R: 'static> GroupByNode<R> {
    /// Node over an already validated spec.
    pub(crate) fn new(spec: Arc<GroupBySpec<R>>) -> Self {
        Self {
            spec,
            buckets: IndexMap::new(),
            next_index: 0,
        }
    }

    fn key_of(&self, record: &R) -> Result<Value> {
        match &self.spec.grouping {
            Grouping::Key(key) | Grouping::Fields(_, key) => key(record),
            Grouping::Sequence => Ok(Value::Int(self.next_index)),
        }
    }

    fn bucket_scope(&self, scope: &Scope, key: &Value) -> Scope {
        match self.spec.grouping {
            Grouping::Sequence => scope.nested(),
            _ => scope.enter_group(key.clone()),
        }
    }

    /// Number of buckets created so far.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Bucket keys in creation order.
    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.buckets.keys()
    }

    /// The bucket for `key`; never creates one.
    pub fn bucket(&self, key: &Value) -> Result<&StructNode<R>> {
        self.buckets
            .get(key)
            .ok_or_else(|| Error::UnknownGroup(key.clone()))
    }

    /// Resolved value of the bucket for `key`, as if this node were a root.
    pub fn bucket_value(&self, key: &Value) -> Result<Value> {
        let bucket = self.bucket(key)?;
        bucket.value_in(&self.bucket_scope(&Scope::root(), key))
    }
}

impl<R: 'static> Node<R> for GroupByNode<R> {
    fn accept(&mut self, record: &R) -> Result<()> {
        if !self.spec.clauses.admits(record)? {
            return Ok(());
        }
        let key = self.key_of(record)?;
        match self.buckets.entry(key) {
            Entry::Occupied(entry) => entry.into_mut().accept(record),
            Entry::Vacant(entry) => {
                // a bucket only exists once a record has been fed into it
                let mut bucket = self.spec.instantiate_bucket(entry.key())?;
                bucket.accept(record)?;
                trace!("new bucket {} (#{})", entry.key(), self.next_index);
                self.next_index += 1;
                entry.insert(bucket);
                Ok(())
            }
        }
    }

    fn value_in(&self, scope: &Scope) -> Result<Value> {
        let mut rows = Vec::with_capacity(self.buckets.len());
        for (key, bucket) in &self.buckets {
            rows.push(bucket.value_in(&self.bucket_scope(scope, key))?);
        }
        self.spec.clauses.sort(&mut rows)?;
        if let Some(having) = &self.spec.having {
            retain_values(&mut rows, having)?;
        }
        if let Some(key) = &self.spec.post_sort_key {
            sort_values(&mut rows, key)?;
        }
        debug!(
            "group-by value: {} of {} buckets kept",
            rows.len(),
            self.buckets.len()
        );
        Ok(Value::List(rows))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::GroupBy
    }

    fn name(&self) -> &'static str {
        "GroupBy"
    }
}

impl<R> fmt::Debug for GroupByNode<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupByNode")
            .field("spec", &self.spec)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::aggregator::AggregatorSpec;
    use crate::spec::FieldSpec;

    fn rec(g: &str, v: i64) -> Value {
        Value::from_iter([("g", Value::from(g)), ("v", Value::from(v))])
    }

    fn sum_of(field: &'static str) -> AggregatorSpec<Value> {
        AggregatorSpec::new(0i64, move |acc: &Value, r: &Value| acc.checked_add(&r.field(field)?))
    }

    fn by_g() -> GroupBySpec<Value> {
        GroupBySpec::new(|r: &Value| r.field("g"), StructSpec::new().field("sum", sum_of("v")))
            .key_field("g")
    }

    #[test]
    fn test_buckets_are_isolated() {
        let mut node = by_g().build().unwrap();
        node.feed_many(&[rec("a", 1), rec("b", 2), rec("a", 3)]).unwrap();
        let expected = Value::from(vec![
            Value::from_iter([("g", Value::from("a")), ("sum", Value::from(4i64))]),
            Value::from_iter([("g", Value::from("b")), ("sum", Value::from(2i64))]),
        ]);
        assert_eq!(node.value().unwrap(), expected);
        assert_eq!(node.len(), 2);
    }

    #[test]
    fn test_having_sees_computed_then_post_sort() {
        let template = StructSpec::new()
            .field("sum", sum_of("v"))
            .computed("double", |scope| scope.get("sum")?.checked_add(scope.get("sum")?));
        let mut node = GroupBySpec::new(|r: &Value| r.field("g"), template)
            .key_field("g")
            .having(|row| Ok(row.get("double") > Some(&Value::Int(4))))
            .post_sort_key(|row| {
                Ok(Value::Int(-row.get("sum").and_then(Value::as_i64).unwrap_or(0)))
            })
            .build()
            .unwrap();
        node.feed_many(&[rec("a", 3), rec("b", 1), rec("c", 5), rec("a", 1)])
            .unwrap();
        let keys: Vec<_> = node
            .value()
            .unwrap()
            .as_list()
            .unwrap()
            .iter()
            .map(|row| row.get("g").cloned().unwrap())
            .collect();
        assert_eq!(keys, vec![Value::from("c"), Value::from("a")]);
    }

    #[test]
    fn test_sort_key_orders_buckets() {
        let mut node = by_g()
            .sort_key(|row| row.field("g"))
            .build()
            .unwrap();
        node.feed_many(&[rec("b", 1), rec("a", 2)]).unwrap();
        let first = node.value().unwrap().as_list().unwrap()[0].clone();
        assert_eq!(first.get("g"), Some(&Value::from("a")));
        // bucket order itself is untouched
        assert_eq!(node.keys().next(), Some(&Value::from("b")));
    }

    #[test]
    fn test_empty_input_yields_empty_list() {
        let node = by_g().build().unwrap();
        assert_eq!(node.value().unwrap(), Value::List(vec![]));
        assert!(node.is_empty());
    }

    #[test]
    fn test_prefilter_skips_records() {
        let mut node = by_g()
            .prefilter(|r: &Value| Ok(r.field("v")?.as_i64() != Some(2)))
            .build()
            .unwrap();
        node.feed_many(&[rec("a", 1), rec("b", 2)]).unwrap();
        assert_eq!(node.len(), 1);
        assert!(matches!(
            node.bucket(&Value::from("b")),
            Err(Error::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_field_grouping_fills_slots() {
        let template = StructSpec::new()
            .grouping_field("g")
            .grouping_field("v")
            .field(
                "n",
                AggregatorSpec::new(0i64, |acc: &Value, _: &Value| acc.checked_add(&Value::Int(1))),
            );
        let mut node = GroupBySpec::by_fields(template).build().unwrap();
        node.feed_many(&[rec("a", 1), rec("a", 1), rec("a", 2)]).unwrap();
        let key = Value::from(vec![Value::from("a"), Value::from(1i64)]);
        let bucket = node.bucket_value(&key).unwrap();
        assert_eq!(bucket.get("g"), Some(&Value::from("a")));
        assert_eq!(bucket.get("v"), Some(&Value::Int(1)));
        assert_eq!(bucket.get("n"), Some(&Value::Int(2)));
        assert_eq!(node.len(), 2);
    }

    #[test]
    fn test_field_grouping_without_slots_is_construction_error() {
        let template = StructSpec::<Value>::new().field("sum", sum_of("v"));
        let err = GroupBySpec::by_fields(template).build().unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn test_key_field_collision_is_construction_error() {
        let template = StructSpec::new().field("g", sum_of("v"));
        let err = GroupBySpec::new(|r: &Value| r.field("g"), template)
            .key_field("g")
            .build()
            .unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn test_nested_groups_see_outer_keys() {
        let inner = GroupBySpec::new(
            |r: &Value| r.field("v"),
            StructSpec::new()
                .group_key("outer", 1)
                .group_key("inner", 0)
                .field("sum", sum_of("v")),
        );
        let outer = StructSpec::new().field("by_v", inner);
        let mut node = GroupBySpec::new(|r: &Value| r.field("g"), outer).build().unwrap();
        node.feed_many(&[rec("a", 1), rec("a", 1), rec("b", 2)]).unwrap();
        let a = node.bucket_value(&Value::from("a")).unwrap();
        let row = &a.get("by_v").and_then(Value::as_list).unwrap()[0];
        assert_eq!(row.get("outer"), Some(&Value::from("a")));
        assert_eq!(row.get("inner"), Some(&Value::Int(1)));
        assert_eq!(row.get("sum"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_sequence_grouping_one_bucket_per_record() {
        let mut node = GroupBySpec::sequence(
            StructSpec::new()
                .group_key("key", 0)
                .field("v", sum_of("v")),
        )
        .build()
        .unwrap();
        node.feed_many(&[rec("a", 1), rec("a", 1)]).unwrap();
        let rows = node.value().unwrap();
        assert_eq!(rows.as_list().map(<[Value]>::len), Some(2));
        assert_eq!(rows.as_list().unwrap()[1].get("key"), Some(&Value::Null));
    }

    #[test]
    fn test_failed_first_record_creates_no_bucket() {
        let mut node = by_g().build().unwrap();
        node.feed(&rec("a", 1)).unwrap();
        let bad = Value::from_iter([("g", Value::from("z")), ("v", Value::from("x"))]);
        assert!(matches!(node.feed(&bad), Err(Error::TypeMismatch { .. })));
        assert_eq!(node.len(), 1);
        assert!(matches!(
            node.bucket(&Value::from("z")),
            Err(Error::UnknownGroup(_))
        ));
        node.feed(&rec("z", 2)).unwrap();
        let z = node.bucket_value(&Value::from("z")).unwrap();
        assert_eq!(z.get("sum"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_nested_spec_shared_across_buckets() {
        let inner = Arc::new(GroupBySpec::new(
            |r: &Value| r.field("v"),
            StructSpec::new().field("sum", sum_of("v")),
        ));
        let outer = GroupBySpec::new(
            |r: &Value| r.field("g"),
            StructSpec::new().field("by_v", FieldSpec::GroupBy(Arc::clone(&inner))),
        );
        let mut node = outer.build().unwrap();
        drop(outer);
        // this handle plus the template held by the built node
        assert_eq!(Arc::strong_count(&inner), 2);
        node.feed_many(&[rec("a", 1), rec("b", 2), rec("c", 3)]).unwrap();
        assert_eq!(Arc::strong_count(&inner), 5);
    }

    #[test]
    fn test_nested_template_checked_at_outer_build() {
        let inner = GroupBySpec::new(
            |r: &Value| r.field("v"),
            StructSpec::new().field("v", sum_of("v")),
        )
        .key_field("v");
        let err = GroupBySpec::new(
            |r: &Value| r.field("g"),
            StructSpec::new().field("inner", inner),
        )
        .build()
        .unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn test_int_and_float_keys_are_distinct() {
        let mut node = by_g().build().unwrap();
        let int_key = Value::from_iter([("g", Value::Int(1)), ("v", Value::Int(2))]);
        let float_key = Value::from_iter([("g", Value::Float(1.0)), ("v", Value::Int(3))]);
        node.feed_many(&[int_key, float_key]).unwrap();
        assert_eq!(node.len(), 2);
        let float = node.bucket_value(&Value::Float(1.0)).unwrap();
        assert_eq!(float.get("sum"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_failing_key_propagates() {
        let mut node = by_g().build().unwrap();
        let record = Value::from_iter([("v", Value::from(1i64))]);
        assert_eq!(node.feed(&record).err(), Some(Error::MissingField("g".into())));
        assert!(node.is_empty());
    }
}
