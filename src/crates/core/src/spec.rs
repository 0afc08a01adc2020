//! Declarative field specifications.
//!
//! A tree is described once as a graph of specs and instantiated into live
//! nodes. Group nodes keep their bucket template as a spec and instantiate a
//! fresh, independently owned struct for every new key, so no two buckets
//! ever share aggregator state.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::node::BoxedNode;
use crate::ops::aggregator::AggregatorSpec;
use crate::ops::computed::{ComputeFn, ComputedNode};
use crate::ops::constant::{ConstantNode, GroupKeyNode};
use crate::ops::group_by::{GroupByNode, GroupBySpec};
use crate::ops::structure::{Injection, StructSpec};
use crate::scope::Scope;
use crate::value::Value;

/// Description of one field (or of a whole tree).
pub enum FieldSpec<R> {
    Constant(Value),
    Computed(ComputeFn),
    /// Key of the enclosing bucket this many group levels out.
    GroupKey(usize),
    /// Slot filled with a key component by a field-grouped group node.
    GroupingField,
    Aggregator(AggregatorSpec<R>),
    Struct(StructSpec<R>),
    /// Shared, so nested copies of a group template never deep-copy it.
    GroupBy(Arc<GroupBySpec<R>>),
}

impl<R: 'static> FieldSpec<R> {
    pub fn constant(value: impl Into<Value>) -> Self {
        FieldSpec::Constant(value.into())
    }

    pub fn computed<F>(fnc: F) -> Self
    where
        F: Fn(&Scope) -> Result<Value> + Send + Sync + 'static,
    {
        FieldSpec::Computed(Arc::new(fnc))
    }

    pub fn group_key(level: usize) -> Self {
        FieldSpec::GroupKey(level)
    }

    /// Check this spec and every spec nested in it.
    pub fn validate(&self) -> Result<()> {
        match self {
            FieldSpec::GroupingField => Err(Error::construction(
                "grouping field declared outside a field-grouped group-by",
            )),
            FieldSpec::Struct(spec) => spec.validate(),
            FieldSpec::GroupBy(spec) => spec.validate(),
            _ => Ok(()),
        }
    }

    /// Instantiate a fresh node graph for this spec.
    pub fn instantiate(&self) -> Result<BoxedNode<R>> {
        self.validate()?;
        self.node()
    }

    /// Node graph for an already validated spec. Group nodes share their
    /// spec with this one instead of copying it.
    pub(crate) fn node(&self) -> Result<BoxedNode<R>> {
        let node: BoxedNode<R> = match self {
            FieldSpec::Constant(value) => Box::new(ConstantNode::new(value.clone())),
            FieldSpec::Computed(fnc) => Box::new(ComputedNode::new(Arc::clone(fnc))),
            FieldSpec::GroupKey(level) => Box::new(GroupKeyNode::new(*level)),
            FieldSpec::GroupingField => {
                return Err(Error::construction(
                    "grouping field declared outside a field-grouped group-by",
                ));
            }
            FieldSpec::Aggregator(spec) => Box::new(spec.build()),
            FieldSpec::Struct(spec) => Box::new(spec.instantiate(&Injection::default())?),
            FieldSpec::GroupBy(spec) => Box::new(GroupByNode::new(Arc::clone(spec))),
        };
        Ok(node)
    }
}

impl<R> Clone for FieldSpec<R> {
    fn clone(&self) -> Self {
        match self {
            FieldSpec::Constant(value) => FieldSpec::Constant(value.clone()),
            FieldSpec::Computed(fnc) => FieldSpec::Computed(Arc::clone(fnc)),
            FieldSpec::GroupKey(level) => FieldSpec::GroupKey(*level),
            FieldSpec::GroupingField => FieldSpec::GroupingField,
            FieldSpec::Aggregator(spec) => FieldSpec::Aggregator(spec.clone()),
            FieldSpec::Struct(spec) => FieldSpec::Struct(spec.clone()),
            FieldSpec::GroupBy(spec) => FieldSpec::GroupBy(Arc::clone(spec)),
        }
    }
}

impl<R> fmt::Debug for FieldSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSpec::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            FieldSpec::Computed(_) => f.write_str("Computed"),
            FieldSpec::GroupKey(level) => f.debug_tuple("GroupKey").field(level).finish(),
            FieldSpec::GroupingField => f.write_str("GroupingField"),
            FieldSpec::Aggregator(spec) => fmt::Debug::fmt(spec, f),
            FieldSpec::Struct(spec) => fmt::Debug::fmt(spec, f),
            FieldSpec::GroupBy(spec) => fmt::Debug::fmt(spec, f),
        }
    }
}

impl<R> From<Value> for FieldSpec<R> {
    fn from(value: Value) -> Self {
        FieldSpec::Constant(value)
    }
}

impl<R> From<AggregatorSpec<R>> for FieldSpec<R> {
    fn from(spec: AggregatorSpec<R>) -> Self {
        FieldSpec::Aggregator(spec)
    }
}

impl<R> From<StructSpec<R>> for FieldSpec<R> {
    fn from(spec: StructSpec<R>) -> Self {
        FieldSpec::Struct(spec)
    }
}

impl<R> From<GroupBySpec<R>> for FieldSpec<R> {
    fn from(spec: GroupBySpec<R>) -> Self {
        FieldSpec::GroupBy(Arc::new(spec))
    }
}
