//! Node trait and related types for the aggregation tree.
//!
//! Every node of a tree implements [`Node`]: it accepts records one at a time
//! and can be asked for its current structural value any number of times.
//! Nodes are instantiated from declarative specs (see [`crate::spec`]) and
//! stored type-erased as [`BoxedNode`] inside their parent.

use std::fmt;

use crate::error::Result;
use crate::scope::Scope;
use crate::value::Value;

/// The node variants a struct distinguishes when it partitions its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Constant,
    Computed,
    Aggregator,
    Struct,
    GroupBy,
}

impl NodeKind {
    /// Whether records are forwarded to nodes of this kind.
    pub fn is_fed(self) -> bool {
        matches!(self, NodeKind::Aggregator | NodeKind::Struct | NodeKind::GroupBy)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Constant => "constant",
            NodeKind::Computed => "computed",
            NodeKind::Aggregator => "aggregator",
            NodeKind::Struct => "struct",
            NodeKind::GroupBy => "group-by",
        };
        f.write_str(name)
    }
}

/// Core trait for aggregation nodes.
///
/// `accept` and `value_in` are the object-safe primitives parents call on
/// their children. Callers holding a concrete node (or a [`BoxedNode`]) use
/// the chaining `feed` / `feed_many` and the root-scoped `value`.
///
/// # Example
///
/// ```ignore
/// let mut total = AggregatorSpec::new(0i64, |acc: &Value, r: &i64| acc.checked_add(&Value::from(*r)))
///     .build();
/// total.feed(&1)?.feed(&2)?;
/// assert_eq!(total.value()?, Value::Int(3));
/// ```
pub trait Node<R>: Send {
    /// Process one record. Errors abort this record only.
    fn accept(&mut self, record: &R) -> Result<()>;

    /// Current value, resolved against `scope`.
    ///
    /// Reading never changes node state; two reads without an intervening
    /// `accept` return equal values.
    fn value_in(&self, scope: &Scope) -> Result<Value>;

    fn kind(&self) -> NodeKind;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Feed one record, returning the node for chaining.
    fn feed(&mut self, record: &R) -> Result<&mut Self>
    where
        Self: Sized,
    {
        self.accept(record)?;
        Ok(self)
    }

    /// Feed every record of `records` in order, stopping at the first error.
    fn feed_many<'a, I>(&mut self, records: I) -> Result<&mut Self>
    where
        Self: Sized,
        I: IntoIterator<Item = &'a R>,
        R: 'a,
    {
        for record in records {
            self.accept(record)?;
        }
        Ok(self)
    }

    /// Value of this node as a tree root.
    fn value(&self) -> Result<Value>
    where
        Self: Sized,
    {
        self.value_in(&Scope::root())
    }
}

/// A type-erased node owned by its parent.
pub type BoxedNode<R> = Box<dyn Node<R>>;

impl<R> Node<R> for BoxedNode<R> {
    fn accept(&mut self, record: &R) -> Result<()> {
        (**self).accept(record)
    }

    fn value_in(&self, scope: &Scope) -> Result<Value> {
        (**self).value_in(scope)
    }

    fn kind(&self) -> NodeKind {
        (**self).kind()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
