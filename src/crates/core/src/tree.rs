//! Tree entry point: one root node built from a spec, fed and read by callers.

use std::fmt;

use log::debug;

use crate::error::Result;
use crate::node::{BoxedNode, Node, NodeKind};
use crate::scope::Scope;
use crate::spec::FieldSpec;
use crate::value::Value;

/// A fully instantiated aggregation tree.
///
/// # Example
///
/// ```ignore
/// let mut tree = Tree::new(StructSpec::new().field("total", sum("v")))?;
/// tree.feed_many(&records)?;
/// let report = tree.value()?;
/// ```
pub struct Tree<R> {
    root: BoxedNode<R>,
    records: usize,
}

impl<R: 'static> Tree<R> {
    /// Instantiate `spec`. Every construction error is reported here.
    pub fn new(spec: impl Into<FieldSpec<R>>) -> Result<Self> {
        let spec = spec.into();
        let root = spec.instantiate()?;
        debug!("built tree with {} root", root.kind());
        Ok(Self { root, records: 0 })
    }

    /// Records handed to `accept`, including ones that failed or were
    /// filtered out.
    pub fn records_fed(&self) -> usize {
        self.records
    }

    pub fn root(&self) -> &BoxedNode<R> {
        &self.root
    }
}

impl<R: 'static> Node<R> for Tree<R> {
    fn accept(&mut self, record: &R) -> Result<()> {
        self.records += 1;
        self.root.accept(record)
    }

    fn value_in(&self, scope: &Scope) -> Result<Value> {
        let value = self.root.value_in(scope)?;
        debug!("extracted tree value after {} records", self.records);
        Ok(value)
    }

    fn kind(&self) -> NodeKind {
        self.root.kind()
    }

    fn name(&self) -> &'static str {
        "Tree"
    }
}

impl<R> fmt::Debug for Tree<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.root.name())
            .field("records", &self.records)
            .finish()
    }
}
