//! Computed fields: values derived from already-resolved siblings.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::node::{Node, NodeKind};
use crate::scope::Scope;
use crate::value::Value;

/// Derivation function of a computed field.
pub type ComputeFn = Arc<dyn Fn(&Scope) -> Result<Value> + Send + Sync>;

/// Node deriving its value from the resolved fields of its owning struct.
///
/// Never fed. The owning struct resolves every non-computed field first and
/// then evaluates computed fields in declaration order, each one seeing the
/// siblings resolved before it.
#[derive(Clone)]
pub struct ComputedNode {
    fnc: ComputeFn,
}

impl ComputedNode {
    pub fn new(fnc: ComputeFn) -> Self {
        Self { fnc }
    }
}

impl<R> Node<R> for ComputedNode {
    fn accept(&mut self, _record: &R) -> Result<()> {
        Ok(())
    }

    fn value_in(&self, scope: &Scope) -> Result<Value> {
        (self.fnc)(scope)
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Computed
    }

    fn name(&self) -> &'static str {
        "Computed"
    }
}

impl fmt::Debug for ComputedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedNode").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_reads_siblings_from_scope() {
        let node = ComputedNode::new(Arc::new(|scope: &Scope| {
            scope.get("a")?.checked_add(scope.get("b")?)
        }));
        let mut scope = Scope::root();
        scope.resolve("a", Value::Int(1));
        scope.resolve("b", Value::Int(2));
        assert_eq!(Node::<()>::value_in(&node, &scope).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_absent_sibling_is_unresolved() {
        let node = ComputedNode::new(Arc::new(|scope: &Scope| scope.get("a").cloned()));
        assert_eq!(
            Node::<()>::value_in(&node, &Scope::root()),
            Err(Error::Unresolved("a".into()))
        );
    }
}
