//! Constant fields.
//!
//! Constant nodes are never fed. A `ConstantNode` holds a literal (report
//! titles, bucket keys injected by a group node); a `GroupKeyNode` reads the
//! key of an enclosing bucket from the resolution scope.

use crate::error::Result;
use crate::node::{Node, NodeKind};
use crate::scope::Scope;
use crate::value::Value;

/// Node with a fixed value.
#[derive(Debug, Clone)]
pub struct ConstantNode {
    value: Value,
}

impl ConstantNode {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl<R> Node<R> for ConstantNode {
    fn accept(&mut self, _record: &R) -> Result<()> {
        Ok(())
    }

    fn value_in(&self, _scope: &Scope) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Constant
    }

    fn name(&self) -> &'static str {
        "Constant"
    }
}

/// Node resolving to the key of the bucket `level` group levels out.
///
/// Level 0 is the innermost enclosing bucket. Outside of any group (or past
/// the outermost one) the value is `Null`.
#[derive(Debug, Clone, Copy)]
pub struct GroupKeyNode {
    level: usize,
}

impl GroupKeyNode {
    pub fn new(level: usize) -> Self {
        Self { level }
    }
}

impl<R> Node<R> for GroupKeyNode {
    fn accept(&mut self, _record: &R) -> Result<()> {
        Ok(())
    }

    fn value_in(&self, scope: &Scope) -> Result<Value> {
        Ok(scope.group_key(self.level).cloned().unwrap_or_default())
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Constant
    }

    fn name(&self) -> &'static str {
        "GroupKey"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_ignores_records() {
        let mut node = ConstantNode::new("X001");
        Node::<i32>::feed_many(&mut node, &[1, 2, 3]).unwrap();
        assert_eq!(Node::<i32>::value(&node).unwrap(), Value::from("X001"));
    }

    #[test]
    fn test_group_key_levels() {
        let scope = Scope::root()
            .enter_group(Value::from("outer"))
            .enter_group(Value::from("inner"));
        let inner = GroupKeyNode::new(0);
        let outer = GroupKeyNode::new(1);
        let missing = GroupKeyNode::new(2);
        assert_eq!(Node::<()>::value_in(&inner, &scope).unwrap(), Value::from("inner"));
        assert_eq!(Node::<()>::value_in(&outer, &scope).unwrap(), Value::from("outer"));
        assert_eq!(Node::<()>::value_in(&missing, &scope).unwrap(), Value::Null);
    }
}
