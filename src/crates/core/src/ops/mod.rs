//! Node variants of the aggregation tree.
//!
//! - Leaves: `ConstantNode`, `GroupKeyNode`, `ComputedNode`, `AggregatorNode`
//! - Composites: `StructNode` (named fields), `GroupByNode` (keyed buckets)

pub mod aggregator;
pub mod computed;
pub mod constant;
pub mod group_by;
pub mod structure;

// Re-export commonly used items
pub use aggregator::{AggregatorNode, AggregatorSpec, FinishFn, FoldFn, FoldInPlaceFn};
pub use computed::{ComputeFn, ComputedNode};
pub use constant::{ConstantNode, GroupKeyNode};
pub use group_by::{GroupByNode, GroupBySpec, Grouping};
pub use structure::{StructNode, StructSpec};
