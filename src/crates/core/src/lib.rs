//! Incremental aggregation trees over record streams.
//!
//! A tree is declared once as nested specs (constants, computed fields, leaf
//! aggregators, structs and group-bys), instantiated, fed records one at a
//! time and read as a structural [`Value`] whenever needed. Reading never
//! consumes or resets state.
//!
//! # Example
//!
//! ```ignore
//! use record_tree_core::{AggregatorSpec, GroupBySpec, Node, Record, StructSpec, Tree, Value};
//!
//! let sum_v = AggregatorSpec::new(0i64, |acc: &Value, r: &Value| acc.checked_add(&r.field("v")?));
//! let by_g = GroupBySpec::new(|r: &Value| r.field("g"), StructSpec::new().field("sum", sum_v))
//!     .key_field("g");
//!
//! let mut tree = Tree::new(by_g)?;
//! tree.feed_many(&records)?;
//! let rows = tree.value()?;
//! ```

pub mod clause;
pub mod error;
pub mod node;
pub mod ops;
pub mod record;
pub mod scope;
pub mod spec;
pub mod tree;
pub mod value;

// Re-export main types for convenience
pub use clause::{Clauses, KeyFn, Predicate, SortKey, ValuePredicate};
pub use error::{Error, Result};
pub use node::{BoxedNode, Node, NodeKind};
pub use ops::{AggregatorNode, AggregatorSpec, GroupByNode, GroupBySpec, StructNode, StructSpec};
pub use record::Record;
pub use scope::Scope;
pub use spec::FieldSpec;
pub use tree::Tree;
pub use value::{Map, Value};
