//! Declarative aggregation of flat record streams into nested, ordered trees.
//!
//! The node engine lives in `record-tree-core`, the ready-made fields in
//! `record-tree-fields`. This crate re-exports both and adds the JSON
//! boundary in [`encode`].

pub mod encode;

pub use record_tree_core::*;

/// Ready-made field constructors.
pub mod fields {
    pub use record_tree_fields::*;
}
