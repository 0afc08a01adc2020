//! Ready-made fields for record trees.
//!
//! Thin constructors over the core contract: every helper returns an ordinary
//! `AggregatorSpec` or `GroupBySpec` that can be refined with further clauses.

mod aggregates;
mod grouping;


pub use aggregates::{avg, collect, count, first, last, list, max, min, sum};
pub use grouping::{group_by_field, group_by_fields, list_of};
