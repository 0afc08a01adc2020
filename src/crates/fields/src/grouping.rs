//! Group-by shorthands.

use record_tree_core::{GroupBySpec, Record, StructSpec};

/// Group by the record fields the template declares as grouping fields.
///
/// Each bucket's grouping-field slots hold that bucket's key components.
pub fn group_by_fields<R: Record + 'static>(template: StructSpec<R>) -> GroupBySpec<R> {
    GroupBySpec::by_fields(template)
}

/// Group by a single record field, exposing it under the same name as the
/// first field of every bucket.
pub fn group_by_field<R: Record + 'static>(field: &str, template: StructSpec<R>) -> GroupBySpec<R> {
    let name = field.to_string();
    GroupBySpec::new(move |record: &R| record.field(&name), template).key_field(field)
}

/// One struct per record, in arrival order.
pub fn list_of<R: 'static>(template: StructSpec<R>) -> GroupBySpec<R> {
    GroupBySpec::sequence(template)
}
