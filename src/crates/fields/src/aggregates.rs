//! Leaf aggregators over a single record field.
//!
//! All of these are plain [`AggregatorSpec`]s, so clauses (`prefilter`,
//! `sort_key`, `finish`) can be chained onto them like on any hand-written
//! aggregator. Internal running state is never list-shaped, so `sort_key`
//! only ever reorders the list a helper actually returns.

use record_tree_core::{AggregatorSpec, Error, Map, Record, Result, Value};

/// Sum of `field`. Empty input sums to `0`.
pub fn sum<R: Record + 'static>(field: &str) -> AggregatorSpec<R> {
    let field = field.to_string();
    AggregatorSpec::new(0i64, move |acc: &Value, record: &R| {
        acc.checked_add(&record.field(&field)?)
    })
}

/// Number of records that reached the aggregator.
pub fn count<R: 'static>() -> AggregatorSpec<R> {
    AggregatorSpec::new(0i64, |acc: &Value, _: &R| acc.checked_add(&Value::Int(1)))
}

/// Smallest non-null value of `field`, or null.
pub fn min<R: Record + 'static>(field: &str) -> AggregatorSpec<R> {
    extreme(field, |candidate, current| candidate < current)
}

/// Largest non-null value of `field`, or null.
pub fn max<R: Record + 'static>(field: &str) -> AggregatorSpec<R> {
    extreme(field, |candidate, current| candidate > current)
}

fn extreme<R, F>(field: &str, better: F) -> AggregatorSpec<R>
where
    R: Record + 'static,
    F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
{
    let field = field.to_string();
    AggregatorSpec::new(Value::Null, move |acc: &Value, record: &R| {
        let value = record.field(&field)?;
        if value.is_null() {
            return Ok(acc.clone());
        }
        if acc.is_null() || better(&value, acc) {
            Ok(value)
        } else {
            Ok(acc.clone())
        }
    })
}

/// Arithmetic mean of `field` as a float, or null for empty input.
///
/// The accumulator is a running `{sum, count}` map; the mean is taken when
/// the value is read. A chained `sort_key` has nothing to reorder.
pub fn avg<R: Record + 'static>(field: &str) -> AggregatorSpec<R> {
    let field = field.to_string();
    let initial: Value = [("sum", 0i64), ("count", 0i64)].into_iter().collect();
    AggregatorSpec::new(initial, move |acc: &Value, record: &R| {
        let (total, n) = sum_and_count(acc)?;
        let total = total.checked_add(&record.field(&field)?)?;
        let n = n.checked_add(&Value::Int(1))?;
        Ok([("sum", total), ("count", n)].into_iter().collect())
    })
    .finish(|acc| {
        let (total, n) = sum_and_count(&acc)?;
        if n == &Value::Int(0) {
            return Ok(Value::Null);
        }
        total.checked_div(n)
    })
}

fn sum_and_count(acc: &Value) -> Result<(&Value, &Value)> {
    match (acc.get("sum"), acc.get("count")) {
        (Some(total), Some(n)) => Ok((total, n)),
        _ => Err(Error::mismatch("{sum, count}", acc)),
    }
}

/// Value of `field` in the first record, or null.
pub fn first<R: Record + 'static>(field: &str) -> AggregatorSpec<R> {
    let field = field.to_string();
    AggregatorSpec::in_place(Value::Map(Map::new()), move |acc: &mut Value, record: &R| {
        if let Value::Map(seen) = acc {
            if seen.is_empty() {
                seen.insert("first".to_string(), record.field(&field)?);
            }
        }
        Ok(())
    })
    .finish(|acc| Ok(acc.get("first").cloned().unwrap_or_default()))
}

/// Value of `field` in the last record, or null.
pub fn last<R: Record + 'static>(field: &str) -> AggregatorSpec<R> {
    let field = field.to_string();
    AggregatorSpec::new(Value::Null, move |_: &Value, record: &R| record.field(&field))
}

/// Every value of `field`, in arrival order unless a `sort_key` is chained.
pub fn list<R: Record + 'static>(field: &str) -> AggregatorSpec<R> {
    let field = field.to_string();
    AggregatorSpec::in_place(Value::List(vec![]), move |acc: &mut Value, record: &R| {
        let value = record.field(&field)?;
        if let Value::List(items) = acc {
            items.push(value);
        }
        Ok(())
    })
}

/// Every whole record, in arrival order unless a `sort_key` is chained.
pub fn collect<R>() -> AggregatorSpec<R>
where
    R: Clone + Into<Value> + 'static,
{
    AggregatorSpec::in_place(Value::List(vec![]), |acc: &mut Value, record: &R| {
        if let Value::List(items) = acc {
            items.push(record.clone().into());
        }
        Ok(())
    })
}
