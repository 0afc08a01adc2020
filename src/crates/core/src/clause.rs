//! Filter and sort clauses.
//!
//! - prefilter: per-record eligibility, checked before a record is aggregated
//! - sort key: orders a materialized list once, at value-extraction time
//! - having: eligibility of a finalized group value
//!
//! Sorting is stable and evaluates each key once (decorate, sort, undecorate),
//! so fallible key functions fail before anything is reordered.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::value::Value;

/// Record predicate.
pub type Predicate<R> = Arc<dyn Fn(&R) -> Result<bool> + Send + Sync>;
/// Record -> key, used for grouping.
pub type KeyFn<R> = Arc<dyn Fn(&R) -> Result<Value> + Send + Sync>;
/// Materialized value -> sort key.
pub type SortKey = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;
/// Materialized value predicate, used for `having`.
pub type ValuePredicate = Arc<dyn Fn(&Value) -> Result<bool> + Send + Sync>;

/// Clauses every fed node may carry.
pub struct Clauses<R> {
    pub prefilter: Option<Predicate<R>>,
    pub sort_key: Option<SortKey>,
}

impl<R> Clauses<R> {
    /// Whether `record` passes the prefilter. No prefilter admits everything.
    pub fn admits(&self, record: &R) -> Result<bool> {
        match &self.prefilter {
            Some(pred) => pred(record),
            None => Ok(true),
        }
    }

    /// Apply the sort key, if any, to a materialized list.
    pub fn sort(&self, values: &mut Vec<Value>) -> Result<()> {
        match &self.sort_key {
            Some(key) => sort_values(values, key),
            None => Ok(()),
        }
    }
}

impl<R> Default for Clauses<R> {
    fn default() -> Self {
        Self {
            prefilter: None,
            sort_key: None,
        }
    }
}

impl<R> Clone for Clauses<R> {
    fn clone(&self) -> Self {
        Self {
            prefilter: self.prefilter.clone(),
            sort_key: self.sort_key.clone(),
        }
    }
}

impl<R> fmt::Debug for Clauses<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clauses")
            .field("prefilter", &self.prefilter.is_some())
            .field("sort_key", &self.sort_key.is_some())
            .finish()
    }
}

/// Stable sort of `values` by `key`.
pub fn sort_values(values: &mut Vec<Value>, key: &SortKey) -> Result<()> {
    let mut keyed = std::mem::take(values)
        .into_iter()
        .map(|v| Ok((key(&v)?, v)))
        .collect::<Result<Vec<(Value, Value)>>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    values.extend(keyed.into_iter().map(|(_, v)| v));
    Ok(())
}

/// Keep the values `pred` accepts, in order.
pub fn retain_values(values: &mut Vec<Value>, pred: &ValuePredicate) -> Result<()> {
    let mut kept = Vec::with_capacity(values.len());
    for v in std::mem::take(values) {
        if pred(&v)? {
            kept.push(v);
        }
    }
    *values = kept;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn ints(xs: &[i64]) -> Vec<Value> {
        xs.iter().map(|x| Value::Int(*x)).collect()
    }

    #[test]
    fn test_sort_is_stable() {
        let mut values: Vec<Value> = vec![
            [("k", 2), ("i", 0)].into_iter().collect(),
            [("k", 1), ("i", 1)].into_iter().collect(),
            [("k", 2), ("i", 2)].into_iter().collect(),
            [("k", 1), ("i", 3)].into_iter().collect(),
        ];
        let key: SortKey = Arc::new(|v: &Value| Ok(v.get("k").cloned().unwrap_or_default()));
        sort_values(&mut values, &key).unwrap();
        let order: Vec<_> = values.iter().map(|v| v.get("i").cloned().unwrap()).collect();
        assert_eq!(order, ints(&[1, 3, 0, 2]));
    }

    #[test]
    fn test_failing_sort_key_propagates() {
        let mut values = ints(&[3, 1]);
        let key: SortKey = Arc::new(|_: &Value| Err(Error::callback("boom")));
        assert_eq!(sort_values(&mut values, &key), Err(Error::Callback("boom".into())));
    }

    #[test]
    fn test_retain_values() {
        let mut values = ints(&[1, 2, 3, 4]);
        let even: ValuePredicate = Arc::new(|v: &Value| Ok(v.as_i64().unwrap_or(1) % 2 == 0));
        retain_values(&mut values, &even).unwrap();
        assert_eq!(values, ints(&[2, 4]));
    }

    #[test]
    fn test_missing_prefilter_admits_everything() {
        let clauses = Clauses::<i64>::default();
        assert!(clauses.admits(&7).unwrap());
    }
}
