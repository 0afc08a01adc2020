//! Leaf aggregators: fold a record stream into one accumulator.

use std::fmt;
use std::sync::Arc;

use crate::clause::Clauses;
use crate::error::Result;
use crate::node::{Node, NodeKind};
use crate::scope::Scope;
use crate::value::Value;

/// Pure fold: the accumulator is replaced by the result.
pub type FoldFn<R> = Arc<dyn Fn(&Value, &R) -> Result<Value> + Send + Sync>;
/// In-place fold, for accumulators too large to rebuild per record.
pub type FoldInPlaceFn<R> = Arc<dyn Fn(&mut Value, &R) -> Result<()> + Send + Sync>;
/// Value-time post-processing of the accumulator.
pub type FinishFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

enum Fold<R> {
    Replace(FoldFn<R>),
    InPlace(FoldInPlaceFn<R>),
}

impl<R> Clone for Fold<R> {
    fn clone(&self) -> Self {
        match self {
            Fold::Replace(f) => Fold::Replace(Arc::clone(f)),
            Fold::InPlace(f) => Fold::InPlace(Arc::clone(f)),
        }
    }
}

/// Declarative description of a leaf aggregator.
///
/// # Example
///
/// ```ignore
/// // sum of the even records
/// let even_sum = AggregatorSpec::new(0i64, |acc: &Value, r: &i64| acc.checked_add(&Value::from(*r)))
///     .prefilter(|r: &i64| Ok(r % 2 == 0));
/// ```
pub struct AggregatorSpec<R> {
    initial: Value,
    fold: Fold<R>,
    clauses: Clauses<R>,
    finish: Option<FinishFn>,
}

impl<R: 'static> AggregatorSpec<R> {
    /// Aggregator starting at `initial` and folding with `fold`.
    ///
    /// If `fold` fails, the accumulator keeps its value from before the record.
    pub fn new<F>(initial: impl Into<Value>, fold: F) -> Self
    where
        F: Fn(&Value, &R) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            initial: initial.into(),
            fold: Fold::Replace(Arc::new(fold)),
            clauses: Clauses::default(),
            finish: None,
        }
    }

    /// Aggregator mutating its accumulator in place.
    ///
    /// A failing fold may leave the accumulator partially updated; folds that
    /// compute everything fallible before mutating avoid that.
    pub fn in_place<F>(initial: impl Into<Value>, fold: F) -> Self
    where
        F: Fn(&mut Value, &R) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            initial: initial.into(),
            fold: Fold::InPlace(Arc::new(fold)),
            clauses: Clauses::default(),
            finish: None,
        }
    }

    /// Only records for which `pred` holds reach the fold.
    pub fn prefilter<P>(mut self, pred: P) -> Self
    where
        P: Fn(&R) -> Result<bool> + Send + Sync + 'static,
    {
        self.clauses.prefilter = Some(Arc::new(pred));
        self
    }

    /// Order a list accumulator by `key` when the value is read.
    ///
    /// Non-list accumulators are left as they are.
    pub fn sort_key<K>(mut self, key: K) -> Self
    where
        K: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.clauses.sort_key = Some(Arc::new(key));
        self
    }

    /// Transform the (sorted) accumulator when the value is read.
    pub fn finish<F>(mut self, finish: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.finish = Some(Arc::new(finish));
        self
    }

    pub fn initial(&self) -> &Value {
        &self.initial
    }

    /// Fresh node in its initial state.
    pub fn build(&self) -> AggregatorNode<R> {
        AggregatorNode {
            acc: self.initial.clone(),
            spec: self.clone(),
        }
    }
}

impl<R> Clone for AggregatorSpec<R> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            fold: self.fold.clone(),
            clauses: self.clauses.clone(),
            finish: self.finish.clone(),
        }
    }
}

impl<R> fmt::Debug for AggregatorSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fold = match self.fold {
            Fold::Replace(_) => "replace",
            Fold::InPlace(_) => "in-place",
        };
        f.debug_struct("AggregatorSpec")
            .field("initial", &self.initial)
            .field("fold", &fold)
            .field("clauses", &self.clauses)
            .field("finish", &self.finish.is_some())
            .finish()
    }
}

/// Running state of a leaf aggregator.
pub struct AggregatorNode<R> {
    spec: AggregatorSpec<R>,
    acc: Value,
}

impl<R> AggregatorNode<R> {
    /// The raw accumulator, before sorting and `finish`.
    pub fn accumulator(&self) -> &Value {
        &self.acc
    }
}

impl<R> Node<R> for AggregatorNode<R> {
    fn accept(&mut self, record: &R) -> Result<()> {
        if !self.spec.clauses.admits(record)? {
            return Ok(());
        }
        match &self.spec.fold {
            Fold::Replace(fold) => self.acc = fold(&self.acc, record)?,
            Fold::InPlace(fold) => fold(&mut self.acc, record)?,
        }
        Ok(())
    }

    fn value_in(&self, _scope: &Scope) -> Result<Value> {
        let mut value = self.acc.clone();
        if let Value::List(items) = &mut value {
            self.spec.clauses.sort(items)?;
        }
        match &self.spec.finish {
            Some(finish) => finish(value),
            None => Ok(value),
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Aggregator
    }

    fn name(&self) -> &'static str {
        "Aggregator"
    }
}

impl<R> fmt::Debug for AggregatorNode<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatorNode")
            .field("spec", &self.spec)
            .field("acc", &self.acc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sum() -> AggregatorSpec<i64> {
        AggregatorSpec::new(0i64, |acc: &Value, r: &i64| acc.checked_add(&Value::Int(*r)))
    }

    fn collect() -> AggregatorSpec<i64> {
        AggregatorSpec::in_place(Value::List(vec![]), |acc: &mut Value, r: &i64| {
            if let Value::List(items) = acc {
                items.push(Value::Int(*r));
            }
            Ok(())
        })
    }

    #[test]
    fn test_untouched_aggregator_yields_initial() {
        assert_eq!(sum().build().value().unwrap(), Value::Int(0));
        assert_eq!(collect().build().value().unwrap(), Value::List(vec![]));
    }

    #[test]
    fn test_prefilter_before_fold() {
        let mut node = sum().prefilter(|r| Ok(r % 2 == 0)).build();
        node.feed_many(&[1, 2, 3, 4]).unwrap();
        assert_eq!(node.value().unwrap(), Value::Int(6));
    }

    #[test]
    fn test_reads_are_idempotent() {
        let mut node = collect().sort_key(|v| Ok(Value::Int(-v.as_i64().unwrap_or(0)))).build();
        node.feed(&1).unwrap().feed(&3).unwrap().feed(&2).unwrap();
        let first = node.value().unwrap();
        assert_eq!(first, Value::from(vec![3i64, 2, 1]));
        assert_eq!(node.value().unwrap(), first);
        // sorting happens on the read copy only
        assert_eq!(node.accumulator(), &Value::from(vec![1i64, 3, 2]));
    }

    #[test]
    fn test_finish_after_sort() {
        let mut node = collect()
            .sort_key(|v| Ok(Value::Int(-v.as_i64().unwrap_or(0))))
            .finish(|v| Ok(v.as_list().and_then(|l| l.first()).cloned().unwrap_or_default()))
            .build();
        node.feed_many(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(node.value().unwrap(), Value::Int(5));
    }

    #[test]
    fn test_failed_fold_keeps_previous_state() {
        let mut node = AggregatorSpec::new(0i64, |acc: &Value, r: &i64| {
            if *r < 0 {
                return Err(Error::callback("negative input"));
            }
            acc.checked_add(&Value::Int(*r))
        })
        .build();
        node.feed_many(&[1, 2]).unwrap();
        assert_eq!(node.feed(&-1).err(), Some(Error::Callback("negative input".into())));
        assert_eq!(node.value().unwrap(), Value::Int(3));
    }

    #[test]
    fn test_failed_prefilter_propagates() {
        let mut node = sum().prefilter(|_| Err(Error::MissingField("v".into()))).build();
        assert_eq!(node.feed(&1).err(), Some(Error::MissingField("v".into())));
        assert_eq!(node.value().unwrap(), Value::Int(0));
    }
}
