//! Batches: contiguous, 1-indexed slices of validated records.

use crate::core::Record;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// A bounded slice of records sent to the sink in one call.
///
/// Cloning is cheap: retries resend the same rows without copying them.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    ordinal: usize,
    rows: Arc<[Record]>,
}

impl Batch {
    /// Creates a batch. `ordinal` is 1-indexed.
    pub fn new(ordinal: usize, rows: Vec<Record>) -> Self {
        Self {
            ordinal,
            rows: rows.into(),
        }
    }

    /// Position of this batch in the load, starting at 1.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The rows of this batch.
    #[must_use]
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the batch has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Splits `records` into `ceil(n / size)` batches.
///
/// Every batch except possibly the last holds exactly `size` records;
/// concatenating the batches yields `records` in the original order.
#[must_use]
pub fn split_batches(records: Vec<Record>, size: NonZeroUsize) -> Vec<Batch> {
    let mut batches = Vec::with_capacity(records.len().div_ceil(size.get()));
    let mut rows = records.into_iter().peekable();

    while rows.peek().is_some() {
        let chunk: Vec<Record> = rows.by_ref().take(size.get()).collect();
        batches.push(Batch::new(batches.len() + 1, chunk));
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut r = Record::new();
                r.insert("id".into(), json!(i));
                r
            })
            .collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_split_sizes() {
        for (n, b, expected) in [
            (0, 3, vec![]),
            (1, 3, vec![1]),
            (3, 3, vec![3]),
            (7, 3, vec![3, 3, 1]),
            (2500, 1000, vec![1000, 1000, 500]),
            (4, 1, vec![1, 1, 1, 1]),
        ] {
            let lens: Vec<usize> = split_batches(records(n), size(b))
                .iter()
                .map(Batch::len)
                .collect();
            assert_eq!(lens, expected, "n={n} b={b}");
        }
    }

    #[test]
    fn test_split_preserves_order_and_ordinals() {
        let input = records(7);
        let batches = split_batches(input.clone(), size(3));

        let ordinals: Vec<_> = batches.iter().map(Batch::ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);

        let rejoined: Vec<Record> = batches.iter().flat_map(|b| b.rows().to_vec()).collect();
        assert_eq!(rejoined, input);
    }

    #[test]
    fn test_batch_clone_shares_rows() {
        let batch = Batch::new(1, records(2));
        let copy = batch.clone();
        assert!(std::ptr::eq(batch.rows().as_ptr(), copy.rows().as_ptr()));
        assert!(!batch.is_empty());
    }
}
