use std::collections::HashMap;

use concord_core::Transaction;

/// Buckets transaction positions by amount in whole cents.
///
/// Positions refer to the slice the index was built from, so the caller keeps
/// ownership of the records and the index stays cheap to build per run.
#[derive(Debug, Default)]
pub struct AmountIndex {
    buckets: HashMap<i64, Vec<usize>>,
}

impl AmountIndex {
    pub fn build<'t, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'t Transaction>,
    {
        let mut buckets: HashMap<i64, Vec<usize>> = HashMap::new();
        for (pos, tx) in transactions.into_iter().enumerate() {
            buckets.entry(tx.amount_cents()).or_default().push(pos);
        }
        Self { buckets }
    }

    /// Positions whose amount is within `radius_cents` of `amount_cents`,
    /// lowest key first, insertion order within a key.
    pub fn lookup(&self, amount_cents: i64, radius_cents: i64) -> Vec<usize> {
        let radius = radius_cents.max(0);
        (amount_cents.saturating_sub(radius)..=amount_cents.saturating_add(radius))
            .filter_map(|key| self.buckets.get(&key))
            .flatten()
            .copied()
            .collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
