//! Summation of counts per distinct group key
//!
//! Totals use checked `u64` arithmetic. An overflow fails the whole
//! aggregation; nothing is emitted for the affected key.

use crate::error::AggregationError;
use crate::pipeline::record::{AggregatedRecord, ClassifiedRecord, GroupKey};
use std::collections::BTreeMap;

/// Incremental per-key summation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Aggregator {
    totals: BTreeMap<GroupKey, u64>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: ClassifiedRecord) -> Result<(), AggregationError> {
        let (key, count) = record.into_parts();
        self.add_total(key, count)
    }

    /// Fold another partial result into this one
    pub fn merge(&mut self, other: Aggregator) -> Result<(), AggregationError> {
        for (key, total) in other.totals {
            self.add_total(key, total)?;
        }
        Ok(())
    }

    fn add_total(&mut self, key: GroupKey, count: u64) -> Result<(), AggregationError> {
        match self.totals.get_mut(&key) {
            Some(total) => {
                let current = *total;
                *total = current
                    .checked_add(count)
                    .ok_or_else(|| AggregationError::CounterOverflow {
                        key,
                        current,
                        increment: count,
                    })?;
            }
            None => {
                self.totals.insert(key, count);
            }
        }
        Ok(())
    }

    /// Distinct keys seen so far
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Emit one record per distinct key, in key order
    pub fn finish(self) -> Vec<AggregatedRecord> {
        self.totals
            .into_iter()
            .map(|(key, total)| AggregatedRecord { key, total })
            .collect()
    }
}

/// Sum counts of all records sharing a group key
pub fn aggregate<I>(records: I) -> Result<Vec<AggregatedRecord>, AggregationError>
where
    I: IntoIterator<Item = ClassifiedRecord>,
{
    let mut aggregator = Aggregator::new();
    for record in records {
        aggregator.add(record)?;
    }
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::record::RecordType;

    #[test]
    fn test_sums_per_key() {
        let records = vec![
            ClassifiedRecord::cooccurrence("201701", "aa", "rukc", 2),
            ClassifiedRecord::cooccurrence("201701", "aa", "rukc", 3),
            ClassifiedRecord::cooccurrence("201701", "aa", "", 5),
        ];

        let aggregated = aggregate(records).unwrap();
        assert_eq!(
            aggregated,
            vec![
                AggregatedRecord {
                    key: GroupKey::new(RecordType::Cooccurrence, "201701", "aa", ""),
                    total: 5,
                },
                AggregatedRecord {
                    key: GroupKey::new(RecordType::Cooccurrence, "201701", "aa", "rukc"),
                    total: 5,
                },
            ]
        );
    }

    #[test]
    fn test_types_never_merge() {
        let records = vec![
            ClassifiedRecord::frequency("201701", "aa", 1),
            ClassifiedRecord::cooccurrence("201701", "aa", "", 1),
        ];
        let aggregated = aggregate(records).unwrap();
        assert_eq!(aggregated.len(), 2);
        assert!(aggregated.iter().all(|r| r.total == 1));
    }

    #[test]
    fn test_buckets_never_merge() {
        let records = vec![
            ClassifiedRecord::frequency("201701", "aa", 1),
            ClassifiedRecord::frequency("201702", "aa", 1),
        ];
        assert_eq!(aggregate(records).unwrap().len(), 2);
    }

    #[test]
    fn test_max_value_without_overflow() {
        let records = vec![
            ClassifiedRecord::frequency("201701", "aa", u64::MAX - 1),
            ClassifiedRecord::frequency("201701", "aa", 1),
        ];
        let aggregated = aggregate(records).unwrap();
        assert_eq!(aggregated[0].total, u64::MAX);
    }

    #[test]
    fn test_overflow_is_fatal() {
        let records = vec![
            ClassifiedRecord::frequency("201701", "aa", u64::MAX),
            ClassifiedRecord::frequency("201701", "aa", 1),
        ];
        let err = aggregate(records).unwrap_err();
        assert_eq!(
            err,
            AggregationError::CounterOverflow {
                key: GroupKey::new(RecordType::Frequency, "201701", "aa", ""),
                current: u64::MAX,
                increment: 1,
            }
        );
    }

    #[test]
    fn test_incremental_len() {
        let mut aggregator = Aggregator::new();
        assert!(aggregator.is_empty());
        aggregator
            .add(ClassifiedRecord::frequency("b", "x", 1))
            .unwrap();
        aggregator
            .add(ClassifiedRecord::frequency("b", "x", 1))
            .unwrap();
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn test_merge_sums_partials() {
        let mut left = Aggregator::new();
        left.add(ClassifiedRecord::cooccurrence("201701", "aa", "rukc", 2))
            .unwrap();
        left.add(ClassifiedRecord::frequency("201701", "aa", 1)).unwrap();
        let mut right = Aggregator::new();
        right
            .add(ClassifiedRecord::cooccurrence("201701", "aa", "rukc", 3))
            .unwrap();

        left.merge(right).unwrap();
        let totals: Vec<u64> = left.finish().into_iter().map(|r| r.total).collect();
        assert_eq!(totals, vec![1, 5]);
    }

    #[test]
    fn test_merge_overflow_is_fatal() {
        let mut left = Aggregator::new();
        left.add(ClassifiedRecord::frequency("201701", "aa", u64::MAX))
            .unwrap();
        let mut right = Aggregator::new();
        right.add(ClassifiedRecord::frequency("201701", "aa", 1)).unwrap();

        assert!(matches!(
            left.merge(right),
            Err(AggregationError::CounterOverflow { current: u64::MAX, increment: 1, .. })
        ));
    }
}
