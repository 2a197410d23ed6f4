//! Property tests for classification and aggregation
//!
//! These tests verify:
//! - Classification: arity alone decides the record type
//! - Determinism: totals do not depend on input order
//! - Re-partitioning: 1 worker and N workers produce identical totals

use coloc_dataset::config::{Compression, JobOptions};
use coloc_dataset::pipeline::{
    aggregate, classify, AggregatedRecord, Aggregator, ClassifiedRecord, InputSource, Job,
    MemorySinkProvider, Partitioner, RecordType, Shards,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

fn record_strategy() -> impl Strategy<Value = ClassifiedRecord> {
    (
        prop::sample::select(vec!["201701", "201702", "201703"]),
        "[a-c]{1,2}",
        prop::option::of("[a-c]{0,2}"),
        0u64..1000,
    )
        .prop_map(|(bucket, primary, secondary, count)| match secondary {
            None => ClassifiedRecord::frequency(bucket, primary, count),
            Some(secondary) => ClassifiedRecord::cooccurrence(bucket, primary, secondary, count),
        })
}

fn to_line(record: &ClassifiedRecord) -> String {
    match record.record_type {
        RecordType::Frequency => {
            format!("{}\t{}\t{}", record.bucket, record.primary_key, record.count)
        }
        RecordType::Cooccurrence => format!(
            "{}\t{}\t{}\t{}",
            record.bucket, record.primary_key, record.secondary_key, record.count
        ),
    }
}

async fn run_in_memory(lines: &str, workers: usize) -> BTreeMap<String, String> {
    let provider = MemorySinkProvider::new();
    let options = JobOptions {
        workers,
        compression: Compression::None,
        ..JobOptions::default()
    };
    let job = Job::new(options, Arc::new(provider.clone())).unwrap();
    job.run(vec![InputSource::memory("input", lines)])
        .await
        .unwrap();
    provider.committed()
}

mod classification {
    use super::*;

    proptest! {
        #[test]
        fn three_fields_are_frequency(
            bucket in "[0-9]{6}",
            primary in "[a-z]{0,8}",
            count in any::<u64>(),
        ) {
            let record = classify(&format!("{bucket}\t{primary}\t{count}")).unwrap();
            prop_assert_eq!(record.record_type, RecordType::Frequency);
            prop_assert_eq!(record.secondary_key, "");
            prop_assert_eq!(record.count, count);
        }

        #[test]
        fn four_fields_are_cooccurrence(
            bucket in "[0-9]{6}",
            primary in "[a-z]{0,8}",
            secondary in "[a-z]{0,8}",
            count in any::<u64>(),
        ) {
            let record = classify(&format!("{bucket}\t{primary}\t{secondary}\t{count}")).unwrap();
            prop_assert_eq!(record.record_type, RecordType::Cooccurrence);
            prop_assert_eq!(record.secondary_key, secondary);
            prop_assert_eq!(record.count, count);
        }

        #[test]
        fn other_arities_are_malformed(
            fields in prop::collection::vec("[a-z0-9]{0,4}", 0..10)
                .prop_filter("arity 3 or 4 is valid", |f| f.len() != 3 && f.len() != 4),
        ) {
            prop_assert!(classify(&fields.join("\t")).is_err());
        }
    }
}

mod aggregation {
    use super::*;

    proptest! {
        #[test]
        fn totals_are_order_independent(
            (records, shuffled) in prop::collection::vec(record_strategy(), 0..200)
                .prop_flat_map(|records| (Just(records.clone()), Just(records).prop_shuffle())),
        ) {
            prop_assert_eq!(aggregate(records).unwrap(), aggregate(shuffled).unwrap());
        }

        #[test]
        fn every_key_appears_once_with_full_sum(
            records in prop::collection::vec(record_strategy(), 0..200),
        ) {
            let expected: u64 = records.iter().map(|r| r.count).sum();
            let aggregated = aggregate(records).unwrap();

            let mut keys: Vec<_> = aggregated.iter().map(|r| r.key.clone()).collect();
            keys.dedup();
            prop_assert_eq!(keys.len(), aggregated.len());
            prop_assert_eq!(aggregated.iter().map(|r| r.total).sum::<u64>(), expected);
        }

        #[test]
        fn repartitioning_preserves_totals(
            records in prop::collection::vec(record_strategy(), 0..200),
            map_workers in 1usize..5,
            reduce_workers in 1usize..8,
        ) {
            let single = aggregate(records.clone()).unwrap();

            // Each map worker combines its own slice of the input
            let mut shards = Shards::new();
            let chunk = records.len() / map_workers + 1;
            for slice in records.chunks(chunk) {
                let mut local = Shards::new();
                for record in slice.iter().cloned() {
                    local.push(record).unwrap();
                }
                shards.merge(local);
            }

            let mut distributed: Vec<AggregatedRecord> = Vec::new();
            for assignment in Partitioner::new(reduce_workers).assign(shards) {
                for partials in assignment.partitions.into_values() {
                    let mut combined = Aggregator::new();
                    for partial in partials {
                        combined.merge(partial).unwrap();
                    }
                    distributed.extend(combined.finish());
                }
            }
            distributed.sort_by(|a, b| a.key.cmp(&b.key));

            prop_assert_eq!(single, distributed);
        }
    }
}

mod job {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn one_worker_matches_many_workers(
            records in prop::collection::vec(record_strategy(), 1..100),
            workers in 2usize..6,
        ) {
            let lines: String = records.iter().map(|r| to_line(r) + "\n").collect();
            let runtime = tokio::runtime::Runtime::new().unwrap();

            let single = runtime.block_on(run_in_memory(&lines, 1));
            let parallel = runtime.block_on(run_in_memory(&lines, workers));

            prop_assert_eq!(single, parallel);
        }
    }
}
