//! Coarse partitioning and worker assignment
//!
//! Work is distributed by [`CoarseKey`] only. Since every [`GroupKey`]
//! extends its coarse key, all partial totals that may share an aggregation
//! key end up on the same worker, which then sums them by the full key.
//!
//! Map workers combine records into per-partition [`Aggregator`]s as they
//! scan, so a shard holds one total per distinct key rather than one entry
//! per input line.
//!
//! [`GroupKey`]: crate::pipeline::record::GroupKey

use crate::error::AggregationError;
use crate::pipeline::aggregation::Aggregator;
use crate::pipeline::record::{ClassifiedRecord, CoarseKey};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Partial totals grouped by coarse key, one per contributing map worker
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Shards {
    partitions: BTreeMap<CoarseKey, Vec<Aggregator>>,
    records: usize,
}

impl Shards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine one record into the local partial of its coarse partition
    pub fn push(&mut self, record: ClassifiedRecord) -> Result<(), AggregationError> {
        let partials = self.partitions.entry(record.coarse_key()).or_default();
        match partials.last_mut() {
            Some(partial) => partial.add(record)?,
            None => {
                let mut partial = Aggregator::new();
                partial.add(record)?;
                partials.push(partial);
            }
        }
        self.records += 1;
        Ok(())
    }

    /// Fold another worker's shards into this one. Partials are kept apart
    /// and summed by the reduce worker that owns the partition.
    pub fn merge(&mut self, other: Shards) {
        self.records += other.records;
        for (key, mut partials) in other.partitions {
            self.partitions.entry(key).or_default().append(&mut partials);
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Records combined into these shards
    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn into_partitions(self) -> BTreeMap<CoarseKey, Vec<Aggregator>> {
        self.partitions
    }
}

/// The coarse partitions one reduce worker owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub worker: usize,
    pub partitions: BTreeMap<CoarseKey, Vec<Aggregator>>,
}

impl WorkerAssignment {
    /// Partial totals still to be summed
    pub fn partial_count(&self) -> usize {
        self.partitions
            .values()
            .flat_map(|partials| partials.iter().map(Aggregator::len))
            .sum()
    }
}

/// Maps coarse keys onto a fixed number of workers
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    workers: usize,
}

impl Partitioner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Stable worker index for a coarse key
    pub fn worker_for(&self, key: &CoarseKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.workers as u64) as usize
    }

    /// Distribute shards; workers without partitions are omitted
    pub fn assign(&self, shards: Shards) -> Vec<WorkerAssignment> {
        let mut by_worker: BTreeMap<usize, BTreeMap<CoarseKey, Vec<Aggregator>>> =
            BTreeMap::new();

        for (key, partials) in shards.into_partitions() {
            by_worker
                .entry(self.worker_for(&key))
                .or_default()
                .insert(key, partials);
        }

        by_worker
            .into_iter()
            .map(|(worker, partitions)| WorkerAssignment { worker, partitions })
            .collect()
    }
}
