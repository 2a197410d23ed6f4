//! Classification, partitioning, aggregation and routing
//!
//! Data flow:
//!
//! ```text
//! raw lines -> classify -> Shards (partial totals by CoarseKey) -> Partitioner
//!           -> reduce workers merge partials (by GroupKey) -> OutputRouter
//!           -> per-type destinations
//! ```

pub mod aggregation;
pub mod classifier;
pub mod input;
pub mod job;
pub mod partition;
pub mod record;
pub mod router;
pub mod sink;

pub use aggregation::{aggregate, Aggregator};
pub use classifier::classify;
pub use input::{InputSource, MalformedBudget, ScanStats};
pub use job::{Job, JobSummary};
pub use partition::{Partitioner, Shards, WorkerAssignment};
pub use record::{AggregatedRecord, ClassifiedRecord, CoarseKey, GroupKey, RecordType};
pub use router::{OutputRouter, RoutingSummary};
pub use sink::{FileSinkProvider, MemorySinkProvider, OutputSink, SinkProvider};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Job-wide fail-fast flag; workers poll it between records
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    raised: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
