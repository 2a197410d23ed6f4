//! Job execution: map, shuffle, reduce, commit
//!
//! The map phase classifies input sources in parallel and sums counts per
//! key into coarse-keyed shards. The shuffle assigns every coarse partition to exactly one reduce
//! worker. Each reduce worker merges the partial totals of all of its
//! partitions before routing anything. Any fatal error raises the shared [`AbortSignal`], every worker
//! is drained, and staged output is discarded instead of committed.

use crate::config::{JobOptions, OutputNaming};
use crate::error::{ConfigError, JobError, JobFailure, JobResult, RoutingError};
use crate::pipeline::aggregation::Aggregator;
use crate::pipeline::input::{scan_source, InputSource, MalformedBudget, ScanStats};
use crate::pipeline::partition::{Partitioner, Shards, WorkerAssignment};
use crate::pipeline::record::RecordType;
use crate::pipeline::router::OutputRouter;
use crate::pipeline::sink::SinkProvider;
use crate::pipeline::AbortSignal;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span};

/// Outcome of a successful job
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub inputs: usize,
    pub lines_read: u64,
    pub malformed_skipped: u64,
    /// Distinct coarse partitions (type, bucket)
    pub partitions: usize,
    pub reduce_workers: usize,
    /// Distinct aggregated keys per record type
    pub keys: BTreeMap<RecordType, u64>,
    /// Logical destinations written
    pub destinations: BTreeSet<String>,
    /// Committed physical outputs
    pub outputs: Vec<PathBuf>,
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} lines from {} input(s), {} malformed line(s) skipped",
            self.lines_read, self.inputs, self.malformed_skipped
        )?;
        for record_type in RecordType::ALL {
            writeln!(
                f,
                "  {}: {} key(s)",
                record_type,
                self.keys.get(&record_type).copied().unwrap_or(0)
            )?;
        }
        write!(
            f,
            "Wrote {} output file(s) across {} partition(s) using {} worker(s)",
            self.outputs.len(),
            self.partitions,
            self.reduce_workers
        )
    }
}

#[derive(Debug, Default)]
struct MapOutput {
    shards: Shards,
    stats: ScanStats,
}

#[derive(Debug)]
struct WorkerReport {
    keys: BTreeMap<RecordType, u64>,
    destinations: Vec<String>,
}

pub struct Job {
    options: Arc<JobOptions>,
    provider: Arc<dyn SinkProvider>,
}

impl Job {
    pub fn new(options: JobOptions, provider: Arc<dyn SinkProvider>) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            options: Arc::new(options),
            provider,
        })
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Run the job over all sources.
    ///
    /// On failure nothing is committed and the failure carries the number of
    /// malformed lines seen before the job stopped.
    pub async fn run(&self, sources: Vec<InputSource>) -> Result<JobSummary, JobFailure> {
        let budget = MalformedBudget::new(self.options.malformed_line_tolerance);
        let abort = AbortSignal::new();

        match self.execute(sources, &budget, &abort).await {
            Ok(summary) => {
                info!(
                    "Job finished: {} keys, {} outputs",
                    summary.keys.values().sum::<u64>(),
                    summary.outputs.len()
                );
                Ok(summary)
            }
            Err(cause) => {
                abort.raise();
                self.provider.discard();
                error!("Job failed, staged output discarded: {}", cause);
                Err(JobFailure {
                    cause,
                    malformed_lines: budget.seen(),
                })
            }
        }
    }

    async fn execute(
        &self,
        sources: Vec<InputSource>,
        budget: &MalformedBudget,
        abort: &AbortSignal,
    ) -> JobResult<JobSummary> {
        let inputs = sources.len();
        let map = self.map_phase(sources, budget, abort).await?;
        let partitions = map.shards.partition_count();
        info!(
            "Map phase complete: {} records combined into {} partition(s)",
            map.shards.record_count(),
            partitions
        );

        let assignments = Partitioner::new(self.options.workers).assign(map.shards);
        let reduce_workers = assignments.len();
        let reports = self.reduce_phase(assignments, abort).await?;

        let outputs = self
            .provider
            .commit()
            .map_err(|e| RoutingError::unavailable("output", "commit", None, e))?;

        let mut keys = BTreeMap::new();
        let mut destinations = BTreeSet::new();
        for report in reports {
            for (record_type, count) in report.keys {
                *keys.entry(record_type).or_insert(0) += count;
            }
            destinations.extend(report.destinations);
        }

        Ok(JobSummary {
            inputs,
            lines_read: map.stats.lines,
            malformed_skipped: map.stats.malformed,
            partitions,
            reduce_workers,
            keys,
            destinations,
            outputs,
        })
    }

    async fn map_phase(
        &self,
        sources: Vec<InputSource>,
        budget: &MalformedBudget,
        abort: &AbortSignal,
    ) -> JobResult<MapOutput> {
        let semaphore = Arc::new(Semaphore::new(self.options.workers));
        let mut tasks = JoinSet::new();

        for (index, source) in sources.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| JobError::Aborted)?;
            // A failed worker releases its permit after raising the signal
            if abort.is_raised() {
                debug!("Abort raised, not starting source {}", source);
                break;
            }
            let budget = budget.clone();
            let abort = abort.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let span = info_span!("map_worker", worker = index);
                let _enter = span.enter();

                let mut shards = Shards::new();
                scan_source(&source, &budget, &abort, |record| {
                    shards.push(record).map_err(JobError::from)
                })
                .map(|stats| MapOutput { shards, stats })
                .inspect_err(|_| abort.raise())
            });
        }

        let mut merged = MapOutput::default();
        for output in drain(tasks, abort).await? {
            merged.stats.lines += output.stats.lines;
            merged.stats.classified += output.stats.classified;
            merged.stats.malformed += output.stats.malformed;
            merged.shards.merge(output.shards);
        }
        Ok(merged)
    }

    async fn reduce_phase(
        &self,
        assignments: Vec<WorkerAssignment>,
        abort: &AbortSignal,
    ) -> JobResult<Vec<WorkerReport>> {
        let mut tasks = JoinSet::new();

        for assignment in assignments {
            let options = Arc::clone(&self.options);
            let provider = Arc::clone(&self.provider);
            let abort = abort.clone();

            tasks.spawn_blocking(move || {
                reduce_worker(assignment, &options.output_naming, provider.as_ref(), &abort)
                    .inspect_err(|_| abort.raise())
            });
        }

        drain(tasks, abort).await
    }
}

/// Sum the partial totals of every owned partition, then route them.
fn reduce_worker(
    assignment: WorkerAssignment,
    naming: &OutputNaming,
    provider: &dyn SinkProvider,
    abort: &AbortSignal,
) -> JobResult<WorkerReport> {
    let span = info_span!("reduce_worker", worker = assignment.worker);
    let _enter = span.enter();
    debug!(
        "Reducing {} partial totals in {} partition(s)",
        assignment.partial_count(),
        assignment.partitions.len()
    );

    let mut aggregated = Vec::with_capacity(assignment.partitions.len());
    for (coarse, partials) in assignment.partitions {
        let mut combined = Aggregator::new();
        for partial in partials {
            if abort.is_raised() {
                return Err(JobError::Aborted);
            }
            combined.merge(partial)?;
        }
        debug!("Partition {} aggregated to {} keys", coarse, combined.len());
        aggregated.push(combined.finish());
    }

    let mut router = OutputRouter::new(naming, provider);
    for record in aggregated.iter().flatten() {
        if abort.is_raised() {
            return Err(JobError::Aborted);
        }
        router.route(record)?;
    }
    let routing = router.finish()?;

    Ok(WorkerReport {
        keys: routing.records,
        destinations: routing.destinations,
    })
}

/// Wait for every task. The first real failure wins over the `Aborted`
/// errors it causes in the other workers.
async fn drain<T: Send + 'static>(
    mut tasks: JoinSet<JobResult<T>>,
    abort: &AbortSignal,
) -> JobResult<Vec<T>> {
    let mut results = Vec::new();
    let mut failure: Option<JobError> = None;

    while let Some(joined) = tasks.join_next().await {
        let error = match joined {
            Ok(Ok(value)) => {
                results.push(value);
                continue;
            }
            Ok(Err(e)) => e,
            Err(join_error) => JobError::Worker(join_error.to_string()),
        };

        abort.raise();
        let replace = match &failure {
            None => true,
            Some(JobError::Aborted) => !matches!(error, JobError::Aborted),
            Some(_) => false,
        };
        if replace {
            failure = Some(error);
        }
    }

    match failure {
        Some(error) => Err(error),
        None => Ok(results),
    }
}
