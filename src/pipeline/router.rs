//! Routing of aggregated records to per-type destinations
//!
//! Each record type owns one logical destination, named through
//! [`OutputNaming`]. Physically a destination is split into one part per
//! bucket; parts are opened on first write and closed by [`OutputRouter::finish`].

use crate::config::OutputNaming;
use crate::error::RoutingError;
use crate::pipeline::record::{AggregatedRecord, CoarseKey, RecordType};
use crate::pipeline::sink::{OutputSink, SinkProvider};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::trace;

/// What one router wrote
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoutingSummary {
    /// Records written per record type
    pub records: BTreeMap<RecordType, u64>,
    /// Logical destinations that received at least one record
    pub destinations: Vec<String>,
    /// Physical parts opened
    pub parts: usize,
}

pub struct OutputRouter<'a> {
    naming: &'a OutputNaming,
    provider: &'a dyn SinkProvider,
    sinks: BTreeMap<CoarseKey, Box<dyn OutputSink>>,
    records: BTreeMap<RecordType, u64>,
}

impl<'a> OutputRouter<'a> {
    pub fn new(naming: &'a OutputNaming, provider: &'a dyn SinkProvider) -> Self {
        Self {
            naming,
            provider,
            sinks: BTreeMap::new(),
            records: BTreeMap::new(),
        }
    }

    pub fn destination_for(&self, record_type: RecordType) -> &str {
        self.naming.name_for(record_type)
    }

    /// Append one record to the destination of its type
    pub fn route(&mut self, record: &AggregatedRecord) -> Result<(), RoutingError> {
        let record_type = record.record_type();
        let destination = self.naming.name_for(record_type);
        let coarse = record.key.coarse_key();

        if !self.sinks.contains_key(&coarse) {
            trace!("Opening destination {} part {}", destination, coarse.bucket);
            let sink = self
                .provider
                .open(destination, &coarse.bucket)
                .map_err(|e| RoutingError::unavailable(destination, "open", None, e))?;
            self.sinks.insert(coarse.clone(), sink);
        }

        if let Some(sink) = self.sinks.get_mut(&coarse) {
            writeln!(sink, "{}", record.to_line())
                .map_err(|e| RoutingError::unavailable(destination, "write", None, e))?;
        }

        *self.records.entry(record_type).or_default() += 1;
        Ok(())
    }

    pub fn route_all<'r, I>(&mut self, records: I) -> Result<(), RoutingError>
    where
        I: IntoIterator<Item = &'r AggregatedRecord>,
    {
        for record in records {
            self.route(record)?;
        }
        Ok(())
    }

    /// Flush and close every opened part
    pub fn finish(self) -> Result<RoutingSummary, RoutingError> {
        let parts = self.sinks.len();
        for (coarse, sink) in self.sinks {
            let destination = self.naming.name_for(coarse.record_type);
            sink.finish()
                .map_err(|e| RoutingError::unavailable(destination, "close", None, e))?;
        }

        let destinations = self
            .records
            .keys()
            .map(|record_type| self.naming.name_for(*record_type).to_string())
            .collect();

        Ok(RoutingSummary {
            records: self.records,
            destinations,
            parts,
        })
    }
}
