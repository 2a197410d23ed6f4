//! `classify` command: report record shapes without aggregating

use super::resolve_inputs;
use crate::pipeline::input::scan_source;
use crate::pipeline::{AbortSignal, InputSource, MalformedBudget, RecordType};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-source classification counts
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassifyReport {
    pub lines: u64,
    pub malformed: u64,
    pub by_type: BTreeMap<RecordType, u64>,
}

impl ClassifyReport {
    fn add(&mut self, other: &ClassifyReport) {
        self.lines += other.lines;
        self.malformed += other.malformed;
        for (record_type, count) in &other.by_type {
            *self.by_type.entry(*record_type).or_default() += count;
        }
    }

    fn render(&self, label: &str) -> String {
        format!(
            "{}: {} lines, {} frequency, {} cooccurrence, {} malformed",
            label,
            self.lines,
            self.by_type.get(&RecordType::Frequency).unwrap_or(&0),
            self.by_type.get(&RecordType::Cooccurrence).unwrap_or(&0),
            self.malformed
        )
    }
}

/// Classify one source; malformed lines are counted, never fatal
pub fn classify_source(source: &InputSource) -> Result<ClassifyReport> {
    let budget = MalformedBudget::new(u64::MAX);
    let abort = AbortSignal::new();
    let mut report = ClassifyReport::default();

    let stats = scan_source(source, &budget, &abort, |record| {
        *report.by_type.entry(record.record_type).or_default() += 1;
        Ok(())
    })
    .with_context(|| format!("Failed to classify {source}"))?;

    report.lines = stats.lines;
    report.malformed = stats.malformed;
    Ok(report)
}

pub async fn run_classify_command(inputs: Vec<PathBuf>) -> Result<()> {
    let files = resolve_inputs(&inputs)?;

    let reports = tokio::task::spawn_blocking(move || {
        files
            .into_iter()
            .map(|path| {
                let source = InputSource::File(path);
                classify_source(&source).map(|report| (source.to_string(), report))
            })
            .collect::<Result<Vec<_>>>()
    })
    .await
    .context("Classification task failed")??;

    let mut total = ClassifyReport::default();
    for (label, report) in &reports {
        println!("{}", report.render(label));
        total.add(report);
    }
    if reports.len() > 1 {
        println!("{}", total.render("total"));
    }
    Ok(())
}
