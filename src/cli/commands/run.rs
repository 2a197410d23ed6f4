//! `run` command: execute the aggregation job over input files

use super::resolve_inputs;
use crate::config::{Compression, ConfigLoader};
use crate::pipeline::{FileSinkProvider, InputSource, Job};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct RunParams {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub tolerance: Option<u64>,
    pub workers: Option<usize>,
    pub compression: Option<Compression>,
}

/// `<input without its last extension>-processed`, next to the input
pub fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input.with_extension("");
    let mut name = stem.into_os_string();
    name.push("-processed");
    PathBuf::from(name)
}

pub async fn run_job_command(params: RunParams) -> Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &params.config {
        loader = loader.with_file(path);
    }
    let mut options = loader.load().await.context("Failed to load job options")?;

    if let Some(tolerance) = params.tolerance {
        options.malformed_line_tolerance = tolerance;
    }
    if let Some(workers) = params.workers {
        options.workers = workers;
    }
    if let Some(compression) = params.compression {
        options.compression = compression;
    }
    debug!("Job options: {:?}", options);

    let inputs = resolve_inputs(&params.inputs)?;
    let output = match params.output {
        Some(output) => output,
        None => default_output_dir(&params.inputs[0]),
    };
    info!(
        "Processing {} input file(s) into {}",
        inputs.len(),
        output.display()
    );

    let provider = Arc::new(FileSinkProvider::new(&output, options.compression));
    let job = Job::new(options, provider).context("Invalid job options")?;
    let sources = inputs.into_iter().map(InputSource::File).collect();

    let summary = job.run(sources).await?;

    println!("{summary}");
    println!("Output directory: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_dir_strips_last_extension() {
        assert_eq!(
            default_output_dir(Path::new("warcs-2017-frequent-aa-word-coloc.tsv")),
            PathBuf::from("warcs-2017-frequent-aa-word-coloc-processed")
        );
        assert_eq!(
            default_output_dir(Path::new("/data/coloc.tsv.gz")),
            PathBuf::from("/data/coloc.tsv-processed")
        );
        assert_eq!(
            default_output_dir(Path::new("/data/coloc-output")),
            PathBuf::from("/data/coloc-output-processed")
        );
    }
}
