//! Command implementation modules

pub mod classify;
pub mod run;

pub use classify::run_classify_command;
pub use run::{default_output_dir, run_job_command, RunParams};

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Expand directories into the data files they contain.
///
/// Hidden files and `_`-prefixed bookkeeping files (such as `_SUCCESS`) are
/// skipped; files are taken in name order.
pub fn resolve_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("Failed to list input directory {}", path.display()))?
            {
                let entry = entry?;
                let entry_path = entry.path();
                if entry_path.is_file() && !is_bookkeeping(&entry_path) {
                    entries.push(entry_path);
                }
            }
            entries.sort();
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }

    if files.is_empty() {
        bail!("No input files found");
    }
    Ok(files)
}

fn is_bookkeeping(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') || name.starts_with('_'))
}
