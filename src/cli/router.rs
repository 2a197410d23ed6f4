//! Command routing and execution

use crate::cli::args::{Cli, Commands};
use crate::cli::commands::{run_classify_command, run_job_command, RunParams};
use anyhow::Result;
use clap::CommandFactory;

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Option<Commands>) -> Result<()> {
    match command {
        Some(Commands::Run {
            inputs,
            output,
            config,
            tolerance,
            workers,
            compression,
        }) => {
            run_job_command(RunParams {
                inputs,
                output,
                config,
                tolerance,
                workers,
                compression,
            })
            .await
        }
        Some(Commands::Classify { inputs }) => run_classify_command(inputs).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
