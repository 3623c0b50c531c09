mod arguments;
mod cli;
mod error;
mod logging;
mod runner;

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::runner::{LocalRunner, ScriptRunner, SshRunner};
use std::process::ExitCode;
use tokio::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging();
    let cli = match Cli::parse_inputs(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            logging::report_failure(&e);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli).await {
        Ok(output) => {
            if !output.is_empty() {
                info!("Script result: {}", output);
            }
            logging::log_success("ran HyperVServer.ps1 for", &cli.vm_name);
            info!("### Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            logging::report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<String> {
    info!(
        "Starting the HyperV action on Hyper-V host {} using the platform {}",
        cli.hostname.trim(),
        std::env::consts::OS
    );

    let arguments = arguments::script_arguments(cli)?;
    info!("### Script arguments: {}", arguments);

    let runner: Box<dyn ScriptRunner> = if cli.ssh_mode {
        info!("SSH mode is enabled. Using SSH protocol.");
        Box::new(SshRunner::new(cli.ssh_config()?, &cli.interpreter))
    } else {
        info!("SSH mode is not enabled. Using PowerShell remote protocol.");
        Box::new(LocalRunner::powershell())
    };

    let timeout = cli.timeout_secs()?;
    let execution = runner.run(&cli.script, &arguments);
    match timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), execution)
            .await
            .map_err(|_| Error::Timeout(secs))?,
        None => execution.await,
    }
}
