use std::fmt::Display;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Log to stderr, `info` and up unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn log_success<T: Display, U: Display>(operation: T, target: U) {
    info!("Successfully {}: {}", operation, target);
}

/// Log the error and emit a workflow `::error::` command so the runner marks
/// the step as failed.
pub fn report_failure<E: Display>(err: &E) {
    error!("{}", err);
    println!("::error::{}", escape_workflow_command(&err.to_string()));
}

fn escape_workflow_command(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_workflow_command_data() {
        assert_eq!(
            escape_workflow_command("100% failed\r\nsee log"),
            "100%25 failed%0D%0Asee log"
        );
        assert_eq!(escape_workflow_command("plain"), "plain");
    }
}
