use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Argument error: {0}")]
    ArgumentError(String),

    #[error(transparent)]
    Script(#[from] remote_pwsh::ScriptError),

    #[error("Failed to create client: {0}")]
    RemoteConnectionError(#[from] remote_pwsh::Error),

    #[error("{0}")]
    Unsupported(String),

    #[error("Local execution error: {0}")]
    LocalExecution(String),

    #[error("Failed to start PowerShell: {0}")]
    Io(#[from] std::io::Error),

    #[error("Script did not finish within {0} seconds")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
