use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("File Transfer Error: {0}")]
    TransferError(String),
    #[error("Error executing command via PowerShell. Exit code: {} Signal: {}", display_opt(.code), display_opt(.signal))]
    ExecutionError {
        code: Option<u32>,
        signal: Option<String>,
    },
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(feature = "ssh")]
impl From<russh::Error> for Error {
    fn from(err: russh::Error) -> Self {
        Error::ConnectionError(err.to_string())
    }
}

/// A custom `Result` type for our client operations.
pub type Result<T> = std::result::Result<T, Error>;
