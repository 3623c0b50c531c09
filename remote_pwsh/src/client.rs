//! Transport-independent pieces of a remote session: the command line type,
//! the captured output of a command, and the `Config`/`Session` traits that a
//! transport implements.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A single command line to run on the remote host.
///
/// Arguments are joined with one space and otherwise passed through as-is;
/// nothing is quoted or escaped here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    cmd: String,
    args: Vec<String>,
}

impl Command {
    pub fn new<S: Into<String>>(cmd: S) -> Self {
        Command {
            cmd: cmd.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn get_cmd(&self) -> &str {
        &self.cmd
    }

    pub fn get_args(&self) -> &Vec<String> {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cmd)?;
        for arg in self.args.iter().filter(|a| !a.is_empty()) {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl From<&Command> for Vec<u8> {
    fn from(cmd: &Command) -> Self {
        cmd.to_string().into_bytes()
    }
}

/// Everything a remote command reported before its channel closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<u32>,
    pub signal: Option<String>,
}

impl CommandOutput {
    /// Standard output as text with surrounding whitespace removed.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    /// Decode the termination status.
    ///
    /// Exit code `0` yields the trimmed stdout. A non-zero code, or a signal
    /// without any code, is an [`ExecutionError`](crate::Error::ExecutionError).
    /// A channel that closed without reporting either is a protocol error.
    pub fn into_result(self) -> crate::Result<String> {
        let text = self.stdout_text();
        match (self.exit_code, self.signal) {
            (Some(0), _) => Ok(text),
            (Some(code), signal) => Err(crate::Error::ExecutionError {
                code: Some(code),
                signal,
            }),
            (None, Some(signal)) => Err(crate::Error::ExecutionError {
                code: None,
                signal: Some(signal),
            }),
            (None, None) => Err(crate::Error::ProtocolError(
                "channel closed without reporting an exit status".to_string(),
            )),
        }
    }
}

/// Connection parameters that know how to open a [`Session`].
#[async_trait]
pub trait Config: Send + Sync {
    type SessionType: Session;

    async fn create_session(&self) -> crate::Result<Self::SessionType>;
}

/// An established, authenticated remote session.
///
/// Every operation takes `&mut self` so that only one transfer or command can
/// be in flight on a session at a time.
#[async_trait]
pub trait Session: Send {
    /// Run one command and collect its output and termination status.
    async fn exec(&mut self, cmd: &Command) -> crate::Result<CommandOutput>;

    /// Write `file_contents` to `remote_dest`, replacing any existing file.
    async fn transfer_file(
        &mut self,
        file_contents: Arc<Vec<u8>>,
        remote_dest: &str,
    ) -> crate::Result<()>;

    /// Close the session. Calling this on a closed session is a no-op.
    async fn disconnect(&mut self) -> crate::Result<()>;

    /// Copy a local file to `remote_dest`.
    async fn upload(&mut self, local_path: &Path, remote_dest: &str) -> crate::Result<()> {
        let contents = tokio::fs::read(local_path).await.map_err(|e| {
            crate::Error::TransferError(format!(
                "Failed to read local file {}: {}",
                local_path.display(),
                e
            ))
        })?;
        debug!(
            "Uploading {} ({} bytes) to {}",
            local_path.display(),
            contents.len(),
            remote_dest
        );
        self.transfer_file(Arc::new(contents), remote_dest).await
    }

    /// Run `cmd` and decode its result; see [`CommandOutput::into_result`].
    async fn execute(&mut self, cmd: &Command) -> crate::Result<String> {
        debug!("Executing command: {}", cmd);
        let output = self.exec(cmd).await?;
        if !output.stderr.is_empty() {
            warn!(
                "Command stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        debug!(
            "Command finished. Exit code: {:?} signal: {:?}",
            output.exit_code, output.signal
        );
        output.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn output(stdout: &str, exit_code: Option<u32>, signal: Option<&str>) -> CommandOutput {
        CommandOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            exit_code,
            signal: signal.map(String::from),
        }
    }

    #[test]
    fn command_line_joins_args_verbatim() {
        let cmd = Command::new("pwsh")
            .arg("-File")
            .arg(r"C:\Temp\HyperVServer.ps1")
            .arg("-Action Start -VMName 'my vm'; echo $x");
        assert_eq!(
            cmd.to_string(),
            r"pwsh -File C:\Temp\HyperVServer.ps1 -Action Start -VMName 'my vm'; echo $x"
        );
        assert_eq!(Vec::<u8>::from(&cmd), cmd.to_string().into_bytes());
    }

    #[test]
    fn empty_args_leave_no_trailing_space() {
        let cmd = Command::new("echo").arg("%temp%").arg("");
        assert_eq!(cmd.to_string(), "echo %temp%");
    }

    #[test]
    fn zero_exit_returns_trimmed_stdout() {
        let result = output("\r\n  OK \r\n", Some(0), None).into_result().unwrap();
        assert_eq!(result, "OK");
    }

    #[test]
    fn zero_exit_with_signal_still_succeeds() {
        let result = output("done", Some(0), Some("HUP")).into_result().unwrap();
        assert_eq!(result, "done");
    }

    #[test]
    fn non_zero_exit_is_execution_error() {
        let err = output("partial", Some(3), Some("TERM"))
            .into_result()
            .unwrap_err();
        match err {
            Error::ExecutionError { code, signal } => {
                assert_eq!(code, Some(3));
                assert_eq!(signal.as_deref(), Some("TERM"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn signal_without_code_is_execution_error() {
        let err = output("", None, Some("KILL")).into_result().unwrap_err();
        assert!(matches!(
            err,
            Error::ExecutionError { code: None, signal: Some(ref s) } if s == "KILL"
        ));
    }

    #[test]
    fn missing_status_is_protocol_error() {
        let err = output("OK", None, None).into_result().unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }
}
