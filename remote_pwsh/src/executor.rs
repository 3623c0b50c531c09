//! # Remote script execution
//!
//! Runs a PowerShell script on a Windows host over a [`Session`]: find the
//! remote temp folder, stage the script next to its logging library, invoke
//! the interpreter and hand back what the script printed.
//!
//! The session is always disconnected once it has been opened, whichever
//! step fails.

use crate::client::{Command, Config, Session};
use crate::cmd;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Prints the remote temp folder on a Windows host.
pub const TEMP_DIR_COMMAND: &str = "echo %temp%";

/// File name the primary script is staged under.
pub const REMOTE_SCRIPT_NAME: &str = "HyperVServer.ps1";

/// File name the logging library is staged under. The script dot-sources it
/// relative to its own location, so both must share a folder.
pub const REMOTE_DEPENDENCY_NAME: &str = "Logging.ps1";

const DEPENDENCY_STEM: &str = "Logging";

pub const DEFAULT_INTERPRETER: &str = "pwsh";

/// The stages of one script run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connecting,
    DiscoveringScratchDir,
    UploadingScript,
    UploadingDependency,
    Executing,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Connecting => "connect",
            Step::DiscoveringScratchDir => "retrieve remote temp folder",
            Step::UploadingScript => "upload script",
            Step::UploadingDependency => "upload logging library",
            Step::Executing => "execute script",
        };
        f.write_str(name)
    }
}

/// A failed script run: the step that failed and why.
#[derive(Debug, Error)]
#[error("Failed to {step}: {source}")]
pub struct ScriptError {
    pub step: Step,
    pub source: crate::Error,
}

impl ScriptError {
    fn at(step: Step) -> impl FnOnce(crate::Error) -> ScriptError {
        move |source| ScriptError { step, source }
    }
}

/// What to run: the script, its logging library, and the argument string
/// appended to the interpreter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    pub script_path: PathBuf,
    pub dependency_path: PathBuf,
    pub arguments: String,
}

impl ScriptRequest {
    /// The logging library is expected next to the script, e.g.
    /// `ps/HyperVServer.ps1` pairs with `ps/Logging.ps1`.
    pub fn new<P: Into<PathBuf>, A: Into<String>>(script_path: P, arguments: A) -> Self {
        let script_path = script_path.into();
        let dependency_path = dependency_for(&script_path);
        ScriptRequest {
            script_path,
            dependency_path,
            arguments: arguments.into(),
        }
    }
}

fn dependency_for(script_path: &Path) -> PathBuf {
    let file_name = match script_path.extension() {
        Some(ext) => format!("{}.{}", DEPENDENCY_STEM, ext.to_string_lossy()),
        None => DEPENDENCY_STEM.to_string(),
    };
    script_path.with_file_name(file_name)
}

fn remote_path(scratch_dir: &str, file_name: &str) -> String {
    format!("{}\\{}", scratch_dir.trim_end_matches('\\'), file_name)
}

pub struct ScriptExecutor<C> {
    config: C,
    interpreter: String,
}

impl<C: Config> ScriptExecutor<C> {
    pub fn new(config: C) -> Self {
        ScriptExecutor {
            config,
            interpreter: DEFAULT_INTERPRETER.to_string(),
        }
    }

    /// Use another PowerShell executable, e.g. `powershell.exe`.
    pub fn interpreter<S: Into<String>>(mut self, interpreter: S) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Run the script remotely and return its trimmed standard output.
    pub async fn execute_script(&self, request: &ScriptRequest) -> Result<String, ScriptError> {
        info!("Executing script: {}", request.script_path.display());

        let mut session = self
            .config
            .create_session()
            .await
            .map_err(ScriptError::at(Step::Connecting))?;

        let outcome = self.run_staged(&mut session, request).await;

        if let Err(e) = session.disconnect().await {
            warn!("Failed to disconnect cleanly: {}", e);
        }

        match &outcome {
            Ok(_) => info!("Script executed"),
            Err(e) => error!("{}", e),
        }
        outcome
    }

    async fn run_staged(
        &self,
        session: &mut C::SessionType,
        request: &ScriptRequest,
    ) -> Result<String, ScriptError> {
        info!("Retrieving remote temp folder");
        let temp_dir = session
            .execute(&cmd!(TEMP_DIR_COMMAND))
            .await
            .and_then(|out| {
                if out.is_empty() {
                    Err(crate::Error::ProtocolError(
                        "Remote temp folder lookup printed nothing".to_string(),
                    ))
                } else {
                    Ok(out)
                }
            })
            .map_err(ScriptError::at(Step::DiscoveringScratchDir))?;
        info!("Remote temp folder: {}", temp_dir);

        let remote_script = remote_path(&temp_dir, REMOTE_SCRIPT_NAME);
        info!("Remote script path: {}", remote_script);
        session
            .upload(&request.script_path, &remote_script)
            .await
            .map_err(ScriptError::at(Step::UploadingScript))?;

        let remote_dependency = remote_path(&temp_dir, REMOTE_DEPENDENCY_NAME);
        info!("Remote logging library path: {}", remote_dependency);
        session
            .upload(&request.dependency_path, &remote_dependency)
            .await
            .map_err(ScriptError::at(Step::UploadingDependency))?;

        let invocation = self.invocation(&remote_script, &request.arguments);
        session
            .execute(&invocation)
            .await
            .map_err(ScriptError::at(Step::Executing))
    }

    /// `<interpreter> -File <script> <arguments>`; only the script path is
    /// quoted, the arguments go through untouched.
    fn invocation(&self, remote_script: &str, arguments: &str) -> Command {
        let script = shell_escape::windows::escape(Cow::Borrowed(remote_script));
        cmd!(self.interpreter.as_str(), "-File", script, arguments)
    }
}
