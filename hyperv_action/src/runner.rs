use crate::error::{Error, Result};
use async_trait::async_trait;
use remote_pwsh::ssh::SSHConfig;
use remote_pwsh::{ScriptExecutor, ScriptRequest};
use std::path::Path;
use tracing::info;

/// Somewhere HyperVServer.ps1 can run.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run `script` with `arguments` and return what it printed.
    async fn run(&self, script: &Path, arguments: &str) -> Result<String>;
}

/// Stages and runs the script on the Hyper-V host over SSH.
pub struct SshRunner {
    executor: ScriptExecutor<SSHConfig>,
}

impl SshRunner {
    pub fn new(config: SSHConfig, interpreter: &str) -> Self {
        SshRunner {
            executor: ScriptExecutor::new(config).interpreter(interpreter),
        }
    }
}

#[async_trait]
impl ScriptRunner for SshRunner {
    async fn run(&self, script: &Path, arguments: &str) -> Result<String> {
        let request = ScriptRequest::new(script, arguments);
        Ok(self.executor.execute_script(&request).await?)
    }
}

/// Runs the script on this machine through Windows PowerShell, which then
/// talks to the Hyper-V host over PowerShell remoting.
pub struct LocalRunner {
    shell: String,
    require_windows: bool,
}

impl LocalRunner {
    pub fn powershell() -> Self {
        LocalRunner {
            shell: "powershell.exe".to_string(),
            require_windows: true,
        }
    }
}

#[async_trait]
impl ScriptRunner for LocalRunner {
    async fn run(&self, script: &Path, arguments: &str) -> Result<String> {
        if self.require_windows && !cfg!(windows) {
            return Err(Error::Unsupported(
                "Connecting via PowerShell remote protocol is only supported on Windows. Please enable SSH mode."
                    .to_string(),
            ));
        }

        info!("Starting executing PowerShell commands.");
        // PowerShell receives the script and its parameters as one command string.
        let status = tokio::process::Command::new(&self.shell)
            .arg(format!("{}{}", script.display(), arguments))
            .status()
            .await?;

        match status.code() {
            Some(0) => {
                info!("PowerShell process exited with code 0");
                Ok(String::new())
            }
            Some(code) => Err(Error::LocalExecution(format!(
                "PowerShell process exited with code {}",
                code
            ))),
            None => Err(Error::LocalExecution(
                "PowerShell process was terminated by a signal".to_string(),
            )),
        }
    }
}
