pub mod client;
pub mod error;
pub mod executor;

/// Gate behind ssh feature
#[cfg(feature = "ssh")]
pub mod ssh;

pub use client::{Command, CommandOutput, Config, Session};
pub use error::*;
pub use executor::{ScriptError, ScriptExecutor, ScriptRequest, Step};

pub mod macros {
    #[macro_export]
    macro_rules! cmd {
        ($cmd:expr $(,$arg:expr)*) => {
            {
                let cmd = $crate::client::Command::new($cmd);
                $(
                    let cmd = cmd.arg($arg);
                )*

                cmd
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use crate::cmd;

    #[test]
    fn test_macro() {
        let cmd = cmd!("pwsh", "-File", r"C:\Temp\HyperVServer.ps1");
        assert_eq!(cmd.get_cmd(), "pwsh");
        assert_eq!(cmd.get_args(), &vec!["-File", r"C:\Temp\HyperVServer.ps1"]);
    }
}
