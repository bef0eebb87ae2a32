//! Command execution on the provisioning host

use crate::error::ExecError;
use crate::output::CommandOutput;
use crate::runner::CommandRunner;
use tokio::process::Command;
use tracing::debug;

/// Runs commands on this machine via `sh -c`
#[derive(Debug, Clone, Default)]
pub struct LocalHost;

impl LocalHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CommandRunner for LocalHost {
    fn host(&self) -> &str {
        "localhost"
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError> {
        debug!(command = %command, "running local command");

        let output = Command::new("sh")
            .args(["-c", command])
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                command: command.to_string(),
                source,
            })?;

        // Killed by a signal: no exit code, report like a shell would.
        let exit_code = output.status.code().unwrap_or(-1);
        let result = CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %command, exit_code, "local command finished");
        Ok(result)
    }
}
