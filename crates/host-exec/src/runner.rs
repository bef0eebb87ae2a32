//! The command execution seam

use crate::error::ExecError;
use crate::output::CommandOutput;

/// Runs shell commands on one host
///
/// `run` reports non-zero exits through `CommandOutput`; `run_or_die` turns
/// them into `ExecError::CommandFailed` so callers can propagate with `?`.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Host the commands run on, for log and error messages
    fn host(&self) -> &str;

    /// Run `command` through the host's shell and capture its output
    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError>;

    /// Run `command` and fail on a non-zero exit
    async fn run_or_die(&self, command: &str) -> Result<CommandOutput, ExecError> {
        let output = self.run(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ExecError::CommandFailed {
                host: self.host().to_string(),
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
