//! Command execution errors

use thiserror::Error;

/// Errors that can occur while running commands locally or over SSH
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command could not be started at all
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited non-zero (`run_or_die`)
    #[error("`{command}` on {host} exited with {exit_code}: {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// SSH transport error
    #[error("SSH error talking to {host}: {source}")]
    Ssh {
        host: String,
        #[source]
        source: russh::Error,
    },

    /// The SSH connection was not established in time
    #[error("timed out connecting to {host} over SSH")]
    ConnectTimeout { host: String },

    /// SSH authentication was rejected
    #[error("SSH authentication as {user} on {host} was rejected")]
    Authentication { host: String, user: String },

    /// The remote side closed the channel without reporting an exit status
    #[error("`{command}` on {host} ended without an exit status")]
    NoExitStatus { host: String, command: String },
}
