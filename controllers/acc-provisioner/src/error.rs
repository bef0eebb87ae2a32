//! Provisioning errors.
//!
//! One variant per failure class. Each carries the stage that failed and the
//! underlying message, and maps to a distinct process exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Bad input detected before any side effect
    #[error("{stage}: invalid input: {message}")]
    Validation { stage: &'static str, message: String },

    /// Boot request exhausted its retries, or the controller was unreachable after it
    #[error("{stage}: remote boot failed: {message}")]
    RemoteBoot { stage: &'static str, message: String },

    /// Local interface reconfiguration or address discovery failed
    #[error("{stage}: network configuration failed: {message}")]
    NetworkConfig { stage: &'static str, message: String },

    /// Reservation could not be written or dhcpd did not restart
    #[error("{stage}: DHCP configuration failed: {message}")]
    DhcpConfig { stage: &'static str, message: String },

    /// The ACC never became reachable
    #[error("{stage}: connectivity failed: {message}")]
    Connectivity { stage: &'static str, message: String },
}

impl ProvisionError {
    pub fn validation(stage: &'static str, message: impl ToString) -> Self {
        Self::Validation {
            stage,
            message: message.to_string(),
        }
    }

    pub fn remote_boot(stage: &'static str, message: impl ToString) -> Self {
        Self::RemoteBoot {
            stage,
            message: message.to_string(),
        }
    }

    pub fn network_config(stage: &'static str, message: impl ToString) -> Self {
        Self::NetworkConfig {
            stage,
            message: message.to_string(),
        }
    }

    pub fn dhcp_config(stage: &'static str, message: impl ToString) -> Self {
        Self::DhcpConfig {
            stage,
            message: message.to_string(),
        }
    }

    pub fn connectivity(stage: &'static str, message: impl ToString) -> Self {
        Self::Connectivity {
            stage,
            message: message.to_string(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 2,
            Self::RemoteBoot { .. } => 3,
            Self::NetworkConfig { .. } => 4,
            Self::DhcpConfig { .. } => 5,
            Self::Connectivity { .. } => 6,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation { stage, .. }
            | Self::RemoteBoot { stage, .. }
            | Self::NetworkConfig { stage, .. }
            | Self::DhcpConfig { stage, .. }
            | Self::Connectivity { stage, .. } => stage,
        }
    }
}
