//! DHCP reservation for the ACC and the dhcpd service around it.

use crate::config::{DhcpdSettings, NodeDescriptor};
use crate::error::ProvisionError;
use dhcpd_config::{ClaimOutcome, HostReservation, ManagedConfigFile};
use host_exec::CommandRunner;
use std::sync::Arc;
use tracing::{info, warn};

const STAGE: &str = "dhcp-lease";

/// What a successful `register` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseOutcome {
    /// An operator-written dhcpd.conf was moved to the backup path
    pub backup_taken: bool,
    /// A reservation for the same MAC or host name already existed
    pub replaced: bool,
}

pub struct DhcpLeaseManager {
    runner: Arc<dyn CommandRunner>,
    file: ManagedConfigFile,
    service: String,
}

impl DhcpLeaseManager {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &DhcpdSettings) -> Self {
        Self {
            runner,
            file: ManagedConfigFile::new(&settings.config_path, &settings.backup_path),
            service: settings.service.clone(),
        }
    }

    /// Stop dhcpd so the installer running on the ACC does not pick up a lease.
    ///
    /// Best effort: the service may not be running or even installed yet.
    pub async fn stop_service(&self) {
        let command = format!("systemctl stop {}", self.service);
        match self.runner.run(&command).await {
            Ok(output) if output.success() => info!("Stopped {}", self.service),
            Ok(output) => warn!(
                "`{}` exited with {} (continuing): {}",
                command,
                output.exit_code,
                output.stderr.trim()
            ),
            Err(e) => warn!("`{}` failed (continuing): {}", command, e),
        }
    }

    /// Write the reservation for `node` and restart dhcpd.
    ///
    /// The file is left in place if the restart fails.
    pub async fn register(&self, node: &NodeDescriptor) -> Result<LeaseOutcome, ProvisionError> {
        let file = self.file.clone();
        let reservation = HostReservation::new(node.name.clone(), node.mac, node.ip);

        let (claim, replaced) = tokio::task::spawn_blocking(move || {
            let claim = file.claim()?;
            let replaced = file.update(|config| config.add_host(reservation))?;
            Ok::<_, dhcpd_config::DhcpConfigError>((claim, replaced))
        })
        .await
        .map_err(|e| ProvisionError::dhcp_config(STAGE, e))?
        .map_err(|e| ProvisionError::dhcp_config(STAGE, e))?;

        let backup_taken = matches!(claim, ClaimOutcome::BackedUp { .. });
        if let ClaimOutcome::BackedUp { backup } = &claim {
            info!("Existing dhcpd configuration saved to {}", backup.display());
        }
        info!(
            node = %node.name,
            mac = %node.mac,
            ip = %node.ip,
            replaced,
            "Reservation written to {}",
            self.file.path().display()
        );

        let command = format!("systemctl restart {}", self.service);
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| ProvisionError::dhcp_config(STAGE, e))?;
        if !output.success() {
            return Err(ProvisionError::dhcp_config(
                STAGE,
                format!("failed to restart {}: {}", self.service, output.stderr.trim()),
            ));
        }

        Ok(LeaseOutcome {
            backup_taken,
            replaced,
        })
    }
}
